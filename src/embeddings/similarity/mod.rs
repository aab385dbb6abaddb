
use super::EmbeddingTable;
use crate::{CopilotError, Result};

/// A candidate and its cosine similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item_id: String,
    pub score: f64,
}

/// Cosine similarity; zero magnitude on either side scores 0.0
///
/// Components large enough to overflow the norms also score 0.0.
///
/// Callers must pass vectors of equal length.
#[inline]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score.is_nan() {
        0.0
    } else {
        score
    }
}

/// Rank candidates by cosine similarity, best first
///
/// Equal scores are ordered by ascending item id. A candidate whose length
/// differs from the query fails the whole ranking.
#[inline]
pub fn rank(query: &[f64], candidates: &EmbeddingTable, top_k: usize) -> Result<Vec<ScoredItem>> {
    let mut scored = Vec::with_capacity(candidates.len());

    for (item_id, embedding) in candidates {
        if embedding.len() != query.len() {
            return Err(CopilotError::DimensionMismatch {
                item_id: item_id.clone(),
                expected: query.len(),
                actual: embedding.len(),
            });
        }
        scored.push(ScoredItem {
            item_id: item_id.clone(),
            score: cosine_similarity(query, embedding),
        });
    }

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
    scored.truncate(top_k);

    Ok(scored)
}
