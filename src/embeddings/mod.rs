// Embeddings module
// Local embedding cache, cosine ranking and the cache builder

pub mod builder;
pub mod similarity;
pub mod store;

use std::collections::HashMap;

/// item_id -> embedding vector
pub type EmbeddingTable = HashMap<String, Vec<f64>>;

pub use builder::{BuildReport, LocalCacheBuilder};
pub use similarity::{ScoredItem, cosine_similarity, rank};
pub use store::{Collection, EmbeddingRecord, EmbeddingStore, WriteOutcome, list_collections};
