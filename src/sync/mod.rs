// Remote vector index sync
// Keeps one hosted vector index per collection version and publishes cached records into it


use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::config::PublishSettings;
use crate::embeddings::EmbeddingRecord;
use crate::poll::wait_until;
use crate::provider::{AssistantApi, BatchStatus, IndexStatus, VectorIndex};
use crate::{CopilotError, Result};

/// Remote index name for a collection version
#[inline]
pub fn index_name(collection: &str, version: &str) -> String {
    format!("{collection} v{version}")
}

/// Upper bound on files uploaded across every publish in the process
#[derive(Debug)]
pub struct PublishBudget {
    used: AtomicUsize,
    limit: usize,
}

impl PublishBudget {
    #[inline]
    pub fn new(limit: usize) -> Self {
        Self {
            used: AtomicUsize::new(0),
            limit,
        }
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used())
    }

    /// Reserve up to `wanted` files, returning how many were granted
    #[inline]
    pub fn try_reserve(&self, wanted: usize) -> usize {
        let grant = |used: usize| wanted.min(self.limit.saturating_sub(used));
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                let granted = grant(used);
                (granted > 0).then_some(used + granted)
            })
            .map_or(0, grant)
    }

    /// Hand back files that were reserved but never uploaded
    #[inline]
    pub fn release(&self, unused: usize) {
        // Only called with part of a grant this caller still holds
        self.used.fetch_sub(unused, Ordering::SeqCst);
    }
}

/// What a publish call sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Size of each attached batch, in order
    pub batches: Vec<usize>,
    pub uploaded: usize,
    /// Records skipped for having no text
    pub skipped: usize,
    /// Records whose upload failed; their budget is returned
    pub failed: usize,
    /// The publish budget stopped the run early
    pub truncated: bool,
    /// Batches attached without a handle to wait on
    pub degraded_batches: usize,
}

pub struct IndexSync<'a> {
    api: &'a dyn AssistantApi,
    settings: &'a PublishSettings,
    budget: &'a PublishBudget,
    progress: bool,
}

impl<'a> IndexSync<'a> {
    #[inline]
    pub fn new(
        api: &'a dyn AssistantApi,
        settings: &'a PublishSettings,
        budget: &'a PublishBudget,
    ) -> Self {
        Self {
            api,
            settings,
            budget,
            progress: false,
        }
    }

    #[inline]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Find or create the index for `collection` / `version` and wait until it is ready
    #[inline]
    pub fn ensure_index(&self, collection: &str, version: &str) -> Result<VectorIndex> {
        let name = index_name(collection, version);

        let existing = self
            .api
            .list_vector_indexes()?
            .into_iter()
            .find(|index| index.name.as_deref() == Some(name.as_str()));
        let index = match existing {
            Some(index) => {
                debug!("Found vector index {} ({})", name, index.id);
                index
            }
            None => {
                info!("Creating vector index {}", name);
                self.api.create_vector_index(&name)?
            }
        };

        wait_until(
            &format!("vector index {name}"),
            self.settings.index_poll(),
            || {
                let current = self.api.get_vector_index(&index.id)?;
                match current.status {
                    IndexStatus::Completed => Ok(Some(current)),
                    IndexStatus::Failed | IndexStatus::Expired => Err(CopilotError::IndexFailed {
                        name: name.clone(),
                        status: current.status.to_string(),
                    }),
                    IndexStatus::InProgress | IndexStatus::Unknown => Ok(None),
                }
            },
        )
    }

    /// Upload record texts into `index` in batches
    #[inline]
    pub fn publish(&self, index: &VectorIndex, records: &[EmbeddingRecord]) -> Result<PublishReport> {
        let mut report = PublishReport::default();

        let publishable: Vec<&EmbeddingRecord> = records
            .iter()
            .filter(|record| {
                let empty = record.text.trim().is_empty();
                if empty {
                    warn!("Skipping {}: no text to publish", record.item_id);
                }
                !empty
            })
            .collect();
        report.skipped = records.len() - publishable.len();

        let staging = tempfile::tempdir()?;
        let bar = if self.progress && console::user_attended_stderr() {
            ProgressBar::new(publishable.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Uploading {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        for chunk in publishable.chunks(self.settings.batch_size.max(1)) {
            let granted = self.budget.try_reserve(chunk.len());
            if granted < chunk.len() {
                warn!(
                    "Publish budget reached, {} of {} files in this batch will be sent",
                    granted,
                    chunk.len()
                );
                report.truncated = true;
            }
            if granted == 0 {
                break;
            }

            let mut file_ids = Vec::with_capacity(granted);
            for record in &chunk[..granted] {
                bar.set_message(record.item_id.clone());
                match self.upload_record(staging.path(), record) {
                    Ok(id) => file_ids.push(id),
                    Err(e) => {
                        warn!("Skipping {}: upload failed: {}", record.item_id, e);
                        report.failed += 1;
                    }
                }
                bar.inc(1);
            }
            self.budget.release(granted - file_ids.len());

            if !file_ids.is_empty() {
                let batch = self.api.create_file_batch(&index.id, &file_ids)?;
                if batch.has_handle() {
                    self.wait_for_batch(&index.id, &batch.id)?;
                } else {
                    warn!(
                        "File batch for {} returned no id, continuing without waiting",
                        index.id
                    );
                    report.degraded_batches += 1;
                }

                report.uploaded += file_ids.len();
                report.batches.push(file_ids.len());
            }

            if report.truncated {
                break;
            }
        }

        bar.finish_and_clear();
        info!(
            "Published {} files in {} batches to {}",
            report.uploaded,
            report.batches.len(),
            index.id
        );
        Ok(report)
    }

    fn upload_record(&self, staging: &Path, record: &EmbeddingRecord) -> Result<String> {
        let path = staging.join(format!("{}.txt", file_name(&record.item_id)));
        fs::write(&path, &record.text)?;
        let uploaded = self.api.upload_file(&path);
        if let Err(e) = fs::remove_file(&path) {
            debug!("Could not remove staged file {}: {}", path.display(), e);
        }
        Ok(uploaded?.id)
    }

    fn wait_for_batch(&self, index_id: &str, batch_id: &str) -> Result<()> {
        wait_until(
            &format!("file batch {batch_id}"),
            self.settings.index_poll(),
            || {
                let batch = self.api.get_file_batch(index_id, batch_id)?;
                match batch.status {
                    BatchStatus::Completed => Ok(Some(())),
                    BatchStatus::Failed | BatchStatus::Cancelled => {
                        warn!(
                            "File batch {} ended as {:?} ({} failed files)",
                            batch_id, batch.status, batch.file_counts.failed
                        );
                        Ok(Some(()))
                    }
                    BatchStatus::InProgress | BatchStatus::Unknown => Ok(None),
                }
            },
        )
    }
}

/// File name safe for upload, derived from an item id
pub(crate) fn file_name(item_id: &str) -> String {
    let name: String = item_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = name.trim_matches('.');
    if name.is_empty() {
        "item".to_string()
    } else {
        name.to_string()
    }
}
