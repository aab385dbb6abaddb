
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use super::EmbeddingTable;
use super::store::{EmbeddingRecord, EmbeddingStore, WriteOutcome};
use crate::Result;
use crate::help::HelpSource;
use crate::normalize::Normalizer;
use crate::provider::AssistantApi;
use crate::session::EmbeddingTableSource;

/// Counts from one cache build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub collection: String,
    pub version: String,
    pub written: usize,
    pub overwritten: usize,
    pub skipped_existing: usize,
    pub missing_help: Vec<String>,
}

impl BuildReport {
    #[inline]
    pub fn embedded(&self) -> usize {
        self.written + self.overwritten
    }
}

/// Builds the local cache: help -> normalize -> embed -> store
pub struct LocalCacheBuilder<'a> {
    api: &'a dyn AssistantApi,
    help: &'a dyn HelpSource,
    store: &'a EmbeddingStore,
    normalizer: Normalizer,
    force: bool,
    progress: bool,
}

impl<'a> LocalCacheBuilder<'a> {
    #[inline]
    pub fn new(api: &'a dyn AssistantApi, help: &'a dyn HelpSource, store: &'a EmbeddingStore) -> Self {
        Self {
            api,
            help,
            store,
            normalizer: Normalizer::default(),
            force: false,
            progress: false,
        }
    }

    #[inline]
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Re-embed and overwrite records that already exist
    #[inline]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[inline]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Embed every documented command of `module` into the local cache
    #[inline]
    pub fn build(&self, module: &str) -> Result<BuildReport> {
        let info = self.help.module(module)?;
        info!(
            "Building local cache for {} {} ({} commands)",
            info.name,
            info.version,
            info.commands.len()
        );

        let mut report = BuildReport {
            collection: info.name.clone(),
            version: info.version.clone(),
            ..BuildReport::default()
        };

        let bar = if self.progress && console::user_attended_stderr() {
            ProgressBar::new(info.commands.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        for command in &info.commands {
            bar.set_message(command.clone());
            bar.inc(1);

            let path = self.store.record_path(&info.name, &info.version, command);
            if path.exists() && !self.force {
                debug!("{} already cached", command);
                report.skipped_existing += 1;
                continue;
            }

            let Some(help) = self.help.command_help(&info.name, command)? else {
                warn!("Skipping {}: no help available", command);
                report.missing_help.push(command.clone());
                continue;
            };

            let text = self.normalizer.normalize(&help.render());
            let embedding = self.api.embed(&text)?;
            let record = EmbeddingRecord {
                item_id: command.clone(),
                text,
                embedding,
            };

            match self
                .store
                .write(&info.name, &info.version, &record, self.force)?
            {
                WriteOutcome::Written => report.written += 1,
                WriteOutcome::Overwritten => report.overwritten += 1,
                WriteOutcome::Skipped => report.skipped_existing += 1,
            }
        }

        bar.finish_and_clear();
        info!(
            "Cached {} commands for {} {} ({} skipped, {} without help)",
            report.embedded(),
            report.collection,
            report.version,
            report.skipped_existing,
            report.missing_help.len()
        );
        Ok(report)
    }
}

impl EmbeddingTableSource for LocalCacheBuilder<'_> {
    /// Reads the cached table, building the cache first when it is empty
    fn load_table(&self, collection: &str) -> Result<EmbeddingTable> {
        let table = self.store.embedding_table(collection)?;
        if !table.is_empty() {
            return Ok(table);
        }

        info!("No cached embeddings for {}, building them", collection);
        self.build(collection)?;
        self.store.embedding_table(collection)
    }
}
