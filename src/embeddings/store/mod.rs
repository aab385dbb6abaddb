
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::EmbeddingTable;
use crate::{CopilotError, Result};

/// One cached command: its normalized help text and embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    #[serde(rename = "Command")]
    pub item_id: String,
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "Embedding")]
    pub embedding: Vec<f64>,
}

/// A cached collection directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Overwritten,
    Skipped,
}

/// On-disk cache laid out as `<base>/<collection>/<version>/<item_id>.json`
///
/// The active version of a collection is the greatest version directory name
/// by plain string comparison, so "9.0.0" wins over "10.0.0".
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    base_dir: PathBuf,
}

impl EmbeddingStore {
    #[inline]
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    #[inline]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.base_dir.join(collection)
    }

    #[inline]
    pub fn record_path(&self, collection: &str, version: &str, item_id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(version)
            .join(format!("{item_id}.json"))
    }

    /// Persist one record, leaving an existing file alone unless `force` is set
    #[inline]
    pub fn write(
        &self,
        collection: &str,
        version: &str,
        record: &EmbeddingRecord,
        force: bool,
    ) -> Result<WriteOutcome> {
        for segment in [collection, version, record.item_id.as_str()] {
            validate_segment(segment)?;
        }

        let path = self.record_path(collection, version, &record.item_id);
        let existed = path.exists();
        if existed && !force {
            debug!("Skipping existing record {}", path.display());
            return Ok(WriteOutcome::Skipped);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_vec(record)?)?;
        debug!("Wrote record {}", path.display());

        Ok(if existed {
            WriteOutcome::Overwritten
        } else {
            WriteOutcome::Written
        })
    }

    /// Name of the active version directory, if the collection exists
    #[inline]
    pub fn latest_version(&self, collection: &str) -> Result<Option<String>> {
        let mut versions: Vec<String> = subdirectories(&self.collection_dir(collection))?
            .into_iter()
            .map(|c| c.name)
            .collect();
        versions.sort();
        Ok(versions.pop())
    }

    /// All records of the active version; unreadable records are skipped
    #[inline]
    pub fn read_latest(&self, collection: &str) -> Result<Vec<EmbeddingRecord>> {
        let Some(version) = self.latest_version(collection)? else {
            return Ok(Vec::new());
        };
        self.read_version(collection, &version)
    }

    #[inline]
    pub fn read_version(&self, collection: &str, version: &str) -> Result<Vec<EmbeddingRecord>> {
        let dir = self.collection_dir(collection).join(version);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        debug!(
            "Loaded {} records for {} v{}",
            records.len(),
            collection,
            version
        );
        Ok(records)
    }

    /// item_id -> embedding for the active version
    #[inline]
    pub fn embedding_table(&self, collection: &str) -> Result<EmbeddingTable> {
        Ok(self
            .read_latest(collection)?
            .into_iter()
            .map(|r| (r.item_id, r.embedding))
            .collect())
    }

    #[inline]
    pub fn collections(&self) -> Result<Vec<Collection>> {
        list_collections(&self.base_dir)
    }
}

/// One entry per immediate subdirectory of `base_path`
#[inline]
pub fn list_collections(base_path: &Path) -> Result<Vec<Collection>> {
    subdirectories(base_path)
}

fn subdirectories(dir: &Path) -> Result<Vec<Collection>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut collections = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            collections.push(Collection {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
            });
        }
    }
    collections.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(collections)
}

fn read_record(path: &Path) -> Result<EmbeddingRecord> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty()
        || segment == "."
        || segment.contains("..")
        || segment.contains(['/', '\\'])
    {
        return Err(CopilotError::InvalidItemId(segment.to_string()));
    }
    Ok(())
}
