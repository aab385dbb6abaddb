use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ASSISTANT_TAG;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSearchResources {
    #[serde(default)]
    pub vector_store_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResources {
    #[serde(default)]
    pub file_search: Option<FileSearchResources>,
}

impl ToolResources {
    #[inline]
    pub fn for_indexes(ids: &[String]) -> Self {
        Self {
            file_search: Some(FileSearchResources {
                vector_store_ids: ids.to_vec(),
            }),
        }
    }

    #[inline]
    pub fn vector_index_ids(&self) -> &[String] {
        self.file_search
            .as_ref()
            .map_or(&[], |fs| fs.vector_store_ids.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub tool_resources: Option<ToolResources>,
}

impl Assistant {
    /// Whether this assistant carries the ownership tag
    #[inline]
    pub fn is_owned(&self) -> bool {
        self.metadata.get("tag").is_some_and(|t| t == ASSISTANT_TAG)
    }

    #[inline]
    pub fn has_name(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    #[inline]
    pub fn vector_index_ids(&self) -> &[String] {
        self.tool_resources
            .as_ref()
            .map_or(&[], ToolResources::vector_index_ids)
    }
}

/// Parameters for a new assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantSpec {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub vector_index_ids: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl AssistantSpec {
    /// Spec tagged as owned by this tool
    #[inline]
    pub fn new(name: &str, model: &str, instructions: &str) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            instructions: instructions.to_string(),
            vector_index_ids: Vec::new(),
            metadata: HashMap::from([("tag".to_string(), ASSISTANT_TAG.to_string())]),
        }
    }

    #[inline]
    pub fn with_vector_indexes(mut self, ids: Vec<String>) -> Self {
        self.vector_index_ids = ids;
        self
    }

    #[inline]
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub tool_resources: Option<ToolResources>,
}

impl Thread {
    #[inline]
    pub fn vector_index_id(&self) -> Option<&str> {
        self.tool_resources
            .as_ref()
            .and_then(|r| r.vector_index_ids().first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A thread message flattened to its text content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Failed | Self::Completed | Self::Incomplete | Self::Expired
        )
    }
}

impl std::fmt::Display for RunStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl RunError {
    #[inline]
    pub fn is_rate_limit(&self) -> bool {
        self.code == "rate_limit_exceeded"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    #[inline]
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Parameters for starting a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub assistant_id: String,
    pub max_output_tokens: u32,
    pub vector_index_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    InProgress,
    Completed,
    Failed,
    Expired,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for IndexStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            IndexStatus::InProgress => write!(f, "in_progress"),
            IndexStatus::Completed => write!(f, "completed"),
            IndexStatus::Failed => write!(f, "failed"),
            IndexStatus::Expired => write!(f, "expired"),
            IndexStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCounts {
    #[serde(default)]
    pub in_progress: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndex {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: IndexStatus,
    #[serde(default)]
    pub file_counts: FileCounts,
}

impl VectorIndex {
    #[inline]
    pub fn file_count(&self) -> u64 {
        self.file_counts.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Completed,
    Cancelled,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBatch {
    #[serde(default)]
    pub id: String,
    pub status: BatchStatus,
    #[serde(default)]
    pub file_counts: FileCounts,
}

impl FileBatch {
    /// A batch can only be awaited when the provider returned its id
    #[inline]
    pub fn has_handle(&self) -> bool {
        !self.id.trim().is_empty()
    }
}
