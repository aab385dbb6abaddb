use thiserror::Error;

pub type Result<T> = std::result::Result<T, CopilotError>;

#[derive(Error, Debug)]
pub enum CopilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Embedding for '{item_id}' has {actual} dimensions, query has {expected}")]
    DimensionMismatch {
        item_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid item id '{0}': ids cannot contain path separators or '..'")]
    InvalidItemId(String),

    #[error("Vector index '{name}' entered terminal status {status}")]
    IndexFailed { name: String, status: String },

    #[error("Timed out after {seconds}s waiting for {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Still rate limited after {retries} retries: {message}")]
    RateLimited { retries: u32, message: String },

    #[error("Run failed with {code}: {message}")]
    RunFailed { code: String, message: String },

    #[error("No assistant named '{0}' exists for this provider")]
    AssistantNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod assistants;
pub mod chat;
pub mod commands;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod export;
pub mod help;
pub mod normalize;
pub mod poll;
pub mod provider;
pub mod session;
pub mod sync;

/// Tag stored in assistant metadata to mark assistants managed by this tool
pub const ASSISTANT_TAG: &str = "PSHelp.Copilot";
