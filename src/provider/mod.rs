// Hosted provider module
// The calls this crate makes against the assistant, vector-store and embedding APIs

#[cfg(test)]
pub(crate) mod fake;
pub mod openai;
pub mod types;

use std::path::Path;

use crate::Result;

pub use openai::OpenAiClient;
pub use types::{
    Assistant, AssistantSpec, BatchStatus, FileBatch, FileCounts, IndexStatus, MessageRole, Run,
    RunError, RunRequest, RunStatus, Thread, ThreadMessage, ToolResources, UploadedFile, Usage,
    VectorIndex,
};

/// Remote operations consumed from the hosted provider
///
/// Every call blocks until the provider answers. Waiting for runs, indexes
/// and file batches is done by callers on top of the `get_*` calls.
pub trait AssistantApi: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f64>>;

    fn list_assistants(&self) -> Result<Vec<Assistant>>;
    fn get_assistant(&self, assistant_id: &str) -> Result<Assistant>;
    fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant>;
    fn delete_assistant(&self, assistant_id: &str) -> Result<()>;

    fn create_thread(&self, vector_index_id: Option<&str>) -> Result<Thread>;
    fn add_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage>;
    /// Newest message on the thread, whoever wrote it
    fn latest_message(&self, thread_id: &str) -> Result<Option<ThreadMessage>>;

    fn start_run(&self, thread_id: &str, request: &RunRequest) -> Result<Run>;
    fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    fn list_vector_indexes(&self) -> Result<Vec<VectorIndex>>;
    fn get_vector_index(&self, index_id: &str) -> Result<VectorIndex>;
    fn create_vector_index(&self, name: &str) -> Result<VectorIndex>;
    fn delete_vector_index(&self, index_id: &str) -> Result<()>;

    fn upload_file(&self, path: &Path) -> Result<UploadedFile>;
    fn create_file_batch(&self, index_id: &str, file_ids: &[String]) -> Result<FileBatch>;
    fn get_file_batch(&self, index_id: &str, batch_id: &str) -> Result<FileBatch>;
}
