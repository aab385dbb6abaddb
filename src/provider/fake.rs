// In-memory provider used by unit tests

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use super::AssistantApi;
use super::types::{
    Assistant, AssistantSpec, BatchStatus, FileBatch, FileCounts, IndexStatus, MessageRole, Run,
    RunError, RunRequest, RunStatus, Thread, ThreadMessage, ToolResources, UploadedFile, Usage,
    VectorIndex,
};
use crate::{CopilotError, Result};

/// What the next run does to the thread
#[derive(Debug, Clone)]
pub(crate) enum RunScript {
    Reply(String),
    /// Run finishes but no reply is written; the user's message stays newest
    Echo(Option<RunError>),
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub assistants: Vec<Assistant>,
    pub threads: HashMap<String, Thread>,
    pub messages: HashMap<String, Vec<ThreadMessage>>,
    pub run_script: VecDeque<RunScript>,
    pub runs: HashMap<String, Run>,
    pub run_requests: Vec<RunRequest>,
    pub indexes: Vec<VectorIndex>,
    /// Statuses returned by successive `get_vector_index` calls
    pub index_statuses: VecDeque<IndexStatus>,
    pub uploads: Vec<(String, String)>,
    /// Upload file names the provider rejects
    pub rejected_uploads: Vec<String>,
    pub batches: Vec<Vec<String>>,
    pub batch_without_handle: bool,
    pub embeddings: HashMap<String, Vec<f64>>,
    pub embed_calls: usize,
    pub counter: usize,
}

#[derive(Debug, Default)]
pub(crate) struct FakeProvider {
    pub state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().expect("fake state lock");
        f(&mut state)
    }

    pub fn add_assistant(&self, name: &str, owned: bool) -> Assistant {
        let mut spec = AssistantSpec::new(name, "gpt-4o", "instructions");
        if !owned {
            spec.metadata.clear();
        }
        self.create_assistant(&spec).expect("fake create")
    }

    pub fn script_run(&self, script: RunScript) {
        self.with(|s| s.run_script.push_back(script));
    }

    pub fn set_embedding(&self, text: &str, embedding: Vec<f64>) {
        self.with(|s| s.embeddings.insert(text.to_string(), embedding));
    }

    fn next_id(state: &mut FakeState, prefix: &str) -> String {
        state.counter += 1;
        format!("{prefix}_{}", state.counter)
    }
}

impl AssistantApi for FakeProvider {
    fn embed(&self, text: &str) -> Result<Vec<f64>> {
        self.with(|s| {
            s.embed_calls += 1;
            Ok(s.embeddings
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![text.len() as f64, 1.0, 0.5]))
        })
    }

    fn list_assistants(&self) -> Result<Vec<Assistant>> {
        self.with(|s| Ok(s.assistants.clone()))
    }

    fn get_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        self.with(|s| {
            s.assistants
                .iter()
                .find(|a| a.id == assistant_id)
                .cloned()
                .ok_or_else(|| CopilotError::Provider(format!("HTTP 404: {assistant_id}")))
        })
    }

    fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant> {
        self.with(|s| {
            let assistant = Assistant {
                id: Self::next_id(s, "asst"),
                name: Some(spec.name.clone()),
                model: spec.model.clone(),
                instructions: Some(spec.instructions.clone()),
                created_at: 1_700_000_000,
                metadata: spec.metadata.clone(),
                tool_resources: (!spec.vector_index_ids.is_empty())
                    .then(|| ToolResources::for_indexes(&spec.vector_index_ids)),
            };
            s.assistants.push(assistant.clone());
            Ok(assistant)
        })
    }

    fn delete_assistant(&self, assistant_id: &str) -> Result<()> {
        self.with(|s| {
            s.assistants.retain(|a| a.id != assistant_id);
            Ok(())
        })
    }

    fn create_thread(&self, vector_index_id: Option<&str>) -> Result<Thread> {
        self.with(|s| {
            let thread = Thread {
                id: Self::next_id(s, "thread"),
                tool_resources: vector_index_id
                    .map(|id| ToolResources::for_indexes(&[id.to_string()])),
            };
            s.threads.insert(thread.id.clone(), thread.clone());
            s.messages.insert(thread.id.clone(), Vec::new());
            Ok(thread)
        })
    }

    fn add_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage> {
        self.with(|s| {
            let message = ThreadMessage {
                id: Self::next_id(s, "msg"),
                role: MessageRole::User,
                text: content.to_string(),
            };
            s.messages
                .get_mut(thread_id)
                .ok_or_else(|| CopilotError::Provider(format!("no thread {thread_id}")))?
                .push(message.clone());
            Ok(message)
        })
    }

    fn latest_message(&self, thread_id: &str) -> Result<Option<ThreadMessage>> {
        self.with(|s| Ok(s.messages.get(thread_id).and_then(|m| m.last().cloned())))
    }

    fn start_run(&self, thread_id: &str, request: &RunRequest) -> Result<Run> {
        self.with(|s| {
            s.run_requests.push(request.clone());
            let script = s
                .run_script
                .pop_front()
                .unwrap_or_else(|| RunScript::Reply("ok".to_string()));
            let id = Self::next_id(s, "run");

            let run = match script {
                RunScript::Reply(text) => {
                    let message = ThreadMessage {
                        id: Self::next_id(s, "msg"),
                        role: MessageRole::Assistant,
                        text,
                    };
                    s.messages
                        .entry(thread_id.to_string())
                        .or_default()
                        .push(message);
                    Run {
                        id,
                        status: RunStatus::Completed,
                        last_error: None,
                        usage: Some(Usage {
                            prompt_tokens: 10,
                            completion_tokens: 5,
                            total_tokens: 15,
                        }),
                    }
                }
                RunScript::Echo(last_error) => Run {
                    id,
                    status: if last_error.is_some() {
                        RunStatus::Failed
                    } else {
                        RunStatus::Completed
                    },
                    last_error,
                    usage: None,
                },
            };

            // The first poll sees the run in progress
            let pending = Run {
                status: RunStatus::InProgress,
                ..run.clone()
            };
            s.runs.insert(run.id.clone(), run);
            Ok(pending)
        })
    }

    fn get_run(&self, _thread_id: &str, run_id: &str) -> Result<Run> {
        self.with(|s| {
            s.runs
                .get(run_id)
                .cloned()
                .ok_or_else(|| CopilotError::Provider(format!("no run {run_id}")))
        })
    }

    fn list_vector_indexes(&self) -> Result<Vec<VectorIndex>> {
        self.with(|s| Ok(s.indexes.clone()))
    }

    fn get_vector_index(&self, index_id: &str) -> Result<VectorIndex> {
        self.with(|s| {
            let status = s.index_statuses.pop_front().unwrap_or(IndexStatus::Completed);
            let index = s
                .indexes
                .iter_mut()
                .find(|i| i.id == index_id)
                .ok_or_else(|| CopilotError::Provider(format!("no index {index_id}")))?;
            index.status = status;
            Ok(index.clone())
        })
    }

    fn create_vector_index(&self, name: &str) -> Result<VectorIndex> {
        self.with(|s| {
            let index = VectorIndex {
                id: Self::next_id(s, "vs"),
                name: Some(name.to_string()),
                status: IndexStatus::InProgress,
                file_counts: FileCounts::default(),
            };
            s.indexes.push(index.clone());
            Ok(index)
        })
    }

    fn delete_vector_index(&self, index_id: &str) -> Result<()> {
        self.with(|s| {
            s.indexes.retain(|i| i.id != index_id);
            Ok(())
        })
    }

    fn upload_file(&self, path: &Path) -> Result<UploadedFile> {
        let contents = std::fs::read_to_string(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.with(|s| {
            if s.rejected_uploads.contains(&file_name) {
                return Err(CopilotError::Provider(format!(
                    "HTTP 400 (invalid_file): {file_name} was rejected"
                )));
            }
            let id = Self::next_id(s, "file");
            s.uploads.push((file_name.clone(), contents.clone()));
            Ok(UploadedFile {
                id,
                filename: file_name,
                bytes: contents.len() as u64,
            })
        })
    }

    fn create_file_batch(&self, _index_id: &str, file_ids: &[String]) -> Result<FileBatch> {
        self.with(|s| {
            s.batches.push(file_ids.to_vec());
            let id = if s.batch_without_handle {
                String::new()
            } else {
                Self::next_id(s, "vsfb")
            };
            Ok(FileBatch {
                id,
                status: BatchStatus::InProgress,
                file_counts: FileCounts::default(),
            })
        })
    }

    fn get_file_batch(&self, _index_id: &str, batch_id: &str) -> Result<FileBatch> {
        Ok(FileBatch {
            id: batch_id.to_string(),
            status: BatchStatus::Completed,
            file_counts: FileCounts::default(),
        })
    }
}
