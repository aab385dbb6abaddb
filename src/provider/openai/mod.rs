#[cfg(test)]
mod tests;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use super::AssistantApi;
use super::types::{
    Assistant, AssistantSpec, FileBatch, MessageRole, Run, RunRequest, Thread, ThreadMessage,
    ToolResources, UploadedFile, VectorIndex,
};
use crate::config::{ApiType, AuthType, ProviderConfig};
use crate::{CopilotError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const LIST_LIMIT: u32 = 100;
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Blocking client for the OpenAI and Azure OpenAI assistant APIs
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: ProviderConfig,
    base_url: Url,
    agent: ureq::Agent,
    retry_attempts: u32,
    embedding_model: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    id: String,
    role: MessageRole,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

impl From<MessageObject> for ThreadMessage {
    fn from(message: MessageObject) -> Self {
        let text = message
            .content
            .into_iter()
            .filter(|c| c.kind == "text")
            .filter_map(|c| c.text.map(|t| t.value))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            id: message.id,
            role: message.role,
            text,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateAssistantRequest<'a> {
    name: &'a str,
    model: &'a str,
    instructions: &'a str,
    tools: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_resources: Option<ToolResources>,
    metadata: &'a std::collections::HashMap<String, String>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| CopilotError::Config(e.to_string()))?;
        let base_url = config
            .base_url()
            .map_err(|e| CopilotError::Config(e.to_string()))?;

        Ok(Self {
            config: config.clone(),
            base_url,
            agent: build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    /// Full URL for an API path, including the Azure `api-version` query
    #[inline]
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let raw = match self.config.api_type {
            ApiType::OpenAi => format!("{base}/{path}"),
            ApiType::Azure => format!("{base}/openai/{path}"),
        };
        let mut url = Url::parse(&raw)
            .map_err(|e| CopilotError::Config(format!("Invalid endpoint {raw}: {e}")))?;

        if self.config.api_type == ApiType::Azure {
            if let Some(version) = &self.config.api_version {
                url.query_pairs_mut().append_pair("api-version", version);
            }
        }
        Ok(url)
    }

    fn auth_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(3);
        match self.config.auth_type {
            AuthType::Azure => headers.push(("api-key", self.config.api_key.clone())),
            AuthType::OpenAi | AuthType::AzureAd => {
                headers.push(("Authorization", format!("Bearer {}", self.config.api_key)));
            }
        }
        if self.config.api_type == ApiType::OpenAi {
            headers.push(("OpenAI-Beta", "assistants=v2".to_string()));
            if let Some(organization) = &self.config.organization {
                headers.push(("OpenAI-Organization", organization.clone()));
            }
        }
        headers
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        self.auth_headers()
            .into_iter()
            .fold(request, |request, (name, value)| request.header(name, value))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);
        let body = self.make_request_with_retry(&url, || {
            let mut response = self.authorize(self.agent.get(url.as_str())).call()?;
            let status = response.status().as_u16();
            Ok((status, response.body_mut().read_to_string()?))
        })?;
        parse_body(&body, path)
    }

    /// Every item of a cursor-paged list; `path` must already carry a query
    fn list_all<T: DeserializeOwned>(&self, path: &str, id_of: fn(&T) -> &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page_path = match &after {
                Some(cursor) => format!("{path}&after={cursor}"),
                None => path.to_string(),
            };
            let page: ListResponse<T> = self.get_json(&page_path)?;
            let cursor = page
                .last_id
                .or_else(|| page.data.last().map(|item| id_of(item).to_string()));
            items.extend(page.data);

            match cursor {
                Some(cursor) if page.has_more && after.as_deref() != Some(cursor.as_str()) => {
                    debug!("Fetching next page of {} after {}", path, cursor);
                    after = Some(cursor);
                }
                _ => break,
            }
        }
        Ok(items)
    }

    fn post_json<T: DeserializeOwned>(&self, path: &str, payload: &serde_json::Value) -> Result<T> {
        let url = self.endpoint(path)?;
        let request_json = serde_json::to_string(payload)?;
        debug!("POST {}", url);
        let body = self.make_request_with_retry(&url, || {
            let mut response = self
                .authorize(self.agent.post(url.as_str()))
                .header("Content-Type", "application/json")
                .send(&request_json)?;
            let status = response.status().as_u16();
            Ok((status, response.body_mut().read_to_string()?))
        })?;
        parse_body(&body, path)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let url = self.endpoint(path)?;
        debug!("DELETE {}", url);
        self.make_request_with_retry(&url, || {
            let mut response = self.authorize(self.agent.delete(url.as_str())).call()?;
            let status = response.status().as_u16();
            Ok((status, response.body_mut().read_to_string()?))
        })?;
        Ok(())
    }

    fn make_request_with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<(u16, String), ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok((status, body)) if (200..300).contains(&status) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(body);
                }
                Ok((status, body)) if status >= 500 => {
                    warn!(
                        "Server error (status {}), attempt {}/{}",
                        status, attempt, self.retry_attempts
                    );
                    last_error = Some(provider_error(status, &body));
                }
                Ok((status, body)) => {
                    warn!("Client error (status {}), not retrying", status);
                    return Err(provider_error(status, &body));
                }
                Err(
                    error @ (ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_)),
                ) => {
                    warn!(
                        "Transport error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(CopilotError::Provider(format!("Request error: {error}")));
                }
                Err(error) => {
                    warn!("Non-retryable error: {}", error);
                    return Err(CopilotError::Provider(format!(
                        "Non-retryable error: {error}"
                    )));
                }
            }

            if attempt < self.retry_attempts {
                let delay = Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All retry attempts failed for request to {}", url);

        Err(last_error
            .unwrap_or_else(|| CopilotError::Provider("Request failed after retries".to_string())))
    }
}

impl AssistantApi for OpenAiClient {
    fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let path = match (self.config.api_type, &self.config.deployment) {
            (ApiType::Azure, Some(deployment)) => format!("deployments/{deployment}/embeddings"),
            _ => "embeddings".to_string(),
        };
        let response: ListResponse<EmbeddingData> = self.post_json(
            &path,
            &json!({ "model": self.embedding_model, "input": text }),
        )?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CopilotError::Provider("Empty embedding response".to_string()))?;
        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    fn list_assistants(&self) -> Result<Vec<Assistant>> {
        self.list_all(
            &format!("assistants?order=desc&limit={LIST_LIMIT}"),
            |assistant: &Assistant| assistant.id.as_str(),
        )
    }

    fn get_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        self.get_json(&format!("assistants/{assistant_id}"))
    }

    fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant> {
        let has_indexes = !spec.vector_index_ids.is_empty();
        let request = CreateAssistantRequest {
            name: &spec.name,
            model: &spec.model,
            instructions: &spec.instructions,
            tools: if has_indexes {
                json!([{ "type": "file_search" }])
            } else {
                json!([])
            },
            tool_resources: has_indexes.then(|| ToolResources::for_indexes(&spec.vector_index_ids)),
            metadata: &spec.metadata,
        };
        self.post_json("assistants", &serde_json::to_value(&request)?)
    }

    fn delete_assistant(&self, assistant_id: &str) -> Result<()> {
        self.delete(&format!("assistants/{assistant_id}"))
    }

    fn create_thread(&self, vector_index_id: Option<&str>) -> Result<Thread> {
        let payload = match vector_index_id {
            Some(id) => json!({ "tool_resources": ToolResources::for_indexes(&[id.to_string()]) }),
            None => json!({}),
        };
        self.post_json("threads", &payload)
    }

    fn add_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage> {
        let message: MessageObject = self.post_json(
            &format!("threads/{thread_id}/messages"),
            &json!({ "role": "user", "content": content }),
        )?;
        Ok(message.into())
    }

    fn latest_message(&self, thread_id: &str) -> Result<Option<ThreadMessage>> {
        let response: ListResponse<MessageObject> =
            self.get_json(&format!("threads/{thread_id}/messages?order=desc&limit=1"))?;
        Ok(response.data.into_iter().next().map(Into::into))
    }

    fn start_run(&self, thread_id: &str, request: &RunRequest) -> Result<Run> {
        let mut payload = json!({
            "assistant_id": request.assistant_id,
            "max_completion_tokens": request.max_output_tokens,
        });
        if request.vector_index_id.is_some() {
            payload["tools"] = json!([{ "type": "file_search" }]);
        }
        self.post_json(&format!("threads/{thread_id}/runs"), &payload)
    }

    fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.get_json(&format!("threads/{thread_id}/runs/{run_id}"))
    }

    fn list_vector_indexes(&self) -> Result<Vec<VectorIndex>> {
        self.list_all(
            &format!("vector_stores?limit={LIST_LIMIT}"),
            |index: &VectorIndex| index.id.as_str(),
        )
    }

    fn get_vector_index(&self, index_id: &str) -> Result<VectorIndex> {
        self.get_json(&format!("vector_stores/{index_id}"))
    }

    fn create_vector_index(&self, name: &str) -> Result<VectorIndex> {
        self.post_json("vector_stores", &json!({ "name": name }))
    }

    fn delete_vector_index(&self, index_id: &str) -> Result<()> {
        self.delete(&format!("vector_stores/{index_id}"))
    }

    fn upload_file(&self, path: &Path) -> Result<UploadedFile> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CopilotError::Provider(format!("Not a file: {}", path.display())))?;
        let contents = fs::read(path)?;
        let boundary = format!("pshelp-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, &file_name, &contents);
        let url = self.endpoint("files")?;
        debug!("Uploading {} ({} bytes)", file_name, contents.len());

        let response = self.make_request_with_retry(&url, || {
            let mut response = self
                .authorize(self.agent.post(url.as_str()))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .send(body.as_slice())?;
            let status = response.status().as_u16();
            Ok((status, response.body_mut().read_to_string()?))
        })?;
        parse_body(&response, "files")
    }

    fn create_file_batch(&self, index_id: &str, file_ids: &[String]) -> Result<FileBatch> {
        self.post_json(
            &format!("vector_stores/{index_id}/file_batches"),
            &json!({ "file_ids": file_ids }),
        )
    }

    fn get_file_batch(&self, index_id: &str, batch_id: &str) -> Result<FileBatch> {
        self.get_json(&format!("vector_stores/{index_id}/file_batches/{batch_id}"))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

fn parse_body<T: DeserializeOwned>(body: &str, path: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| CopilotError::Provider(format!("Failed to parse response from {path}: {e}")))
}

fn provider_error(status: u16, body: &str) -> CopilotError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => CopilotError::Provider(format!(
            "HTTP {status} ({}): {}",
            envelope.error.code.as_deref().unwrap_or("error"),
            envelope.error.message
        )),
        Err(_) => CopilotError::Provider(format!("HTTP {status}")),
    }
}

/// `multipart/form-data` body for the file upload endpoint
fn multipart_body(boundary: &str, file_name: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(contents.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"purpose\"\r\n\r\nassistants\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
