// Chat turn orchestration
// Builds the prompt, drives a run to completion and recovers from rate limits


use fancy_regex::Regex;
use itertools::Itertools;
use serde::Serialize;
use serde_json::json;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::assistants;
use crate::config::ChatSettings;
use crate::context::UsageLedger;
use crate::embeddings::rank;
use crate::normalize::normalize;
use crate::poll::wait_until;
use crate::provider::{AssistantApi, Run, RunError, RunRequest, ThreadMessage, Usage};
use crate::session::Session;
use crate::{CopilotError, Result};

static RETRY_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)try again in\s*(?:(\d+)m(?!s))?(?:(\d+(?:\.\d+)?)s)?(?:(\d+)ms)?")
        .expect("regex is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOptions {
    /// Prepend the closest cached commands to the message
    pub want_hints: bool,
    pub suppress_retrieval_reminder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutput {
    pub answer: String,
    pub usage: Usage,
}

impl TurnOutput {
    #[inline]
    pub fn to_detailed_json(&self) -> serde_json::Value {
        json!({
            "answer": self.answer,
            "prompt_tokens": self.usage.prompt_tokens,
            "completion_tokens": self.usage.completion_tokens,
            "total_tokens": self.usage.total_tokens,
        })
    }
}

pub type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

pub struct ChatOrchestrator<'a> {
    api: &'a dyn AssistantApi,
    settings: &'a ChatSettings,
    sleeper: Sleeper,
    ledger: Option<&'a UsageLedger>,
}

impl<'a> ChatOrchestrator<'a> {
    #[inline]
    pub fn new(api: &'a dyn AssistantApi, settings: &'a ChatSettings) -> Self {
        Self {
            api,
            settings,
            sleeper: Box::new(std::thread::sleep),
            ledger: None,
        }
    }

    /// Replace the function used to wait out rate limits
    #[inline]
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[inline]
    pub fn with_ledger(mut self, ledger: &'a UsageLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Send one user message on the session's thread and return the reply
    #[inline]
    pub fn send_turn(
        &self,
        session: &mut Session,
        message: &str,
        options: TurnOptions,
    ) -> Result<TurnOutput> {
        let prompt = self.compose_prompt(session, message, options)?;

        let assistant_id = match &session.assistant {
            Some(assistant) => assistant.id.clone(),
            None => {
                let name = &session.key.assistant_name;
                let assistant = assistants::find_by_name(self.api, name)?
                    .ok_or_else(|| CopilotError::AssistantNotFound(name.clone()))?;
                debug!("Resolved assistant {} to {}", name, assistant.id);
                let id = assistant.id.clone();
                session.assistant = Some(assistant);
                id
            }
        };

        let thread_id = session.thread.id.clone();
        self.api.add_message(&thread_id, &prompt)?;

        let request = RunRequest {
            assistant_id,
            max_output_tokens: self.settings.max_output_tokens,
            vector_index_id: session.thread.vector_index_id().map(str::to_string),
        };

        let mut retries = 0_u32;
        loop {
            let run = self.run_to_completion(&thread_id, &request)?;
            let latest = self.api.latest_message(&thread_id)?;

            if let Some(reply) = latest.filter(|m| !is_echo(m, &prompt)) {
                let usage = run.usage.unwrap_or_default();
                if let Some(ledger) = self.ledger {
                    ledger.record(&usage);
                }
                session.turns += 1;
                return Ok(TurnOutput {
                    answer: reply.text,
                    usage,
                });
            }

            // No reply was written, so the run failed
            let error = run.last_error.unwrap_or_else(|| RunError {
                code: run.status.to_string(),
                message: "run finished without a reply".to_string(),
            });
            if !error.is_rate_limit() {
                return Err(CopilotError::RunFailed {
                    code: error.code,
                    message: error.message,
                });
            }
            if retries >= self.settings.rate_limit_retries {
                return Err(CopilotError::RateLimited {
                    retries,
                    message: error.message,
                });
            }

            retries += 1;
            let wait = parse_retry_after(&error.message)
                .unwrap_or(Duration::from_secs(self.settings.default_rate_limit_wait_secs))
                .min(Duration::from_secs(self.settings.max_rate_limit_wait_secs));
            warn!(
                "Rate limited, retry {}/{} in {:?}",
                retries, self.settings.rate_limit_retries, wait
            );
            (self.sleeper)(wait);
        }
    }

    fn compose_prompt(
        &self,
        session: &Session,
        message: &str,
        options: TurnOptions,
    ) -> Result<String> {
        if options.want_hints {
            if session.embedding_table.is_empty() {
                warn!("Hints requested but no embeddings are loaded");
                return Ok(message.to_string());
            }
            let query = self.api.embed(&normalize(message))?;
            let hints = rank(&query, &session.embedding_table, self.settings.hint_count)?;
            let names = hints.iter().map(|h| h.item_id.as_str()).join(", ");
            debug!("Hints: {}", names);
            return Ok(format!("Retrieved Suggestions: {names}\n\n{message}"));
        }

        if options.suppress_retrieval_reminder || self.settings.retrieval_reminder.trim().is_empty()
        {
            return Ok(message.to_string());
        }
        Ok(format!("{message}\n\n{}", self.settings.retrieval_reminder))
    }

    fn run_to_completion(&self, thread_id: &str, request: &RunRequest) -> Result<Run> {
        let run = self.api.start_run(thread_id, request)?;
        info!("Started run {} on thread {}", run.id, thread_id);

        wait_until(&format!("run {}", run.id), self.settings.run_poll(), || {
            let current = self.api.get_run(thread_id, &run.id)?;
            Ok(current.status.is_terminal().then_some(current))
        })
    }
}

/// The newest thread message is the submitted one, so no reply was written
#[inline]
pub fn is_echo(latest: &ThreadMessage, submitted: &str) -> bool {
    latest.text.trim() == submitted.trim()
}

/// Wait suggested by a rate-limit message such as "try again in 1m20s"
#[inline]
pub fn parse_retry_after(message: &str) -> Option<Duration> {
    let captures = RETRY_AFTER.captures(message).ok()??;

    // Digits that overflow saturate; the caller clamps to the configured maximum
    let minutes = captures
        .get(1)
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX));
    let seconds = captures.get(2).map(|m| {
        m.as_str()
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(Duration::MAX)
    });
    let millis = captures
        .get(3)
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX));
    if minutes.is_none() && seconds.is_none() && millis.is_none() {
        return None;
    }

    Some(
        Duration::from_secs(minutes.unwrap_or(0).saturating_mul(60))
            .saturating_add(seconds.unwrap_or(Duration::ZERO))
            .saturating_add(Duration::from_millis(millis.unwrap_or(0))),
    )
}
