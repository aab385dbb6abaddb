
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::poll::PollSettings;

pub const SETTINGS_FILE: &str = "settings.toml";
pub const HOME_ENV_VAR: &str = "PSHELP_COPILOT_HOME";

pub const DEFAULT_RETRIEVAL_REMINDER: &str = "Use the retrieval documents attached to this assistant to answer. \
If they do not cover the question, say so instead of guessing.";

pub const DEFAULT_INSTRUCTIONS: &str = "You are an assistant for a command-line module. \
Answer questions about its commands using the attached help documents, \
and include a working example whenever one applies.";

/// Tunables persisted in `settings.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Settings {
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub publish: PublishSettings,
    #[serde(default)]
    pub sessions: SessionSettings,
    #[serde(default)]
    pub assistant: AssistantSettings,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatSettings {
    pub max_output_tokens: u32,
    pub hint_count: usize,
    pub retrieval_reminder: String,
    pub rate_limit_retries: u32,
    pub default_rate_limit_wait_secs: u64,
    pub max_rate_limit_wait_secs: u64,
    pub run_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: 2048,
            hint_count: 5,
            retrieval_reminder: DEFAULT_RETRIEVAL_REMINDER.to_string(),
            rate_limit_retries: 5,
            default_rate_limit_wait_secs: 60,
            max_rate_limit_wait_secs: 300,
            run_timeout_secs: 300,
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishSettings {
    pub batch_size: usize,
    pub max_total_files: usize,
    pub index_ready_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_total_files: 10_000,
            index_ready_timeout_secs: 120,
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    pub capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { capacity: 32 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantSettings {
    pub default_assistant: Option<String>,
    pub model: String,
    pub embedding_model: String,
    pub instructions: String,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            default_assistant: None,
            model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("No API key configured; run configure-provider or set OPENAI_API_KEY")]
    MissingApiKey,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Azure providers require a {0}")]
    MissingAzureSetting(&'static str),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid max output tokens: {0} (must be between 1 and 32768)")]
    InvalidMaxOutputTokens(u32),
    #[error("Invalid hint count: {0} (must be between 1 and 50)")]
    InvalidHintCount(usize),
    #[error("Invalid rate limit retries: {0} (must be 20 or less)")]
    InvalidRateLimitRetries(u32),
    #[error("Invalid batch size: {0} (must be between 1 and 500)")]
    InvalidBatchSize(usize),
    #[error("Invalid max total files: {0} (must be at least the batch size {1})")]
    InvalidMaxTotalFiles(usize, usize),
    #[error("Invalid {0}: {1} (must be between 1 and 3600 seconds)")]
    InvalidTimeout(&'static str, u64),
    #[error("Invalid poll interval: {0}ms (must be 60000 or less)")]
    InvalidPollInterval(u64),
    #[error("Invalid session capacity: {0} (must be between 1 and 10000)")]
    InvalidSessionCapacity(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Settings {
    /// Per-user configuration directory, overridable with `PSHELP_COPILOT_HOME`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR) {
            return Ok(PathBuf::from(home));
        }
        dirs::config_dir()
            .map(|dir| dir.join("pshelp-copilot"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let settings_path = config_dir.as_ref().join(SETTINGS_FILE);

        if !settings_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&settings_path).with_context(|| {
            format!("Failed to read settings file: {}", settings_path.display())
        })?;

        let mut settings: Settings = toml::from_str(&content).with_context(|| {
            format!("Failed to parse settings file: {}", settings_path.display())
        })?;
        settings.base_dir = config_dir.as_ref().to_path_buf();

        settings
            .validate()
            .with_context(|| "Settings validation failed")?;

        Ok(settings)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Settings validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let settings_path = self.settings_file_path();
        let content =
            toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;

        fs::write(&settings_path, content).with_context(|| {
            format!("Failed to write settings file: {}", settings_path.display())
        })?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn settings_file_path(&self) -> PathBuf {
        self.base_dir.join(SETTINGS_FILE)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chat.validate()?;
        self.publish.validate()?;

        if !(1..=10_000).contains(&self.sessions.capacity) {
            return Err(ConfigError::InvalidSessionCapacity(self.sessions.capacity));
        }

        if self.assistant.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.assistant.model.clone()));
        }
        if self.assistant.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(
                self.assistant.embedding_model.clone(),
            ));
        }

        Ok(())
    }
}

impl ChatSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=32_768).contains(&self.max_output_tokens) {
            return Err(ConfigError::InvalidMaxOutputTokens(self.max_output_tokens));
        }
        if !(1..=50).contains(&self.hint_count) {
            return Err(ConfigError::InvalidHintCount(self.hint_count));
        }
        if self.rate_limit_retries > 20 {
            return Err(ConfigError::InvalidRateLimitRetries(
                self.rate_limit_retries,
            ));
        }
        validate_timeout("run timeout", self.run_timeout_secs)?;
        validate_timeout("maximum rate limit wait", self.max_rate_limit_wait_secs)?;
        validate_timeout(
            "default rate limit wait",
            self.default_rate_limit_wait_secs,
        )?;
        validate_poll_interval(self.poll_interval_ms)
    }

    #[inline]
    pub fn run_poll(&self) -> PollSettings {
        PollSettings::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_secs(self.run_timeout_secs),
        )
    }
}

impl PublishSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=500).contains(&self.batch_size) {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if self.max_total_files < self.batch_size {
            return Err(ConfigError::InvalidMaxTotalFiles(
                self.max_total_files,
                self.batch_size,
            ));
        }
        validate_timeout("index ready timeout", self.index_ready_timeout_secs)?;
        validate_poll_interval(self.poll_interval_ms)
    }

    #[inline]
    pub fn index_poll(&self) -> PollSettings {
        PollSettings::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_secs(self.index_ready_timeout_secs),
        )
    }
}

fn validate_timeout(name: &'static str, seconds: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(name, seconds));
    }
    Ok(())
}

fn validate_poll_interval(millis: u64) -> Result<(), ConfigError> {
    if millis > 60_000 {
        return Err(ConfigError::InvalidPollInterval(millis));
    }
    Ok(())
}
