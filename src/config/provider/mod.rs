
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use super::settings::ConfigError;

pub const PROVIDER_FILE: &str = "config.json";
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-05-01-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ApiType {
    #[default]
    #[serde(rename = "OpenAI")]
    #[value(name = "openai")]
    OpenAi,
    #[serde(rename = "Azure")]
    #[value(name = "azure")]
    Azure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum AuthType {
    #[default]
    #[serde(rename = "openai")]
    #[value(name = "openai")]
    OpenAi,
    #[serde(rename = "azure")]
    #[value(name = "azure")]
    Azure,
    #[serde(rename = "azure_ad")]
    #[value(name = "azure-ad")]
    AzureAd,
}

impl std::fmt::Display for ApiType {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ApiType::OpenAi => write!(f, "OpenAI"),
            ApiType::Azure => write!(f, "Azure"),
        }
    }
}

impl std::fmt::Display for AuthType {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            AuthType::OpenAi => write!(f, "openai"),
            AuthType::Azure => write!(f, "azure"),
            AuthType::AzureAd => write!(f, "azure_ad"),
        }
    }
}

/// Credentials and endpoint for the hosted provider, stored as `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub api_base: String,
    pub deployment: Option<String>,
    pub api_type: ApiType,
    pub api_version: Option<String>,
    pub auth_type: AuthType,
    pub organization: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_OPENAI_BASE.to_string(),
            deployment: None,
            api_type: ApiType::OpenAi,
            api_version: None,
            auth_type: AuthType::OpenAi,
            organization: None,
        }
    }
}

impl ProviderConfig {
    #[inline]
    pub fn file_path(config_dir: &Path) -> PathBuf {
        config_dir.join(PROVIDER_FILE)
    }

    /// Read `config.json`; `None` when it has not been written yet
    #[inline]
    pub fn load(config_dir: &Path) -> Result<Option<Self>> {
        let path = Self::file_path(config_dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read provider config: {}", path.display()))?;
        let config: ProviderConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse provider config: {}", path.display()))?;

        config
            .validate()
            .with_context(|| "Provider configuration validation failed")?;

        Ok(Some(config))
    }

    /// Persisted file first, provider environment variables second
    #[inline]
    pub fn resolve(config_dir: &Path) -> Result<Option<Self>> {
        if let Some(config) = Self::load(config_dir)? {
            debug!("Using provider config from {}", config_dir.display());
            return Ok(Some(config));
        }
        Ok(Self::from_lookup(|name| std::env::var(name).ok()))
    }

    /// Build a config from environment-style variables
    ///
    /// Azure variables win when `AZURE_OPENAI_API_KEY` is present or
    /// `OPENAI_API_TYPE=azure`.
    #[inline]
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let forced_type = non_empty("OPENAI_API_TYPE").map(|t| t.to_lowercase());

        let azure_key = non_empty("AZURE_OPENAI_API_KEY");
        let use_azure = match forced_type.as_deref() {
            Some("azure") => true,
            Some(_) => false,
            None => azure_key.is_some(),
        };

        if use_azure {
            let api_key = azure_key.or_else(|| non_empty("OPENAI_API_KEY"))?;
            return Some(Self {
                api_key,
                api_base: non_empty("AZURE_OPENAI_ENDPOINT")
                    .or_else(|| non_empty("OPENAI_API_BASE"))
                    .unwrap_or_default(),
                deployment: non_empty("AZURE_OPENAI_DEPLOYMENT"),
                api_type: ApiType::Azure,
                api_version: non_empty("AZURE_OPENAI_API_VERSION")
                    .or_else(|| non_empty("OPENAI_API_VERSION"))
                    .or_else(|| Some(DEFAULT_AZURE_API_VERSION.to_string())),
                auth_type: AuthType::Azure,
                organization: None,
            });
        }

        Some(Self {
            api_key: non_empty("OPENAI_API_KEY")?,
            api_base: non_empty("OPENAI_API_BASE")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string()),
            organization: non_empty("OPENAI_ORGANIZATION"),
            ..Self::default()
        })
    }

    #[inline]
    pub fn save(&self, config_dir: &Path) -> Result<()> {
        self.validate()
            .context("Provider configuration validation failed before saving")?;

        fs::create_dir_all(config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;

        let path = Self::file_path(config_dir);
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize provider config to JSON")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write provider config: {}", path.display()))?;

        Ok(())
    }

    /// Delete the persisted file; returns whether one existed
    #[inline]
    pub fn reset(config_dir: &Path) -> Result<bool> {
        let path = Self::file_path(config_dir);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove provider config: {}", path.display()))?;
        Ok(true)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        self.base_url()?;

        if self.api_type == ApiType::Azure {
            if self.deployment.as_deref().is_none_or(|d| d.trim().is_empty()) {
                return Err(ConfigError::MissingAzureSetting("deployment"));
            }
            if self.api_version.as_deref().is_none_or(|v| v.trim().is_empty()) {
                return Err(ConfigError::MissingAzureSetting("api version"));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.api_base.trim_end_matches('/'))
            .map_err(|_| ConfigError::InvalidUrl(self.api_base.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(self.api_base.clone()));
        }
        Ok(url)
    }

    /// Stable identity of the credential that never exposes the key itself
    #[inline]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.api_base.trim_end_matches('/').as_bytes());
        hasher.update([0]);
        hasher.update(self.api_key.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest.chars().take(16).collect()
    }

    #[inline]
    pub fn masked_key(&self) -> String {
        let visible: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if self.api_key.chars().count() <= 8 {
            "****".to_string()
        } else {
            format!("****{visible}")
        }
    }
}
