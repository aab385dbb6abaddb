// Process-wide state shared by every operation

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::config::{ProviderConfig, Settings};
use crate::embeddings::EmbeddingStore;
use crate::provider::{OpenAiClient, Usage};
use crate::session::SessionCache;
use crate::sync::PublishBudget;
use crate::{CopilotError, Result};

/// Running token totals across chat turns
#[derive(Debug, Default)]
pub struct UsageLedger {
    totals: Mutex<(Usage, usize)>,
}

impl UsageLedger {
    #[inline]
    pub fn record(&self, usage: &Usage) {
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        totals.0.add(usage);
        totals.1 += 1;
    }

    #[inline]
    pub fn totals(&self) -> Usage {
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .0
    }

    #[inline]
    pub fn turns(&self) -> usize {
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .1
    }
}

/// Everything an operation needs, created once per process
pub struct CopilotContext {
    pub settings: Settings,
    pub provider: Option<ProviderConfig>,
    pub store: EmbeddingStore,
    pub sessions: SessionCache,
    pub usage: UsageLedger,
    pub budget: PublishBudget,
}

impl CopilotContext {
    #[inline]
    pub fn new(settings: Settings, provider: Option<ProviderConfig>) -> Self {
        let store = EmbeddingStore::new(settings.get_base_dir());
        let sessions = SessionCache::new(settings.sessions.capacity);
        let budget = PublishBudget::new(settings.publish.max_total_files);
        Self {
            settings,
            provider,
            store,
            sessions,
            usage: UsageLedger::default(),
            budget,
        }
    }

    /// Load settings and the provider config (file, then environment) from `config_dir`
    #[inline]
    pub fn load(config_dir: &std::path::Path) -> Result<Self> {
        let settings = Settings::load(config_dir)?;
        let provider = ProviderConfig::resolve(config_dir)?;
        debug!(
            "Loaded context from {} (provider configured: {})",
            config_dir.display(),
            provider.is_some()
        );
        Ok(Self::new(settings, provider))
    }

    #[inline]
    pub fn provider(&self) -> Result<&ProviderConfig> {
        self.provider.as_ref().ok_or_else(|| {
            CopilotError::Config(
                "No provider configured. Run 'pshelp-copilot configure-provider' or set OPENAI_API_KEY"
                    .to_string(),
            )
        })
    }

    /// Swap the provider for the rest of this process
    #[inline]
    pub fn set_provider(&mut self, provider: ProviderConfig) {
        self.provider = Some(provider);
    }

    #[inline]
    pub fn client(&self) -> Result<OpenAiClient> {
        let config = self.provider()?;
        Ok(OpenAiClient::new(config)?
            .with_timeout(Duration::from_secs(self.settings.chat.run_timeout_secs))
            .with_embedding_model(&self.settings.assistant.embedding_model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ledger_accumulates() {
        let ledger = UsageLedger::default();
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        ledger.record(&usage);
        ledger.record(&usage);

        assert_eq!(ledger.totals().total_tokens, 30);
        assert_eq!(ledger.turns(), 2);
    }

    #[test]
    fn context_without_provider() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let settings = Settings::load(temp_dir.path()).expect("settings");
        let context = CopilotContext::new(settings, None);

        assert!(context.client().is_err());
        assert_eq!(context.store.base_dir(), temp_dir.path());
        assert_eq!(context.budget.remaining(), 10_000);
    }

    #[test]
    fn provider_can_be_set_in_memory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let settings = Settings::load(temp_dir.path()).expect("settings");
        let mut context = CopilotContext::new(settings, None);

        context.set_provider(ProviderConfig {
            api_key: "sk-test".to_string(),
            ..ProviderConfig::default()
        });

        assert!(context.client().is_ok());
        assert!(!ProviderConfig::file_path(temp_dir.path()).exists());
    }
}
