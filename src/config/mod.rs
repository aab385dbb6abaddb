// Configuration management module
// Provider credentials (config.json), tunables (settings.toml) and interactive setup

pub mod interactive;
pub mod provider;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use provider::{ApiType, AuthType, ProviderConfig};
pub use settings::{
    AssistantSettings, ChatSettings, ConfigError, PublishSettings, SessionSettings, Settings,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Settings::config_dir()
}
