
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use std::path::Path;

use super::{ApiType, AuthType, ProviderConfig, Settings};
use super::provider::DEFAULT_AZURE_API_VERSION;

/// Prompt for provider settings; returns the accepted configuration
#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<ProviderConfig> {
    eprintln!("{}", style("🔧 PSHelp Copilot Provider Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Provider Configuration").bold().yellow());
    eprintln!("Configure the hosted provider used for embeddings and assistants.");
    eprintln!();

    configure_provider(&mut config)?;
    config.validate().context("Provider configuration is invalid")?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration for future sessions?")
        .default(true)
        .interact()?
    {
        config
            .save(config_dir)
            .context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(ProviderConfig::file_path(config_dir).display()).cyan()
        );
    } else {
        eprintln!("Configuration kept for this session only.");
    }

    Ok(config)
}

/// Print the active provider configuration with the key masked
#[inline]
pub fn show_config(config: Option<&ProviderConfig>, settings: &Settings) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    match config {
        Some(config) => {
            eprintln!("{}", style("Provider Settings:").bold().yellow());
            eprintln!("  API Type: {}", style(config.api_type).cyan());
            eprintln!("  Auth Type: {}", style(config.auth_type).cyan());
            eprintln!("  API Base: {}", style(&config.api_base).cyan());
            eprintln!("  API Key: {}", style(config.masked_key()).cyan());
            if let Some(version) = &config.api_version {
                eprintln!("  API Version: {}", style(version).cyan());
            }
            if let Some(deployment) = &config.deployment {
                eprintln!("  Deployment: {}", style(deployment).cyan());
            }
            if let Some(organization) = &config.organization {
                eprintln!("  Organization: {}", style(organization).cyan());
            }
        }
        None => eprintln!(
            "{}",
            style("No provider configured. Run configure-provider or set OPENAI_API_KEY.")
                .yellow()
        ),
    }

    eprintln!();
    eprintln!("{}", style("Assistant Settings:").bold().yellow());
    eprintln!(
        "  Default Assistant: {}",
        style(
            settings
                .assistant
                .default_assistant
                .as_deref()
                .unwrap_or("(none)")
        )
        .cyan()
    );
    eprintln!("  Model: {}", style(&settings.assistant.model).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&settings.assistant.embedding_model).cyan()
    );

    let config_dir = settings.get_base_dir();
    eprintln!();
    eprintln!(
        "Config file: {}",
        style(ProviderConfig::file_path(config_dir).display()).dim()
    );
    eprintln!(
        "Settings file: {}",
        style(settings.settings_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> ProviderConfig {
    match ProviderConfig::load(config_dir) {
        Ok(Some(config)) => {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        }
        _ => {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            ProviderConfig::default()
        }
    }
}

fn configure_provider(config: &mut ProviderConfig) -> Result<()> {
    let api_types = &["OpenAI", "Azure"];
    let default_index = usize::from(config.api_type == ApiType::Azure);

    let api_type = match Select::new()
        .with_prompt("Provider")
        .default(default_index)
        .items(api_types)
        .interact()?
    {
        1 => ApiType::Azure,
        _ => ApiType::OpenAi,
    };

    let default_base = match (api_type, config.api_type) {
        (new, old) if new == old => config.api_base.clone(),
        (ApiType::OpenAi, _) => super::provider::DEFAULT_OPENAI_BASE.to_string(),
        (ApiType::Azure, _) => String::new(),
    };

    let api_base: String = Input::new()
        .with_prompt("API base URL")
        .default(default_base)
        .validate_with(|input: &String| -> Result<(), String> {
            let probe = ProviderConfig {
                api_base: input.clone(),
                ..ProviderConfig::default()
            };
            probe.base_url().map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;

    let api_key = Password::new()
        .with_prompt("API key (leave empty to keep the current key)")
        .allow_empty_password(true)
        .interact()?;

    config.api_type = api_type;
    config.api_base = api_base;
    if !api_key.trim().is_empty() {
        config.api_key = api_key;
    }

    match api_type {
        ApiType::Azure => configure_azure(config)?,
        ApiType::OpenAi => {
            config.auth_type = AuthType::OpenAi;
            config.deployment = None;
            config.api_version = None;
            let organization: String = Input::new()
                .with_prompt("Organization (optional)")
                .default(config.organization.clone().unwrap_or_default())
                .allow_empty(true)
                .interact_text()?;
            config.organization = Some(organization).filter(|o| !o.trim().is_empty());
        }
    }

    Ok(())
}

fn configure_azure(config: &mut ProviderConfig) -> Result<()> {
    let auth_types = &["API key", "Azure AD token"];
    let auth_index = Select::new()
        .with_prompt("Authentication")
        .default(usize::from(config.auth_type == AuthType::AzureAd))
        .items(auth_types)
        .interact()?;
    config.auth_type = if auth_index == 1 {
        AuthType::AzureAd
    } else {
        AuthType::Azure
    };

    let deployment: String = Input::new()
        .with_prompt("Deployment name")
        .default(config.deployment.clone().unwrap_or_default())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Deployment cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let api_version: String = Input::new()
        .with_prompt("API version")
        .default(
            config
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
        )
        .interact_text()?;

    config.deployment = Some(deployment);
    config.api_version = Some(api_version);
    config.organization = None;
    Ok(())
}
