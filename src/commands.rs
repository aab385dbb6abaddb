use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use std::path::Path;
use tracing::{info, warn};

use crate::assistants;
use crate::chat::{ChatOrchestrator, TurnOptions};
use crate::config::{ApiType, AuthType, ProviderConfig, run_interactive_config, show_config};
use crate::context::CopilotContext;
use crate::embeddings::LocalCacheBuilder;
use crate::export;
use crate::help::HelpExport;
use crate::provider::{AssistantApi, AssistantSpec, VectorIndex};
use crate::session::{EmbeddingTableSource, HintRequest, SessionKey, lock_session};
use crate::sync::{IndexSync, index_name};

/// Provider fields given on the command line
#[derive(Debug, Clone, Default)]
pub struct ProviderArgs {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub api_type: Option<ApiType>,
    pub auth_type: Option<AuthType>,
    pub api_version: Option<String>,
    pub deployment: Option<String>,
    pub organization: Option<String>,
}

impl ProviderArgs {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none()
            && self.api_base.is_none()
            && self.api_type.is_none()
            && self.auth_type.is_none()
            && self.api_version.is_none()
            && self.deployment.is_none()
            && self.organization.is_none()
    }

    /// Overlay the given fields on `base`
    #[inline]
    pub fn apply(self, mut base: ProviderConfig) -> ProviderConfig {
        if let Some(api_type) = self.api_type {
            if api_type != base.api_type {
                base.auth_type = match api_type {
                    ApiType::OpenAi => AuthType::OpenAi,
                    ApiType::Azure => AuthType::Azure,
                };
            }
            base.api_type = api_type;
        }
        if let Some(auth_type) = self.auth_type {
            base.auth_type = auth_type;
        }
        if let Some(api_key) = self.api_key {
            base.api_key = api_key;
        }
        if let Some(api_base) = self.api_base {
            base.api_base = api_base;
        }
        if self.api_version.is_some() {
            base.api_version = self.api_version;
        }
        if self.deployment.is_some() {
            base.deployment = self.deployment;
        }
        if self.organization.is_some() {
            base.organization = self.organization;
        }
        if base.api_type == ApiType::Azure && base.api_version.is_none() {
            base.api_version = Some(crate::config::provider::DEFAULT_AZURE_API_VERSION.to_string());
        }
        base
    }
}

/// Set the provider from flags, or interactively when no flags are given
#[inline]
pub fn configure_provider(ctx: &mut CopilotContext, args: ProviderArgs, persist: bool) -> Result<()> {
    let config_dir = ctx.settings.get_base_dir().to_path_buf();

    let config = if args.is_empty() {
        run_interactive_config(&config_dir)?
    } else {
        let config = args.apply(ctx.provider.clone().unwrap_or_default());
        config
            .validate()
            .context("Provider configuration is invalid")?;
        if persist {
            config.save(&config_dir)?;
            println!(
                "{} Provider configuration saved to {}",
                style("✓").green(),
                style(ProviderConfig::file_path(&config_dir).display()).cyan()
            );
        } else {
            println!("Provider configuration applied for this session only.");
        }
        config
    };

    info!("Provider set to {} at {}", config.api_type, config.api_base);
    ctx.set_provider(config);
    Ok(())
}

#[inline]
pub fn get_provider_config(ctx: &CopilotContext) -> Result<()> {
    show_config(ctx.provider.as_ref(), &ctx.settings)
}

/// Delete the persisted provider config and fall back to the environment
#[inline]
pub fn reset_provider_config(ctx: &mut CopilotContext) -> Result<()> {
    let removed = ProviderConfig::reset(ctx.settings.get_base_dir())?;
    ctx.provider = ProviderConfig::from_lookup(|name| std::env::var(name).ok());

    if removed {
        println!("{} Provider configuration removed", style("✓").green());
    } else {
        println!("No saved provider configuration to remove.");
    }
    match &ctx.provider {
        Some(config) => println!(
            "Using {} credentials from the environment ({})",
            config.api_type,
            config.masked_key()
        ),
        None => println!("No provider is configured now."),
    }
    Ok(())
}

#[inline]
pub fn create_assistant(
    ctx: &CopilotContext,
    name: &str,
    collection: Option<&str>,
    instructions: Option<&str>,
) -> Result<()> {
    let client = ctx.client()?;
    let mut spec = AssistantSpec::new(
        name,
        &ctx.settings.assistant.model,
        instructions.unwrap_or(&ctx.settings.assistant.instructions),
    );

    if let Some(collection) = collection {
        let version = ctx
            .store
            .latest_version(collection)?
            .with_context(|| format!("No local cache for '{collection}'. Run build-local-cache first"))?;
        let index = IndexSync::new(&client, &ctx.settings.publish, &ctx.budget)
            .ensure_index(collection, &version)?;
        spec = spec
            .with_vector_indexes(vec![index.id.clone()])
            .with_metadata("collection", collection)
            .with_metadata("version", &version);
    }

    let assistant = assistants::create(&client, &spec)?;
    println!(
        "{} Created assistant {} ({})",
        style("✓").green(),
        style(name).bold(),
        assistant.id
    );
    Ok(())
}

#[inline]
pub fn remove_assistant(ctx: &CopilotContext, name: &str) -> Result<()> {
    let client = ctx.client()?;
    let assistant = assistants::remove(&client, name)?;
    println!(
        "{} Removed assistant {} ({})",
        style("✓").green(),
        name,
        assistant.id
    );
    Ok(())
}

#[inline]
pub fn set_default_assistant(ctx: &mut CopilotContext, name: &str) -> Result<()> {
    let client = ctx.client()?;
    assistants::set_default(&client, &mut ctx.settings, name)?;
    println!("{} Default assistant is now {}", style("✓").green(), name);
    Ok(())
}

#[inline]
pub fn list_assistants(ctx: &CopilotContext, all: bool) -> Result<()> {
    let client = ctx.client()?;
    let list = if all {
        client.list_assistants()?
    } else {
        assistants::list_owned(&client)?
    };

    if list.is_empty() {
        println!("No assistants found.");
        println!("Use 'pshelp-copilot create-assistant <name>' to create one.");
        return Ok(());
    }

    let default = ctx.settings.assistant.default_assistant.as_deref();
    println!("Assistants ({} total):", list.len());
    println!();
    for assistant in &list {
        let name = assistant.name.as_deref().unwrap_or("(unnamed)");
        let marker = if default == Some(name) { " (default)" } else { "" };
        println!("🤖 {}{} ({})", style(name).bold(), marker, assistant.id);
        println!("   Model: {}", assistant.model);
        if let Some(created) = chrono::DateTime::from_timestamp(assistant.created_at, 0) {
            println!("   Created: {}", created.format("%Y-%m-%d %H:%M:%S"));
        }
        if !assistant.vector_index_ids().is_empty() {
            println!("   Indexes: {}", assistant.vector_index_ids().join(", "));
        }
        println!();
    }
    Ok(())
}

#[inline]
pub fn build_local_cache(
    ctx: &CopilotContext,
    help_export: &Path,
    module: &str,
    force: bool,
) -> Result<()> {
    let client = ctx.client()?;
    let help = HelpExport::load(help_export)?;
    let report = LocalCacheBuilder::new(&client, &help, &ctx.store)
        .force(force)
        .with_progress(true)
        .build(module)?;

    println!(
        "{} Cached {} {}: {} embedded, {} already cached",
        style("✓").green(),
        style(&report.collection).bold(),
        report.version,
        report.embedded(),
        report.skipped_existing
    );
    if !report.missing_help.is_empty() {
        println!(
            "{} {} commands have no help: {}",
            style("!").yellow(),
            report.missing_help.len(),
            report.missing_help.join(", ")
        );
    }
    Ok(())
}

/// Publish the active cached version of `collection` into its remote index
#[inline]
pub fn build_remote_index(ctx: &CopilotContext, collection: &str) -> Result<VectorIndex> {
    let client = ctx.client()?;
    let version = ctx
        .store
        .latest_version(collection)?
        .with_context(|| format!("No local cache for '{collection}'. Run build-local-cache first"))?;
    let records = ctx.store.read_version(collection, &version)?;

    let sync = IndexSync::new(&client, &ctx.settings.publish, &ctx.budget).with_progress(true);
    let index = sync.ensure_index(collection, &version)?;
    let report = sync.publish(&index, &records)?;

    println!(
        "{} Published {} files to {} in {} batches",
        style("✓").green(),
        report.uploaded,
        style(index_name(collection, &version)).bold(),
        report.batches.len()
    );
    if report.skipped > 0 {
        println!("   Skipped {} records without text", report.skipped);
    }
    if report.failed > 0 {
        println!(
            "{} {} records failed to upload and were left out",
            style("!").yellow(),
            report.failed
        );
    }
    if report.truncated {
        println!(
            "{} Upload limit of {} files reached; the index is incomplete",
            style("!").yellow(),
            ctx.settings.publish.max_total_files
        );
    }
    if report.degraded_batches > 0 {
        warn!(
            "{} batches could not be awaited and may still be processing",
            report.degraded_batches
        );
    }
    Ok(index)
}

/// Options for the chat command
#[derive(Debug, Clone, Default)]
pub struct ChatRequest<'a> {
    pub assistant: Option<&'a str>,
    /// Single message; `None` opens an interactive loop
    pub message: Option<&'a str>,
    /// Cached collection used for hints and thread retrieval
    pub collection: Option<&'a str>,
    /// Help export used to build the cache when it is empty
    pub help_export: Option<&'a Path>,
    pub options: TurnOptions,
    pub detailed: bool,
}

#[inline]
pub fn chat(ctx: &CopilotContext, request: &ChatRequest<'_>) -> Result<()> {
    let client = ctx.client()?;
    let provider = ctx.provider()?;

    let assistant_name = request
        .assistant
        .or(ctx.settings.assistant.default_assistant.as_deref())
        .context("No assistant given and no default assistant set")?;
    let key = SessionKey::new(provider, assistant_name);

    if request.options.want_hints && request.collection.is_none() {
        bail!("--hints needs --collection to know which cache to rank");
    }

    let thread_index = match request.collection {
        Some(collection) => find_remote_index(ctx, &client, collection)?,
        None => None,
    };

    let help = request.help_export.map(HelpExport::load).transpose()?;
    let builder = help
        .as_ref()
        .map(|help| LocalCacheBuilder::new(&client, help, &ctx.store));
    let source: &dyn EmbeddingTableSource = match &builder {
        Some(builder) => builder,
        None => &ctx.store,
    };

    let orchestrator = ChatOrchestrator::new(&client, &ctx.settings.chat).with_ledger(&ctx.usage);
    let send = |message: &str| -> Result<()> {
        let hints = request
            .collection
            .filter(|_| request.options.want_hints)
            .map(|collection| HintRequest { collection, source });
        let handle =
            ctx.sessions
                .get_or_create_session(&client, &key, thread_index.as_deref(), hints)?;
        let mut session = lock_session(&handle);
        let output = orchestrator.send_turn(&mut session, message, request.options)?;

        if request.detailed {
            println!("{}", serde_json::to_string_pretty(&output.to_detailed_json())?);
        } else {
            println!("{}", output.answer);
        }
        Ok(())
    };

    if let Some(message) = request.message {
        return send(message);
    }

    eprintln!(
        "{} Chatting with {}. Type 'exit' to quit.",
        style("💬").cyan(),
        style(assistant_name).bold()
    );
    loop {
        let line: String = Input::new()
            .with_prompt(">")
            .allow_empty(true)
            .interact_text()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        if let Err(e) = send(line) {
            eprintln!("{} {:#}", style("Error:").red(), e);
        }
    }

    let totals = ctx.usage.totals();
    eprintln!(
        "{} turns, {} tokens used",
        ctx.usage.turns(),
        totals.total_tokens
    );
    Ok(())
}

fn find_remote_index(
    ctx: &CopilotContext,
    api: &dyn AssistantApi,
    collection: &str,
) -> Result<Option<String>> {
    let Some(version) = ctx.store.latest_version(collection)? else {
        return Ok(None);
    };
    let name = index_name(collection, &version);
    let index = api
        .list_vector_indexes()?
        .into_iter()
        .find(|index| index.name.as_deref() == Some(name.as_str()));
    if index.is_none() {
        warn!("No remote index named {}, chatting without it", name);
    }
    Ok(index.map(|index| index.id))
}

#[inline]
pub fn list_local_cache(ctx: &CopilotContext) -> Result<()> {
    let collections = ctx.store.collections()?;
    if collections.is_empty() {
        println!("No local caches found in {}", ctx.store.base_dir().display());
        println!("Use 'pshelp-copilot build-local-cache' to create one.");
        return Ok(());
    }

    println!("Local caches ({} total):", collections.len());
    println!();
    for collection in &collections {
        let version = ctx.store.latest_version(&collection.name)?;
        let records = ctx.store.read_latest(&collection.name)?;
        println!("📚 {}", style(&collection.name).bold());
        println!("   Version: {}", version.as_deref().unwrap_or("(none)"));
        println!("   Records: {}", records.len());
        if let Some(dimensions) = records.first().map(|r| r.embedding.len()) {
            println!("   Dimensions: {dimensions}");
        }
        println!("   Path: {}", collection.path.display());
        println!();
    }
    Ok(())
}

#[inline]
pub fn split_docs_into_files(help_export: &Path, module: &str, output_dir: &Path) -> Result<()> {
    let help = HelpExport::load(help_export)?;
    let report = export::split_docs_into_files(&help, module, output_dir)?;
    println!(
        "{} Wrote {} files to {}",
        style("✓").green(),
        report.files.len(),
        output_dir.display()
    );
    if !report.missing_help.is_empty() {
        println!(
            "   {} commands skipped without help",
            report.missing_help.len()
        );
    }
    Ok(())
}

#[inline]
pub fn export_training_data(
    ctx: &CopilotContext,
    help_export: &Path,
    module: &str,
    output: &Path,
) -> Result<()> {
    let help = HelpExport::load(help_export)?;
    let count = export::export_training_data(
        &help,
        module,
        &ctx.settings.assistant.instructions,
        output,
    )?;
    println!(
        "{} Exported {} training records to {}",
        style("✓").green(),
        count,
        output.display()
    );
    Ok(())
}
