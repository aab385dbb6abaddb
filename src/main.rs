use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pshelp_copilot::chat::TurnOptions;
use pshelp_copilot::commands::{
    ChatRequest, ProviderArgs, build_local_cache, build_remote_index, chat, configure_provider,
    create_assistant, export_training_data, get_provider_config, list_assistants,
    list_local_cache, remove_assistant, reset_provider_config, set_default_assistant,
    split_docs_into_files,
};
use pshelp_copilot::config::{ApiType, AuthType, get_config_dir};
use pshelp_copilot::context::CopilotContext;

#[derive(Parser)]
#[command(name = "pshelp-copilot")]
#[command(about = "Turn module help into a searchable cache and chat with a hosted assistant about it")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to PSHELP_COPILOT_HOME or the user config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set provider credentials; prompts interactively when no flags are given
    ConfigureProvider {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        api_base: Option<String>,
        #[arg(long, value_enum)]
        api_type: Option<ApiType>,
        #[arg(long, value_enum)]
        auth_type: Option<AuthType>,
        #[arg(long)]
        api_version: Option<String>,
        /// Azure deployment name
        #[arg(long)]
        deployment: Option<String>,
        #[arg(long)]
        organization: Option<String>,
        /// Apply for this run only instead of writing config.json
        #[arg(long)]
        no_persist: bool,
    },
    /// Show the active provider configuration
    GetProviderConfig,
    /// Remove the saved provider configuration
    ResetProviderConfig,
    /// Create an assistant owned by this tool
    CreateAssistant {
        name: String,
        /// Attach the remote index of this cached collection
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Delete an assistant owned by this tool
    RemoveAssistant { name: String },
    /// Use this assistant when chat is called without one
    SetDefaultAssistant { name: String },
    /// List assistants
    ListAssistants {
        /// Include assistants not created by this tool
        #[arg(long)]
        all: bool,
    },
    /// Embed a module's command help into the local cache
    BuildLocalCache {
        /// Module to cache
        module: String,
        /// JSON help export (file or directory)
        #[arg(long)]
        help_export: PathBuf,
        /// Re-embed commands that are already cached
        #[arg(long)]
        force: bool,
    },
    /// Publish the cached collection into its remote vector index
    BuildRemoteIndex { collection: String },
    /// Ask the assistant a question, or start an interactive chat
    Chat {
        /// Message to send; omit for an interactive session
        message: Option<String>,
        #[arg(long)]
        assistant: Option<String>,
        /// Cached collection for hints and retrieval
        #[arg(long)]
        collection: Option<String>,
        /// Help export used to build the cache when it is empty
        #[arg(long)]
        help_export: Option<PathBuf>,
        /// Prepend the closest cached commands to each message
        #[arg(long)]
        hints: bool,
        /// Do not append the retrieval reminder
        #[arg(long)]
        no_reminder: bool,
        /// Print the answer with token usage as JSON
        #[arg(long)]
        detailed: bool,
    },
    /// List local embedding caches
    ListLocalCache,
    /// Write one help text file per command
    SplitDocsIntoFiles {
        module: String,
        #[arg(long)]
        help_export: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
    },
    /// Write chat-format JSONL training records from command help
    ExportTrainingData {
        module: String,
        #[arg(long)]
        help_export: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    let mut ctx = CopilotContext::load(&config_dir)?;

    match cli.command {
        Commands::ConfigureProvider {
            api_key,
            api_base,
            api_type,
            auth_type,
            api_version,
            deployment,
            organization,
            no_persist,
        } => {
            let args = ProviderArgs {
                api_key,
                api_base,
                api_type,
                auth_type,
                api_version,
                deployment,
                organization,
            };
            configure_provider(&mut ctx, args, !no_persist)?;
        }
        Commands::GetProviderConfig => {
            get_provider_config(&ctx)?;
        }
        Commands::ResetProviderConfig => {
            reset_provider_config(&mut ctx)?;
        }
        Commands::CreateAssistant {
            name,
            collection,
            instructions,
        } => {
            create_assistant(&ctx, &name, collection.as_deref(), instructions.as_deref())?;
        }
        Commands::RemoveAssistant { name } => {
            remove_assistant(&ctx, &name)?;
        }
        Commands::SetDefaultAssistant { name } => {
            set_default_assistant(&mut ctx, &name)?;
        }
        Commands::ListAssistants { all } => {
            list_assistants(&ctx, all)?;
        }
        Commands::BuildLocalCache {
            module,
            help_export,
            force,
        } => {
            build_local_cache(&ctx, &help_export, &module, force)?;
        }
        Commands::BuildRemoteIndex { collection } => {
            build_remote_index(&ctx, &collection)?;
        }
        Commands::Chat {
            message,
            assistant,
            collection,
            help_export,
            hints,
            no_reminder,
            detailed,
        } => {
            let request = ChatRequest {
                assistant: assistant.as_deref(),
                message: message.as_deref(),
                collection: collection.as_deref(),
                help_export: help_export.as_deref(),
                options: TurnOptions {
                    want_hints: hints,
                    suppress_retrieval_reminder: no_reminder,
                },
                detailed,
            };
            chat(&ctx, &request)?;
        }
        Commands::ListLocalCache => {
            list_local_cache(&ctx)?;
        }
        Commands::SplitDocsIntoFiles {
            module,
            help_export,
            output_dir,
        } => {
            split_docs_into_files(&help_export, &module, &output_dir)?;
        }
        Commands::ExportTrainingData {
            module,
            help_export,
            output,
        } => {
            export_training_data(&ctx, &help_export, &module, &output)?;
        }
    }

    Ok(())
}
