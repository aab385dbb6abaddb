// Help module
// Command documentation read from a module's exported help


use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{CopilotError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ParameterHelp {
    pub name: String,
    pub description: String,
}

/// Structured help for one command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CommandHelp {
    pub name: String,
    pub synopsis: String,
    pub description: String,
    pub parameters: Vec<ParameterHelp>,
    pub examples: Vec<String>,
}

impl CommandHelp {
    /// True when the command carries no documentation at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.synopsis.trim().is_empty()
            && self.description.trim().is_empty()
            && self.parameters.iter().all(|p| p.description.trim().is_empty())
            && self.examples.iter().all(|e| e.trim().is_empty())
    }

    #[inline]
    pub fn first_example(&self) -> Option<&str> {
        self.examples
            .iter()
            .map(String::as_str)
            .find(|e| !e.trim().is_empty())
    }

    /// Text that gets embedded and uploaded for this command
    #[inline]
    pub fn render(&self) -> String {
        let mut sections = Vec::new();

        if !self.synopsis.trim().is_empty() {
            sections.push(format!("{}: {}", self.name, self.synopsis.trim()));
        } else {
            sections.push(self.name.clone());
        }
        if !self.description.trim().is_empty() {
            sections.push(self.description.trim().to_string());
        }

        let parameters: Vec<String> = self
            .parameters
            .iter()
            .filter(|p| !p.name.trim().is_empty())
            .map(|p| format!("-{} {}", p.name.trim(), p.description.trim()))
            .collect();
        if !parameters.is_empty() {
            sections.push(format!("Parameters:\n{}", parameters.join("\n")));
        }

        if let Some(example) = self.first_example() {
            sections.push(format!("Example:\n{}", example.trim()));
        }

        sections.join("\n\n")
    }
}

/// A module, its version and the commands it exports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
    pub commands: Vec<String>,
}

/// Source of command documentation for a module
pub trait HelpSource: Send + Sync {
    /// Module metadata; fails when the module is unknown
    fn module(&self, name: &str) -> Result<ModuleInfo>;

    /// Help for one command; `None` when the command has no help
    fn command_help(&self, module: &str, command: &str) -> Result<Option<CommandHelp>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModuleExport {
    pub name: String,
    pub version: String,
    pub commands: Vec<CommandHelp>,
}

/// Help exported to JSON, one document per module
///
/// Loaded from a single `.json` file or from every `.json` file in a
/// directory.
#[derive(Debug, Clone, Default)]
pub struct HelpExport {
    modules: Vec<ModuleExport>,
}

impl HelpExport {
    #[inline]
    pub fn new(modules: Vec<ModuleExport>) -> Self {
        Self { modules }
    }

    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let files = if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        let mut modules = Vec::with_capacity(files.len());
        for file in files {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read help export: {}", file.display()))?;
            let module: ModuleExport = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse help export: {}", file.display()))?;
            debug!(
                "Loaded help for {} {} ({} commands)",
                module.name,
                module.version,
                module.commands.len()
            );
            modules.push(module);
        }

        Ok(Self { modules })
    }

    #[inline]
    pub fn modules(&self) -> &[ModuleExport] {
        &self.modules
    }

    fn find(&self, name: &str) -> Option<&ModuleExport> {
        self.modules
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

impl HelpSource for HelpExport {
    fn module(&self, name: &str) -> Result<ModuleInfo> {
        let module = self
            .find(name)
            .ok_or_else(|| CopilotError::Config(format!("Module '{name}' is not in the help export")))?;

        Ok(ModuleInfo {
            name: module.name.clone(),
            version: module.version.clone(),
            commands: module.commands.iter().map(|c| c.name.clone()).collect(),
        })
    }

    fn command_help(&self, module: &str, command: &str) -> Result<Option<CommandHelp>> {
        let Some(module) = self.find(module) else {
            return Ok(None);
        };

        let help = module
            .commands
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(command))
            .filter(|c| !c.is_empty())
            .cloned();
        if help.is_none() {
            warn!("No help found for {}", command);
        }
        Ok(help)
    }
}
