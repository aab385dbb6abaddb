// Export module
// Writes command help out as plain text files or chat-format training records

#[cfg(test)]
mod tests;

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::Result;
use crate::help::{CommandHelp, HelpSource};
use crate::sync::file_name;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitReport {
    pub files: Vec<PathBuf>,
    pub missing_help: Vec<String>,
}

/// Write one rendered help file per command into `output_dir`
#[inline]
pub fn split_docs_into_files(
    help: &dyn HelpSource,
    module: &str,
    output_dir: &Path,
) -> Result<SplitReport> {
    let info = help.module(module)?;
    fs::create_dir_all(output_dir)?;

    let mut report = SplitReport::default();
    for command in &info.commands {
        let Some(command_help) = help.command_help(&info.name, command)? else {
            warn!("Skipping {}: no help available", command);
            report.missing_help.push(command.clone());
            continue;
        };

        let path = output_dir.join(format!("{}.txt", file_name(command)));
        fs::write(&path, command_help.render())?;
        report.files.push(path);
    }

    info!(
        "Wrote {} help files for {} to {}",
        report.files.len(),
        info.name,
        output_dir.display()
    );
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// One fine-tuning example in chat format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingRecord {
    pub messages: Vec<ChatMessage>,
}

impl TrainingRecord {
    fn new(system: &str, question: String, answer: String) -> Self {
        Self {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
                ChatMessage {
                    role: "assistant",
                    content: answer,
                },
            ],
        }
    }
}

/// Question/answer pairs for one command: what it does and how to use it
#[inline]
pub fn training_records(system: &str, help: &CommandHelp) -> Vec<TrainingRecord> {
    let mut records = Vec::with_capacity(2);

    let summary = if help.synopsis.trim().is_empty() {
        help.description.trim()
    } else {
        help.synopsis.trim()
    };
    if !summary.is_empty() {
        records.push(TrainingRecord::new(
            system,
            format!("What does {} do?", help.name),
            summary.to_string(),
        ));
    }

    if let Some(example) = help.first_example() {
        records.push(TrainingRecord::new(
            system,
            format!("Show me an example of using {}.", help.name),
            example.trim().to_string(),
        ));
    }

    records
}

/// Write JSONL training records for every documented command; returns the record count
#[inline]
pub fn export_training_data(
    help: &dyn HelpSource,
    module: &str,
    system: &str,
    output: &Path,
) -> Result<usize> {
    let info = help.module(module)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(output)?);
    let mut written = 0;
    for command in &info.commands {
        let Some(command_help) = help.command_help(&info.name, command)? else {
            continue;
        };
        for record in training_records(system, &command_help) {
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
            written += 1;
        }
    }
    writer.flush()?;

    info!(
        "Exported {} training records for {} to {}",
        written,
        info.name,
        output.display()
    );
    Ok(written)
}
