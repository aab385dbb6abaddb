use super::*;
use crate::help::{HelpExport, ModuleExport};
use tempfile::TempDir;

fn export() -> HelpExport {
    HelpExport::new(vec![ModuleExport {
        name: "dbatools".to_string(),
        version: "2.1.3".to_string(),
        commands: vec![
            CommandHelp {
                name: "Get-DbaDatabase".to_string(),
                synopsis: "Gets database information".to_string(),
                examples: vec!["Get-DbaDatabase -SqlInstance sql1".to_string()],
                ..CommandHelp::default()
            },
            CommandHelp {
                name: "Set-DbaThing".to_string(),
                description: "Changes a thing".to_string(),
                ..CommandHelp::default()
            },
            CommandHelp {
                name: "Invoke-Undocumented".to_string(),
                ..CommandHelp::default()
            },
        ],
    }])
}

#[test]
fn split_writes_one_file_per_documented_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let out = temp_dir.path().join("docs");

    let report = split_docs_into_files(&export(), "dbatools", &out).expect("split");

    assert_eq!(report.files.len(), 2);
    assert_eq!(report.missing_help, vec!["Invoke-Undocumented"]);
    let text = fs::read_to_string(out.join("Get-DbaDatabase.txt")).expect("read");
    assert!(text.starts_with("Get-DbaDatabase: Gets database information"));
}

#[test]
fn training_records_cover_synopsis_and_example() {
    let help = CommandHelp {
        name: "Get-DbaDatabase".to_string(),
        synopsis: "Gets database information".to_string(),
        examples: vec![
            "  ".to_string(),
            "Get-DbaDatabase -SqlInstance sql1".to_string(),
        ],
        ..CommandHelp::default()
    };

    let records = training_records("system prompt", &help);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].messages[0].role, "system");
    assert_eq!(records[0].messages[1].content, "What does Get-DbaDatabase do?");
    assert_eq!(records[0].messages[2].content, "Gets database information");
    assert_eq!(
        records[1].messages[2].content,
        "Get-DbaDatabase -SqlInstance sql1"
    );
}

#[test]
fn export_writes_jsonl() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = temp_dir.path().join("out").join("training.jsonl");

    let count = export_training_data(&export(), "dbatools", "system", &output).expect("export");
    assert_eq!(count, 3);

    let content = fs::read_to_string(&output).expect("read");
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).expect("valid json line"))
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2]["messages"][1]["content"], "What does Set-DbaThing do?");
    assert_eq!(lines[2]["messages"][2]["content"], "Changes a thing");
}
