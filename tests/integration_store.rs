#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

use pshelp_copilot::embeddings::{
    EmbeddingRecord, EmbeddingStore, WriteOutcome, list_collections, rank,
};
use pshelp_copilot::normalize::normalize;
use tempfile::TempDir;

const DBATOOLS_COMMANDS: [&str; 5] = [
    "Get-DbaDatabase",
    "Backup-DbaDatabase",
    "Restore-DbaDatabase",
    "Copy-DbaLogin",
    "Test-DbaConnection",
];

fn embedding(seed: usize) -> Vec<f64> {
    (0..8).map(|i| ((seed + 1) * (i + 3)) as f64 % 11.0).collect()
}

fn write_dbatools(store: &EmbeddingStore, version: &str) {
    for (i, command) in DBATOOLS_COMMANDS.iter().enumerate() {
        let record = EmbeddingRecord {
            item_id: (*command).to_string(),
            text: normalize(&format!("{command}: the help text for {command}")),
            embedding: embedding(i),
        };
        let outcome = store
            .write("dbatools", version, &record, false)
            .expect("write should succeed");
        assert_eq!(outcome, WriteOutcome::Written);
    }
}

#[test]
fn dbatools_cache_reads_back() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = EmbeddingStore::new(temp_dir.path());
    write_dbatools(&store, "2.1.3");

    let records = store.read_latest("dbatools").expect("read");
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.embedding.len() == 8));
    assert!(records.iter().all(|r| !r.text.contains(" the ")));

    let on_disk = temp_dir
        .path()
        .join("dbatools")
        .join("2.1.3")
        .join("Get-DbaDatabase.json");
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(on_disk).expect("read file"))
            .expect("valid json");
    assert_eq!(raw["Command"], "Get-DbaDatabase");
    assert!(raw["Embedding"].is_array());
}

#[test]
fn newest_version_wins_by_string_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = EmbeddingStore::new(temp_dir.path());
    write_dbatools(&store, "1.0.0");
    store
        .write(
            "dbatools",
            "2.0.0",
            &EmbeddingRecord {
                item_id: "Only-InTwo".to_string(),
                text: "only in two".to_string(),
                embedding: vec![1.0; 8],
            },
            false,
        )
        .expect("write");

    assert_eq!(
        store.latest_version("dbatools").expect("version").as_deref(),
        Some("2.0.0")
    );
    let records = store.read_latest("dbatools").expect("read");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_id, "Only-InTwo");
}

#[test]
fn cached_table_ranks_itself_first() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = EmbeddingStore::new(temp_dir.path());
    write_dbatools(&store, "2.1.3");

    let table = store.embedding_table("dbatools").expect("table");
    let ranked = rank(&embedding(2), &table, 3).expect("rank");

    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].item_id, "Restore-DbaDatabase");
    assert!((ranked[0].score - 1.0).abs() < 1e-9);
}

#[test]
fn collections_are_listed() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = EmbeddingStore::new(temp_dir.path());
    write_dbatools(&store, "2.1.3");
    std::fs::write(temp_dir.path().join("config.json"), "{}").expect("write file");

    let collections = list_collections(temp_dir.path()).expect("list");
    let names: Vec<_> = collections.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["dbatools"]);

    let missing = list_collections(&temp_dir.path().join("nope")).expect("list missing");
    assert!(missing.is_empty());
}
