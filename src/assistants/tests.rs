use super::*;
use crate::provider::fake::FakeProvider;
use tempfile::TempDir;

#[test]
fn list_owned_filters_by_tag() {
    let api = FakeProvider::new();
    api.add_assistant("mine", true);
    api.add_assistant("theirs", false);

    let owned = list_owned(&api).expect("list");
    assert_eq!(owned.len(), 1);
    assert!(owned[0].has_name("mine"));
}

#[test]
fn find_prefers_owned() {
    let api = FakeProvider::new();
    api.add_assistant("helper", false);
    let owned = api.add_assistant("helper", true);

    let found = find_by_name(&api, "helper").expect("find").expect("some");
    assert_eq!(found.id, owned.id);
    assert!(find_by_name(&api, "nobody").expect("find").is_none());
}

#[test]
fn find_falls_back_to_untagged() {
    let api = FakeProvider::new();
    let untagged = api.add_assistant("helper", false);

    let found = find_by_name(&api, "helper").expect("find").expect("some");
    assert_eq!(found.id, untagged.id);
}

#[test]
fn create_rejects_duplicate_name() {
    let api = FakeProvider::new();
    let spec = AssistantSpec::new("helper", "gpt-4o", "be helpful");

    let created = create(&api, &spec).expect("create");
    assert!(created.is_owned());
    assert!(create(&api, &spec).is_err());
}

#[test]
fn remove_only_touches_owned() {
    let api = FakeProvider::new();
    api.add_assistant("theirs", false);
    api.add_assistant("mine", true);

    assert!(matches!(
        remove(&api, "theirs"),
        Err(CopilotError::AssistantNotFound(_))
    ));
    remove(&api, "mine").expect("remove");

    let names: Vec<_> = api.with(|s| {
        s.assistants
            .iter()
            .filter_map(|a| a.name.clone())
            .collect()
    });
    assert_eq!(names, vec!["theirs".to_string()]);
}

#[test]
fn set_default_persists_existing_assistant() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let api = FakeProvider::new();
    api.add_assistant("helper", true);
    let mut settings = Settings::load(temp_dir.path()).expect("settings");

    set_default(&api, &mut settings, "helper").expect("set default");

    let reloaded = Settings::load(temp_dir.path()).expect("reload");
    assert_eq!(
        reloaded.assistant.default_assistant.as_deref(),
        Some("helper")
    );
}

#[test]
fn set_default_requires_existing_assistant() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let api = FakeProvider::new();
    let mut settings = Settings::load(temp_dir.path()).expect("settings");

    assert!(matches!(
        set_default(&api, &mut settings, "missing"),
        Err(CopilotError::AssistantNotFound(_))
    ));
    assert!(!settings.settings_file_path().exists());
}
