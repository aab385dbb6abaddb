use super::*;
use crate::provider::fake::FakeProvider;
use std::sync::atomic::{AtomicUsize, Ordering};

struct CountingSource {
    calls: AtomicUsize,
}

impl CountingSource {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl EmbeddingTableSource for CountingSource {
    fn load_table(&self, _collection: &str) -> Result<EmbeddingTable> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(EmbeddingTable::from([(format!("Cmd-{call}"), vec![1.0])]))
    }
}

fn key(name: &str) -> SessionKey {
    SessionKey {
        credential_fingerprint: "abc123".to_string(),
        assistant_name: name.to_string(),
    }
}

#[test]
fn first_access_creates_thread_not_assistant() {
    let api = FakeProvider::new();
    let cache = SessionCache::new(4);

    let handle = cache
        .get_or_create_session(&api, &key("helper"), Some("vs_1"), None)
        .expect("session");

    let session = lock_session(&handle);
    assert!(session.assistant.is_none());
    assert_eq!(session.thread.vector_index_id(), Some("vs_1"));
    assert_eq!(api.with(|s| s.threads.len()), 1);
}

#[test]
fn warm_hit_reuses_thread() {
    let api = FakeProvider::new();
    let cache = SessionCache::new(4);

    let first = cache
        .get_or_create_session(&api, &key("helper"), None, None)
        .expect("first");
    let second = cache
        .get_or_create_session(&api, &key("helper"), None, None)
        .expect("second");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(api.with(|s| s.threads.len()), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn hints_reload_on_every_call() {
    let api = FakeProvider::new();
    let cache = SessionCache::new(4);
    let source = CountingSource::new();
    let hints = HintRequest {
        collection: "dbatools",
        source: &source,
    };

    let handle = cache
        .get_or_create_session(&api, &key("helper"), None, Some(hints))
        .expect("cold");
    assert!(lock_session(&handle).embedding_table.contains_key("Cmd-1"));

    let handle = cache
        .get_or_create_session(&api, &key("helper"), None, Some(hints))
        .expect("warm");
    let session = lock_session(&handle);
    assert!(session.embedding_table.contains_key("Cmd-2"));
    assert!(!session.embedding_table.contains_key("Cmd-1"));
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn without_hints_table_is_kept() {
    let api = FakeProvider::new();
    let cache = SessionCache::new(4);
    let source = CountingSource::new();

    cache
        .get_or_create_session(
            &api,
            &key("helper"),
            None,
            Some(HintRequest {
                collection: "dbatools",
                source: &source,
            }),
        )
        .expect("with hints");
    let handle = cache
        .get_or_create_session(&api, &key("helper"), None, None)
        .expect("without hints");

    assert_eq!(lock_session(&handle).embedding_table.len(), 1);
}

#[test]
fn least_recently_used_is_evicted() {
    let api = FakeProvider::new();
    let cache = SessionCache::new(2);

    cache
        .get_or_create_session(&api, &key("a"), None, None)
        .expect("a");
    cache
        .get_or_create_session(&api, &key("b"), None, None)
        .expect("b");
    // Touch a so b becomes the oldest
    cache
        .get_or_create_session(&api, &key("a"), None, None)
        .expect("a again");
    cache
        .get_or_create_session(&api, &key("c"), None, None)
        .expect("c");

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&key("a")));
    assert!(!cache.contains(&key("b")));
    assert!(cache.contains(&key("c")));
}

#[test]
fn keys_differ_by_credentials() {
    let first = ProviderConfig {
        api_key: "key-one".to_string(),
        ..ProviderConfig::default()
    };
    let second = ProviderConfig {
        api_key: "key-two".to_string(),
        ..ProviderConfig::default()
    };

    let a = SessionKey::new(&first, "helper");
    let b = SessionKey::new(&second, "helper");
    assert_ne!(a, b);
    assert!(!a.credential_fingerprint.contains("key-one"));
    assert_eq!(a, SessionKey::new(&first, "helper"));
}

#[test]
fn remove_drops_session() {
    let api = FakeProvider::new();
    let cache = SessionCache::new(2);
    cache
        .get_or_create_session(&api, &key("a"), None, None)
        .expect("a");

    assert!(cache.remove(&key("a")).is_some());
    assert!(cache.is_empty());
}
