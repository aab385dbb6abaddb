// Conversational session cache
// One provider thread per (credentials, assistant) pair, reused across chat turns

#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::Result;
use crate::config::ProviderConfig;
use crate::embeddings::{EmbeddingStore, EmbeddingTable};
use crate::provider::{Assistant, AssistantApi, Thread};

/// Cache key; the fingerprint stands in for the raw credentials
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub credential_fingerprint: String,
    pub assistant_name: String,
}

impl SessionKey {
    #[inline]
    pub fn new(config: &ProviderConfig, assistant_name: &str) -> Self {
        Self {
            credential_fingerprint: config.fingerprint(),
            assistant_name: assistant_name.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub key: SessionKey,
    pub thread: Thread,
    /// Resolved by name on the first turn
    pub assistant: Option<Assistant>,
    pub embedding_table: EmbeddingTable,
    pub turns: usize,
}

/// Where hint embeddings come from
pub trait EmbeddingTableSource {
    fn load_table(&self, collection: &str) -> Result<EmbeddingTable>;
}

impl EmbeddingTableSource for EmbeddingStore {
    #[inline]
    fn load_table(&self, collection: &str) -> Result<EmbeddingTable> {
        self.embedding_table(collection)
    }
}

/// Hint table to (re)load into the session
#[derive(Clone, Copy)]
pub struct HintRequest<'a> {
    pub collection: &'a str,
    pub source: &'a dyn EmbeddingTableSource,
}

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Default)]
struct Entries {
    sessions: HashMap<SessionKey, SessionHandle>,
    /// Least recently used first
    order: VecDeque<SessionKey>,
}

impl Entries {
    fn touch(&mut self, key: &SessionKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.clone());
    }
}

/// Process-wide session cache with least-recently-used eviction
pub struct SessionCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl SessionCache {
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Cached session for `key`, creating its thread on first use
    ///
    /// When `hints` is given the session's embedding table is reloaded on
    /// every call, warm or cold.
    #[inline]
    pub fn get_or_create_session(
        &self,
        api: &dyn AssistantApi,
        key: &SessionKey,
        thread_vector_index: Option<&str>,
        hints: Option<HintRequest<'_>>,
    ) -> Result<SessionHandle> {
        let cached = {
            let mut entries = self.lock_entries();
            let handle = entries.sessions.get(key).cloned();
            if handle.is_some() {
                entries.touch(key);
            }
            handle
        };

        let handle = match cached {
            Some(handle) => {
                debug!("Reusing session for {}", key.assistant_name);
                handle
            }
            None => self.insert_new(api, key, thread_vector_index)?,
        };

        if let Some(hints) = hints {
            let table = hints.source.load_table(hints.collection)?;
            debug!(
                "Loaded {} hint embeddings from {}",
                table.len(),
                hints.collection
            );
            lock_session(&handle).embedding_table = table;
        }

        Ok(handle)
    }

    fn insert_new(
        &self,
        api: &dyn AssistantApi,
        key: &SessionKey,
        thread_vector_index: Option<&str>,
    ) -> Result<SessionHandle> {
        let thread = api.create_thread(thread_vector_index)?;
        info!(
            "Started thread {} for assistant {}",
            thread.id, key.assistant_name
        );

        let mut entries = self.lock_entries();
        // Another caller may have created the session while the thread was being made
        if let Some(existing) = entries.sessions.get(key).cloned() {
            entries.touch(key);
            return Ok(existing);
        }

        let handle = Arc::new(Mutex::new(Session {
            key: key.clone(),
            thread,
            assistant: None,
            embedding_table: EmbeddingTable::new(),
            turns: 0,
        }));
        entries.sessions.insert(key.clone(), Arc::clone(&handle));
        entries.touch(key);

        while entries.sessions.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            debug!("Evicting session for {}", oldest.assistant_name);
            entries.sessions.remove(&oldest);
        }

        Ok(handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lock_entries().sessions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.lock_entries().sessions.contains_key(key)
    }

    #[inline]
    pub fn remove(&self, key: &SessionKey) -> Option<SessionHandle> {
        let mut entries = self.lock_entries();
        entries.order.retain(|k| k != key);
        entries.sessions.remove(key)
    }

    fn lock_entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lock a session, recovering it if a previous holder panicked
#[inline]
pub fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}
