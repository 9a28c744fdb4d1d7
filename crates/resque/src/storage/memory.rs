//! In-process key-value store with multiple contexts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::trace;

use super::{ContextId, KeyValueStore, StorageEvent, StorageEvents, EVENT_CAPACITY};
use crate::error::{Error, Result};

#[derive(Debug)]
struct Shared {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
    next_context: AtomicU64,
    writable: AtomicBool,
}

/// A key-value store held in memory and shared between contexts.
///
/// Every handle returned by [`MemoryStore::open_context`] sees the same
/// entries and is notified of writes made through the other handles.
#[derive(Debug)]
pub struct MemoryStore {
    context: ContextId,
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create an empty store and open its first context.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            entries: Mutex::new(HashMap::new()),
            events,
            next_context: AtomicU64::new(2),
            writable: AtomicBool::new(true),
        });
        Self { context: 1, shared }
    }

    /// Open another context on the same entries.
    #[must_use]
    pub fn open_context(&self) -> Self {
        let context = self.shared.next_context.fetch_add(1, Ordering::SeqCst);
        Self {
            context,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Allow or refuse writes for every context, as a full quota would.
    pub fn set_writable(&self, writable: bool) {
        self.shared.writable.store(writable, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn context(&self) -> ContextId {
        self.context
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .shared
            .entries
            .lock()
            .map_err(|_| Error::internal("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if !self.shared.writable.load(Ordering::SeqCst) {
            return Err(Error::storage_write(key, "store is not accepting writes"));
        }

        {
            let mut entries = self
                .shared
                .entries
                .lock()
                .map_err(|_| Error::internal("memory store lock poisoned"))?;
            entries.insert(key.to_string(), value.to_string());
        }

        trace!(context = self.context, key, "memory store write");
        // No subscribers is fine.
        let _ = self.shared.events.send(StorageEvent {
            key: Some(key.to_string()),
            origin: self.context,
        });
        Ok(())
    }

    fn subscribe(&self) -> StorageEvents {
        StorageEvents::new(self.context, self.shared.events.subscribe())
    }
}
