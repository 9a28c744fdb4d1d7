//! Key-value storage for resque.
//!
//! The registry persists through a [`KeyValueStore`]: a process-wide map of
//! string keys to string values, opened once per *context* (the analogue of a
//! browser tab). Writes made by one context are announced to every other
//! context through [`StorageEvents`]; a context never observes its own writes
//! as events.
//!
//! Two stores are provided:
//! - [`MemoryStore`]: shared in-process map, contexts opened with
//!   [`MemoryStore::open_context`].
//! - [`SqliteStore`]: a `SQLite` file; every opened handle is its own context
//!   and foreign writes are picked up by [`KeyValueStore::poll_changes`].

mod memory;
pub mod migrations;
mod poller;
pub mod schema;
mod sqlite;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::Result;

pub use memory::MemoryStore;
pub use poller::{spawn_change_poller, PollerHandle};
pub use sqlite::SqliteStore;

/// Identifies one open handle on a store.
pub type ContextId = u64;

/// Origin used for changes whose writer is outside this process.
pub const EXTERNAL_CONTEXT: ContextId = 0;

/// Capacity of the per-store event channel.
const EVENT_CAPACITY: usize = 64;

/// A storage-mutation notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The key that changed, or `None` when only "something changed" is known.
    pub key: Option<String>,
    /// The context that made the write.
    pub origin: ContextId,
}

impl StorageEvent {
    /// Whether a reader of `key` should re-read after this event.
    #[must_use]
    pub fn concerns(&self, key: &str) -> bool {
        self.key.as_deref().map_or(true, |k| k == key)
    }

    fn lagged() -> Self {
        Self {
            key: None,
            origin: EXTERNAL_CONTEXT,
        }
    }
}

/// Subscription to storage events raised by other contexts.
#[derive(Debug)]
pub struct StorageEvents {
    context: ContextId,
    rx: broadcast::Receiver<StorageEvent>,
}

impl StorageEvents {
    pub(crate) fn new(context: ContextId, rx: broadcast::Receiver<StorageEvent>) -> Self {
        Self { context, rx }
    }

    /// Wait for the next event from another context.
    ///
    /// Returns `None` once the store has been dropped. If the subscriber fell
    /// behind, a keyless event is returned so the caller re-reads everything.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.context => {}
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "storage subscriber lagged");
                    return Some(StorageEvent::lagged());
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next pending event without waiting.
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.origin == self.context => {}
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    return Some(StorageEvent::lagged());
                }
                Err(_) => return None,
            }
        }
    }
}

/// A string key-value store shared by every context of one origin.
pub trait KeyValueStore: Send + Sync {
    /// The context this handle writes as.
    fn context(&self) -> ContextId;

    /// Read the current value of a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value of a key in a single write.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StorageWrite`] if the value could not be stored.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Subscribe to writes made by other contexts.
    fn subscribe(&self) -> StorageEvents;

    /// Check for writes made outside this process and announce them.
    ///
    /// Returns `true` if a change was detected. Stores that learn about every
    /// write directly return `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be queried.
    fn poll_changes(&self) -> Result<bool> {
        Ok(false)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn context(&self) -> ContextId {
        (**self).context()
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn subscribe(&self) -> StorageEvents {
        (**self).subscribe()
    }

    fn poll_changes(&self) -> Result<bool> {
        (**self).poll_changes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_concerns_key() {
        let keyed = StorageEvent {
            key: Some("resque_donors".to_string()),
            origin: 2,
        };
        assert!(keyed.concerns("resque_donors"));
        assert!(!keyed.concerns("other"));

        let keyless = StorageEvent::lagged();
        assert!(keyless.concerns("anything"));
    }

    #[test]
    fn test_events_skip_own_context() {
        let (tx, rx) = broadcast::channel(EVENT_CAPACITY);
        let mut events = StorageEvents::new(1, rx);

        tx.send(StorageEvent {
            key: Some("k".to_string()),
            origin: 1,
        })
        .unwrap();
        assert!(events.try_recv().is_none());

        tx.send(StorageEvent {
            key: Some("k".to_string()),
            origin: 2,
        })
        .unwrap();
        assert_eq!(events.try_recv().unwrap().origin, 2);
    }

    #[test]
    fn test_lagged_subscriber_gets_keyless_event() {
        let (tx, rx) = broadcast::channel(2);
        let mut events = StorageEvents::new(1, rx);

        for _ in 0..5 {
            tx.send(StorageEvent {
                key: Some("k".to_string()),
                origin: 2,
            })
            .unwrap();
        }

        let event = events.try_recv().unwrap();
        assert!(event.key.is_none());
        assert_eq!(event.origin, EXTERNAL_CONTEXT);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_closed() {
        let (tx, rx) = broadcast::channel(EVENT_CAPACITY);
        let mut events = StorageEvents::new(1, rx);
        drop(tx);
        assert!(events.recv().await.is_none());
    }
}
