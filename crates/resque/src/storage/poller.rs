//! Background task that surfaces writes made outside this process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::KeyValueStore;

/// A cloneable handle used to stop a change poller.
#[derive(Debug, Clone, Default)]
pub struct PollerHandle {
    stop_signal: Arc<AtomicBool>,
}

impl PollerHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the poller to stop after its current tick.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

/// Spawn a task calling [`KeyValueStore::poll_changes`] every `interval`.
///
/// Detected changes reach subscribers of `store`. Poll failures are logged
/// and retried on the next tick.
pub fn spawn_change_poller<S>(store: Arc<S>, interval: Duration) -> (PollerHandle, JoinHandle<()>)
where
    S: KeyValueStore + ?Sized + 'static,
{
    let handle = PollerHandle::new();
    let task_handle = handle.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if task_handle.should_stop() {
                debug!("Change poller stopped");
                break;
            }
            if let Err(e) = store.poll_changes() {
                warn!(error = %e, "Failed to poll store for changes");
            }
        }
    });

    (handle, task)
}
