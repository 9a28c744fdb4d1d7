//! The donor registry.
//!
//! The registry is a newest-first JSON array of [`DonorRecord`]s stored under
//! a single key of a [`KeyValueStore`]. Nothing is cached between calls: each
//! read goes back to the store, so an append made in one context is visible to
//! the next read in any other.
//!
//! Concurrent appends from different contexts are last-writer-wins at the
//! granularity of the whole array.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::donor::{BloodGroup, DonorForm, DonorRecord, IdGenerator};
use crate::error::{Error, Result};
use crate::query::{self, DonorQuery};
use crate::storage::{KeyValueStore, StorageEvents};

/// Default storage key for the registry.
pub const DEFAULT_REGISTRY_KEY: &str = "resque_donors";

/// Fresh ids tried before giving up on a registration.
const MAX_ID_ATTEMPTS: usize = 3;

/// Repository of donor records over a key-value store.
#[derive(Debug)]
pub struct Registry<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> Registry<S> {
    /// Create a registry stored under `key`.
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Create a registry under [`DEFAULT_REGISTRY_KEY`].
    pub fn with_default_key(store: S) -> Self {
        Self::new(store, DEFAULT_REGISTRY_KEY)
    }

    /// The storage key holding the registry.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read all donors, newest first, failing on undecodable data.
    ///
    /// A missing key is an empty registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageCorrupt`] if the stored value is not a donor
    /// array, or a storage error if the store cannot be read.
    pub fn try_list(&self) -> Result<Vec<DonorRecord>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };

        serde_json::from_str(&raw).map_err(|e| Error::StorageCorrupt {
            key: self.key.clone(),
            message: e.to_string(),
        })
    }

    /// Read all donors, newest first.
    ///
    /// Corrupt or unreadable data is logged and read as an empty registry.
    #[must_use]
    pub fn list(&self) -> Vec<DonorRecord> {
        self.try_list().unwrap_or_else(|e| {
            warn!(key = %self.key, error = %e, "Treating donor registry as empty");
            Vec::new()
        })
    }

    /// Donors matching `query`, newest first.
    #[must_use]
    pub fn search(&self, query: &DonorQuery) -> Vec<DonorRecord> {
        query::filter(&self.list(), query)
    }

    /// Insert a record at the head of the registry and persist the whole array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDonorId`] if the id is already present, the
    /// store's error if the current array could not be read, or
    /// [`Error::StorageWrite`] if the array could not be written. A corrupt
    /// stored value is replaced.
    pub fn append(&self, record: DonorRecord) -> Result<()> {
        let mut donors = match self.try_list() {
            Ok(donors) => donors,
            Err(e @ Error::StorageCorrupt { .. }) => {
                warn!(key = %self.key, error = %e, "Replacing corrupt donor registry");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        if donors.iter().any(|d| d.id == record.id) {
            return Err(Error::DuplicateDonorId { id: record.id });
        }

        let id = record.id.clone();
        donors.insert(0, record);
        let serialized = serde_json::to_string(&donors)?;
        self.store.set(&self.key, &serialized)?;

        info!(id = %id, total = donors.len(), "Donor appended");
        Ok(())
    }

    /// Validate a registration form and append the resulting donor.
    ///
    /// On an id collision a fresh id is drawn, up to a small fixed number of
    /// attempts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the form is invalid; nothing is
    /// appended in that case. Storage failures are returned as-is.
    pub fn register(
        &self,
        form: &DonorForm,
        ids: &dyn IdGenerator,
        now: DateTime<Utc>,
    ) -> Result<DonorRecord> {
        let mut record =
            DonorRecord::from_form(ids.next_id(), form, now).map_err(Error::Validation)?;

        let mut attempt = 1;
        loop {
            match self.append(record.clone()) {
                Ok(()) => return Ok(record),
                Err(Error::DuplicateDonorId { id }) if attempt < MAX_ID_ATTEMPTS => {
                    debug!(id = %id, attempt, "Donor id collision, drawing a new id");
                    record.id = ids.next_id();
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// BLAKE3 digest of the stored value, or `None` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn fingerprint(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(&self.key)?
            .map(|raw| blake3::hash(raw.as_bytes()).to_hex().to_string()))
    }

    /// Summary of the current registry contents.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats::from_donors(&self.list())
    }

    /// Subscribe to changes of this registry made by other contexts.
    pub fn watch(&self) -> RegistryWatch {
        RegistryWatch {
            events: self.store.subscribe(),
            key: self.key.clone(),
        }
    }
}

/// Signals that the registry should be re-read.
#[derive(Debug)]
pub struct RegistryWatch {
    events: StorageEvents,
    key: String,
}

impl RegistryWatch {
    /// Wait until another context changes the registry.
    ///
    /// Returns `false` once the store is gone and no more changes can arrive.
    pub async fn changed(&mut self) -> bool {
        while let Some(event) = self.events.recv().await {
            if event.concerns(&self.key) {
                return true;
            }
        }
        false
    }

    /// Drain pending events, returning whether any concerned the registry.
    pub fn take_pending(&mut self) -> bool {
        let mut changed = false;
        while let Some(event) = self.events.try_recv() {
            changed |= event.concerns(&self.key);
        }
        changed
    }
}

/// Counts over the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Number of donors.
    pub total: usize,
    /// Donors per blood group; groups with no donors are omitted.
    pub by_group: BTreeMap<BloodGroup, usize>,
    /// Creation time of the oldest donor.
    pub oldest: Option<DateTime<Utc>>,
    /// Creation time of the newest donor.
    pub newest: Option<DateTime<Utc>>,
}

impl RegistryStats {
    /// Compute statistics for a donor list.
    #[must_use]
    pub fn from_donors(donors: &[DonorRecord]) -> Self {
        let mut by_group = BTreeMap::new();
        for donor in donors {
            *by_group.entry(donor.blood_group).or_insert(0) += 1;
        }

        Self {
            total: donors.len(),
            by_group,
            oldest: donors.iter().map(|d| d.created_at).min(),
            newest: donors.iter().map(|d| d.created_at).max(),
        }
    }
}
