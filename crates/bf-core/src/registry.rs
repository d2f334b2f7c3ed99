//! Concurrency-safe registry of live browser processes.
//!
//! The registry is the sole arbiter of the at-most-one-running-instance
//! invariant: nothing creates a process record except through
//! [`ProcessRegistry::try_insert`]. The lock is held only for the map
//! operation itself; no I/O ever happens under it, so unrelated profiles
//! never block on each other's slow spawns or timeout waits.

use bf_common::ProfileId;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

/// Bookkeeping for one live browser process.
///
/// Owned by the registry from the moment the launch is confirmed until
/// removal by an explicit stop or by the exit monitor, whichever wins.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub profile_id: ProfileId,
    pub pid: u32,
    pub data_dir: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// Map from profile id to its live process record.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    inner: Mutex<HashMap<ProfileId, ProcessRecord>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically insert a record if none exists for the profile.
    ///
    /// Returns `false` when a record is already present; the caller must
    /// treat that as "already running", not as an error.
    pub fn try_insert(&self, record: ProcessRecord) -> bool {
        let mut map = self.inner.lock().expect("registry lock");
        match map.entry(record.profile_id.clone()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Atomically remove and return the record for a profile, if any.
    ///
    /// Idempotent: the exit monitor and an explicit stop may both attempt
    /// removal; whichever arrives second gets `None`.
    pub fn remove(&self, profile_id: &ProfileId) -> Option<ProcessRecord> {
        self.inner.lock().expect("registry lock").remove(profile_id)
    }

    /// Clone of the record for a profile, if one is registered.
    pub fn get(&self, profile_id: &ProfileId) -> Option<ProcessRecord> {
        self.inner
            .lock()
            .expect("registry lock")
            .get(profile_id)
            .cloned()
    }

    pub fn contains(&self, profile_id: &ProfileId) -> bool {
        self.inner
            .lock()
            .expect("registry lock")
            .contains_key(profile_id)
    }

    /// Sorted snapshot of all registered profile ids.
    pub fn snapshot_ids(&self) -> BTreeSet<ProfileId> {
        self.inner
            .lock()
            .expect("registry lock")
            .keys()
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().expect("registry lock").len()
    }
}
