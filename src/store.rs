//! # Event store: the engine's record collection.
//!
//! [`EventStore`] owns every [`EventRecord`] for the life of the process.
//! Storage order is unspecified (an id-keyed map); the dispatch order is
//! established by sorting snapshots, so inspection APIs observe the same
//! order the scheduler evaluates.
//!
//! ## Rules
//! - The store is the **only** mutation path for lifecycle fields; callers
//!   get cloned snapshots.
//! - Per-record updates run under the write lock, so status transitions
//!   are linearizable per record. Cross-record ordering is not promised.
//! - `prune` removes terminal records whose completion time (creation time
//!   if unset) has aged past the retention window.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::event::{dispatch_cmp, EventId, EventRecord};

/// Concurrent collection of event records.
pub struct EventStore {
    records: RwLock<HashMap<EventId, EventRecord>>,
}

impl EventStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a freshly-emitted record.
    pub async fn append(&self, record: EventRecord) {
        let mut records = self.records.write().await;
        records.insert(record.id, record);
    }

    /// Returns a snapshot of the record with the given id, if present.
    pub async fn get(&self, id: &EventId) -> Option<EventRecord> {
        let records = self.records.read().await;
        records.get(id).cloned()
    }

    /// Returns a snapshot of every record, in dispatch order.
    ///
    /// The snapshot is a copy; the store may mutate while it is iterated.
    pub async fn snapshot(&self) -> Vec<EventRecord> {
        let records = self.records.read().await;
        let mut all: Vec<EventRecord> = records.values().cloned().collect();
        all.sort_by(dispatch_cmp);
        all
    }

    /// Applies `f` to the record with the given id under the write lock.
    ///
    /// This is the engine's single mutation path; the closure's return
    /// value is passed through. Returns `None` when the id is unknown.
    pub async fn update<T>(
        &self,
        id: &EventId,
        f: impl FnOnce(&mut EventRecord) -> T,
    ) -> Option<T> {
        let mut records = self.records.write().await;
        records.get_mut(id).map(f)
    }

    /// Removes terminal records older than the retention window.
    ///
    /// Returns the number of records removed.
    pub async fn prune(&self, now: Instant, retention: Duration) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| {
            !(record.is_terminal()
                && now.duration_since(record.retention_anchor()) > retention)
        });
        before - records.len()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns `true` when the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}
