//! # Event records: the engine's central entity.
//!
//! An [`EventRecord`] is created by `emit` and owned by the
//! [`EventStore`](crate::EventStore) for the rest of its life. Producers
//! and handlers only ever see cloned snapshots; every lifecycle mutation
//! (status, attempts, eligibility) goes through the store's update path.
//!
//! ## State machine
//! ```text
//! pending ──► processing ──► completed          (terminal)
//!    ▲             │
//!    │             ├──► pending + next_eligible_at   (retry, attempts < max)
//!    └─────────────┘
//!                  └──► failed                  (terminal, attempts exhausted)
//! ```
//!
//! ## Dispatch ordering
//! [`dispatch_cmp`] defines the order the scheduler evaluates records in,
//! and the order `all_events` snapshots are returned in:
//! 1. `pending` records before everything else;
//! 2. records with an eligibility time sort *after* records without one
//!    (delayed/backoff work defers to immediately-ready work);
//! 3. among two delayed records, earlier eligibility first;
//! 4. higher priority weight first (high 3, medium 2, low 1);
//! 5. ties broken by creation time, earliest first.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use crate::policies::RetryPolicy;

/// Opaque unique identifier assigned to an event at emission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a fresh id.
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Priority class of an event.
///
/// Within a scheduling pass, higher-priority pending events are selected
/// before lower-priority ones; see [`dispatch_cmp`] for the full rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Selected first among otherwise-equal events.
    High,
    /// The default.
    #[default]
    Medium,
    /// Selected last among otherwise-equal events.
    Low,
}

impl Priority {
    /// Numeric weight used by the dispatch ordering (high 3 > medium 2 > low 1).
    #[inline]
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

/// Lifecycle status of an event record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Waiting to be selected by the scheduler.
    Pending,
    /// Currently owned by an execution unit.
    Processing,
    /// All handlers ran without error. Terminal.
    Completed,
    /// Attempts exhausted (or a fatal handler error). Terminal.
    Failed,
}

impl EventStatus {
    /// Returns `true` for [`EventStatus::Completed`] and [`EventStatus::Failed`].
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Failed)
    }
}

/// One event as tracked by the engine.
///
/// Snapshots handed out by `get_event`/`all_events` (and passed to
/// handlers) are clones; mutating them has no effect on the engine's copy.
#[derive(Clone, Debug)]
pub struct EventRecord {
    /// Unique id, immutable after emission.
    pub id: EventId,
    /// Event kind; selects handlers.
    pub event_type: String,
    /// Opaque application data, immutable after emission.
    pub payload: Value,
    /// Monotonic creation timestamp.
    pub created_at: Instant,
    /// Priority class.
    pub priority: Priority,
    /// Current lifecycle status.
    pub status: EventStatus,
    /// Number of execution attempts so far. Starts at 0.
    pub attempts: u32,
    /// Attempt ceiling from the emission's retry policy.
    pub max_attempts: u32,
    /// The record is not selectable before this time, when set.
    pub next_eligible_at: Option<Instant>,
    /// Description of the most recent failure, if any.
    pub last_error: Option<String>,
    /// Caller-supplied duplicate-suppression token.
    pub idempotency_key: Option<String>,
    /// Set when the record reaches a terminal status; drives retention.
    pub finished_at: Option<Instant>,
    /// Per-emission retry policy.
    pub(crate) retry: RetryPolicy,
    /// Per-attempt execution timeout, if any.
    pub(crate) timeout: Option<Duration>,
}

impl EventRecord {
    /// Returns `true` once the record has reached `completed` or `failed`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns `true` if the record is pending and its eligibility window
    /// has elapsed at `now`.
    #[inline]
    pub fn is_eligible(&self, now: Instant) -> bool {
        self.status == EventStatus::Pending
            && self.next_eligible_at.is_none_or(|at| at <= now)
    }

    /// The timestamp retention pruning compares against: completion time
    /// when the record is terminal, creation time otherwise.
    #[inline]
    pub(crate) fn retention_anchor(&self) -> Instant {
        self.finished_at.unwrap_or(self.created_at)
    }
}

/// Total order the scheduler evaluates records in.
///
/// This is a full sort over *all* records, not just the eligible subset,
/// so inspection snapshots show the same order the scheduler sees.
pub(crate) fn dispatch_cmp(a: &EventRecord, b: &EventRecord) -> Ordering {
    let a_pending = a.status == EventStatus::Pending;
    let b_pending = b.status == EventStatus::Pending;
    if a_pending != b_pending {
        return if a_pending {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }

    match (a.next_eligible_at, b.next_eligible_at) {
        (Some(a_at), Some(b_at)) if a_at != b_at => return a_at.cmp(&b_at),
        (Some(_), Some(_)) => {}
        (Some(_), None) => return Ordering::Greater,
        (None, Some(_)) => return Ordering::Less,
        (None, None) => {}
    }

    b.priority
        .weight()
        .cmp(&a.priority.weight())
        .then_with(|| a.created_at.cmp(&b.created_at))
}
