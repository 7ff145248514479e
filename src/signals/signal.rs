//! # Lifecycle signals emitted by the engine.
//!
//! The [`SignalKind`] enum classifies what happened; the [`Signal`] struct
//! carries the metadata (event id, type, attempt, delay, error) relevant
//! to that kind. Signals are advisory observability data — the
//! authoritative state lives on the event records.
//!
//! ## Ordering
//! Each signal has a globally unique sequence number (`seq`) that
//! increases monotonically. Use `seq` to restore exact order when signals
//! are consumed out of order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::event::EventId;

/// Global sequence counter for signal ordering.
static SIGNAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of engine lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    // === Emission ===
    /// An event was accepted and appended to the store.
    ///
    /// Sets: `event`, `event_type`.
    Emitted,

    /// An emission was short-circuited because its idempotency key had
    /// already completed; no record was appended.
    ///
    /// Sets: `event` (the id returned to the caller), `event_type`.
    IdempotentSkip,

    // === Execution ===
    /// An execution unit took ownership of an event.
    ///
    /// Sets: `event`, `event_type`, `attempt` (the upcoming attempt).
    DispatchStarted,

    /// An event's type had no registered handlers; it completed trivially.
    ///
    /// Sets: `event`, `event_type`.
    NoHandlers,

    /// All handlers ran without error; the event is terminal.
    ///
    /// Sets: `event`, `event_type`, `attempt`.
    Completed,

    /// A handler failed and the event was re-queued with a backoff delay.
    ///
    /// Sets: `event`, `event_type`, `attempt`, `delay_ms`, `error`.
    RetryScheduled,

    /// An attempt exceeded its configured timeout (followed by either
    /// `RetryScheduled` or `Failed`).
    ///
    /// Sets: `event`, `event_type`, `attempt`, `delay_ms` (the timeout).
    TimeoutHit,

    /// A handler failed with attempts exhausted (or fatally); terminal.
    ///
    /// Sets: `event`, `event_type`, `attempt`, `error`.
    Failed,

    // === Housekeeping ===
    /// The idle retention sweep removed aged terminal records.
    ///
    /// Sets: `count`.
    Pruned,

    // === Lifecycle ===
    /// Engine shutdown was requested.
    ShutdownRequested,

    /// All in-flight executions finished within the grace period.
    Drained,

    /// The grace period elapsed with executions still in flight.
    GraceExceeded,
}

/// One lifecycle signal with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - remaining fields are set depending on the [`SignalKind`]
#[derive(Clone, Debug)]
pub struct Signal {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Signal classification.
    pub kind: SignalKind,
    /// Id of the event this signal concerns, if any.
    pub event: Option<EventId>,
    /// Type of the event this signal concerns, if any.
    pub event_type: Option<Arc<str>>,
    /// Attempt count (1-based) for execution signals.
    pub attempt: Option<u32>,
    /// Backoff delay or timeout in milliseconds (compact).
    pub delay_ms: Option<u64>,
    /// Failure message for retry/failure signals.
    pub error: Option<Arc<str>>,
    /// Record count for housekeeping signals.
    pub count: Option<usize>,
}

impl Signal {
    /// Creates a new signal of the given kind with the current timestamp
    /// and the next sequence number.
    pub fn now(kind: SignalKind) -> Self {
        Self {
            seq: SIGNAL_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            event: None,
            event_type: None,
            attempt: None,
            delay_ms: None,
            error: None,
            count: None,
        }
    }

    /// Attaches the event id.
    #[inline]
    pub fn with_event(mut self, id: EventId) -> Self {
        self.event = Some(id);
        self
    }

    /// Attaches the event type.
    #[inline]
    pub fn with_event_type(mut self, event_type: impl Into<Arc<str>>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a failure message.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a record count.
    #[inline]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Signal::now(SignalKind::Emitted);
        let b = Signal::now(SignalKind::Emitted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_attach_metadata() {
        let id = EventId::generate();
        let sig = Signal::now(SignalKind::RetryScheduled)
            .with_event(id)
            .with_event_type("user.created")
            .with_attempt(2)
            .with_delay(Duration::from_millis(2000))
            .with_error("boom");

        assert_eq!(sig.event, Some(id));
        assert_eq!(sig.event_type.as_deref(), Some("user.created"));
        assert_eq!(sig.attempt, Some(2));
        assert_eq!(sig.delay_ms, Some(2000));
        assert_eq!(sig.error.as_deref(), Some("boom"));
    }
}
