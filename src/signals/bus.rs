//! # Signal bus for broadcasting engine lifecycle signals.
//!
//! [`SignalBus`] is a thin wrapper around [`tokio::sync::broadcast`] that
//! provides non-blocking publishing from multiple sources (engine,
//! dispatcher, execution units).
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks or awaits.
//! - **Bounded capacity**: a single ring buffer stores recent signals.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip
//!   the `n` oldest items.
//! - **No persistence**: signals are dropped when no receiver is active.

use tokio::sync::broadcast;

use super::signal::Signal;

/// Broadcast channel for engine signals.
///
/// Cheap to clone (internally an `Arc`-backed sender). Each subscriber
/// gets an independent receiver that only observes signals published
/// after it subscribed.
#[derive(Clone, Debug)]
pub struct SignalBus {
    tx: broadcast::Sender<Signal>,
}

impl SignalBus {
    /// Creates a new bus with the given channel capacity (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Signal>(capacity);
        Self { tx }
    }

    /// Publishes a signal to all active subscribers.
    ///
    /// If there are no receivers the signal is dropped; publishing still
    /// returns immediately.
    pub fn publish(&self, signal: Signal) {
        let _ = self.tx.send(signal);
    }

    /// Creates a new receiver observing subsequent signals.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalKind;

    #[tokio::test]
    async fn test_subscriber_receives_published_signals() {
        let bus = SignalBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Signal::now(SignalKind::Emitted));
        bus.publish(Signal::now(SignalKind::Completed));

        assert_eq!(rx.recv().await.unwrap().kind, SignalKind::Emitted);
        assert_eq!(rx.recv().await.unwrap().kind, SignalKind::Completed);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_noop() {
        let bus = SignalBus::new(16);
        // Must not panic or block.
        bus.publish(Signal::now(SignalKind::Pruned));
    }
}
