//! # Idempotency tracker: completed-key membership.
//!
//! Records the idempotency keys of events that reached `completed`. A
//! later emission carrying a recorded key invokes no handlers.
//!
//! Keys carry their completion instant so the idle retention sweep can
//! expire them with the same window as terminal records; without expiry
//! the set would grow for the life of the process.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Set of idempotency keys whose events completed, with completion times.
pub struct IdempotencyTracker {
    completed: RwLock<HashMap<String, Instant>>,
}

impl IdempotencyTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            completed: RwLock::new(HashMap::new()),
        }
    }

    /// Returns `true` if an event with this key has completed.
    pub async fn has_completed(&self, key: &str) -> bool {
        self.completed.read().await.contains_key(key)
    }

    /// Records `key` as completed at `at`.
    ///
    /// Idempotent: re-recording keeps the original completion time.
    pub async fn mark_completed(&self, key: impl Into<String>, at: Instant) {
        let mut completed = self.completed.write().await;
        completed.entry(key.into()).or_insert(at);
    }

    /// Expires keys whose completion time has aged past the retention
    /// window. Returns the number of keys removed.
    pub async fn prune(&self, now: Instant, retention: Duration) -> usize {
        let mut completed = self.completed.write().await;
        let before = completed.len();
        completed.retain(|_, at| now.duration_since(*at) <= retention);
        before - completed.len()
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.completed.read().await.len()
    }

    /// Returns `true` when no keys are tracked.
    pub async fn is_empty(&self) -> bool {
        self.completed.read().await.is_empty()
    }
}

impl Default for IdempotencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_membership() {
        let tracker = IdempotencyTracker::new();
        assert!(!tracker.has_completed("order-1").await);

        tracker.mark_completed("order-1", Instant::now()).await;
        assert!(tracker.has_completed("order-1").await);
        assert!(!tracker.has_completed("order-2").await);
    }

    #[tokio::test]
    async fn test_mark_is_idempotent() {
        let tracker = IdempotencyTracker::new();
        let first = Instant::now();
        let later = first + Duration::from_secs(60);

        tracker.mark_completed("k", first).await;
        tracker.mark_completed("k", later).await;
        assert_eq!(tracker.len().await, 1);

        // The original completion time wins, so expiry is anchored to the
        // first completion.
        let removed = tracker
            .prune(first + Duration::from_secs(30), Duration::from_secs(10))
            .await;
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_prune_keeps_recent_keys() {
        let tracker = IdempotencyTracker::new();
        let start = Instant::now();
        let later = start + Duration::from_secs(120);

        tracker.mark_completed("old", start).await;
        tracker.mark_completed("fresh", later).await;

        let removed = tracker.prune(later, Duration::from_secs(60)).await;
        assert_eq!(removed, 1);
        assert!(!tracker.has_completed("old").await);
        assert!(tracker.has_completed("fresh").await);
    }
}
