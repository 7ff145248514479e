//! # Per-emission configuration.
//!
//! [`EmitOptions`] bundles everything an emitter can configure about one
//! event: priority, initial delay, retry policy, idempotency key, and an
//! optional per-attempt timeout.
//!
//! Every recognized field is an explicit struct member with a documented
//! default; there is no dynamic option bag. A default-constructed value is
//! a valid configuration for the common case:
//!
//! ```
//! use conveyor::EmitOptions;
//!
//! let opts = EmitOptions::default();
//! assert_eq!(opts.retry.max_attempts, 3);
//! assert!(opts.idempotency_key.is_none());
//! ```

use std::time::Duration;

use crate::event::Priority;
use crate::policies::RetryPolicy;

/// Options recognized at emission.
///
/// Defaults: medium priority, no delay, three exponential-backoff attempts
/// at a 1000 ms base interval, no idempotency key, no timeout.
///
/// ## Example
/// ```
/// use std::time::Duration;
/// use conveyor::{Backoff, EmitOptions, Priority, RetryPolicy};
///
/// let opts = EmitOptions::default()
///     .with_priority(Priority::High)
///     .with_delay(Duration::from_millis(250))
///     .with_retry(RetryPolicy {
///         max_attempts: 5,
///         backoff: Backoff::Fixed,
///         interval: Duration::from_millis(200),
///         ..RetryPolicy::default()
///     })
///     .with_idempotency_key("order-1234");
///
/// assert_eq!(opts.priority, Priority::High);
/// assert_eq!(opts.retry.max_attempts, 5);
/// ```
#[derive(Clone, Debug, Default)]
pub struct EmitOptions {
    /// Priority class. Defaults to [`Priority::Medium`].
    pub priority: Priority,

    /// Initial delay before the event becomes eligible. Defaults to zero.
    ///
    /// A `Duration` cannot be negative, so the malformed-delay case is
    /// unrepresentable.
    pub delay: Duration,

    /// Retry policy: attempt ceiling, backoff kind, base interval, jitter.
    pub retry: RetryPolicy,

    /// Duplicate-suppression token. When a previous emission with the same
    /// key has completed, this emission invokes no handlers.
    pub idempotency_key: Option<String>,

    /// Per-attempt execution timeout. `None` falls back to the engine's
    /// configured default (which itself defaults to no timeout).
    pub timeout: Option<Duration>,
}

impl EmitOptions {
    /// Returns the options with the given priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Returns the options with the given initial delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the options with the given retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the options with the given idempotency key.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Returns the options with the given per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::Backoff;

    #[test]
    fn test_defaults_match_documented_values() {
        let opts = EmitOptions::default();
        assert_eq!(opts.priority, Priority::Medium);
        assert_eq!(opts.delay, Duration::ZERO);
        assert_eq!(opts.retry.max_attempts, 3);
        assert_eq!(opts.retry.backoff, Backoff::Exponential);
        assert_eq!(opts.retry.interval, Duration::from_millis(1000));
        assert!(opts.idempotency_key.is_none());
        assert!(opts.timeout.is_none());
    }

    #[test]
    fn test_builders_compose() {
        let opts = EmitOptions::default()
            .with_priority(Priority::Low)
            .with_delay(Duration::from_secs(1))
            .with_idempotency_key("k")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(opts.priority, Priority::Low);
        assert_eq!(opts.delay, Duration::from_secs(1));
        assert_eq!(opts.idempotency_key.as_deref(), Some("k"));
        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
    }
}
