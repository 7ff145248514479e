//! # Retry policy for failed events.
//!
//! [`RetryPolicy`] controls how many attempts an event gets and how the
//! delay before each retry is computed. The delay derives purely from the
//! attempt count, so jitter output never feeds back into subsequent
//! calculations.
//!
//! The attempt number passed to [`RetryPolicy::delay_for`] is the count
//! *after* the increment for the failing attempt:
//!
//! ```
//! use std::time::Duration;
//! use conveyor::{Backoff, JitterPolicy, RetryPolicy};
//!
//! let policy = RetryPolicy {
//!     max_attempts: 5,
//!     backoff: Backoff::Exponential,
//!     interval: Duration::from_millis(1000),
//!     jitter: JitterPolicy::None,
//! };
//!
//! // First failing attempt: base interval, unscaled.
//! assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
//! // Then the delay doubles per attempt.
//! assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
//! assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// How retry delays grow with the attempt count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backoff {
    /// Every retry waits the base interval, regardless of attempt count.
    Fixed,
    /// Delay doubles per attempt: `interval × 2^(attempts - 1)` (default).
    #[default]
    Exponential,
}

/// Per-emission retry configuration.
///
/// Carried on every event record; there is no global retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt ceiling. An event still failing at this count is terminal.
    pub max_attempts: u32,
    /// Delay growth strategy.
    pub backoff: Backoff,
    /// Base interval the delay derives from.
    pub interval: Duration,
    /// Jitter applied to the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for RetryPolicy {
    /// Returns the policy used when an emission specifies nothing:
    /// 3 attempts, exponential backoff, 1000 ms base interval, no jitter.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential,
            interval: Duration::from_millis(1000),
            jitter: JitterPolicy::None,
        }
    }
}

impl RetryPolicy {
    /// Computes the delay before the next retry after `attempts` failures.
    ///
    /// `attempts` is the post-increment count of the attempt that just
    /// failed; `attempts <= 1` is the base case and yields the unscaled
    /// interval for both backoff kinds. Exponential growth is clamped
    /// rather than allowed to overflow.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential => {
                if attempts <= 1 {
                    self.interval
                } else {
                    let factor = 1u32
                        .checked_shl(attempts - 1)
                        .unwrap_or(u32::MAX);
                    self.interval.saturating_mul(factor)
                }
            }
        };
        self.jitter.apply(base)
    }

    /// Returns `true` when an event with this policy has attempts left
    /// after `attempts` failures.
    #[inline]
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
