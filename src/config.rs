//! # Engine-wide configuration.
//!
//! Provides [`Config`], the centralized settings for a conveyor engine
//! instance.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no semaphore created)
//! - `timeout = 0s` → no default per-attempt timeout

use std::time::Duration;

/// Configuration for a conveyor engine instance.
///
/// Defines:
/// - **Concurrency**: how many events may execute simultaneously
/// - **Observability**: signal bus capacity
/// - **Retention**: how long terminal records (and completed idempotency
///   keys) are kept before the idle sweep removes them
/// - **Shutdown behavior**: grace period for draining in-flight executions
/// - **Execution defaults**: per-attempt timeout applied when an emission
///   does not specify its own
///
/// ## Field semantics
/// - `max_concurrent`: execution concurrency limit (`0` = unlimited)
/// - `bus_capacity`: signal bus ring buffer size (min 1; clamped)
/// - `retention`: age at which terminal records become prunable
/// - `grace`: maximum wait for in-flight executions during shutdown
/// - `timeout`: default per-attempt timeout (`0s` = no timeout)
///
/// Prefer the helper accessors over sprinkling sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of events executing concurrently.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` executions at any instant
    pub max_concurrent: usize,

    /// Capacity of the signal bus broadcast ring buffer.
    ///
    /// Slow subscribers that fall more than `bus_capacity` signals behind
    /// observe `Lagged` and skip older items. Minimum value is 1.
    pub bus_capacity: usize,

    /// Retention window for terminal records.
    ///
    /// When the dispatcher goes idle it removes completed/failed records
    /// whose completion time (creation time if unset) is older than
    /// `now - retention`. The same window expires completed idempotency
    /// keys.
    pub retention: Duration,

    /// Maximum wait for in-flight executions to finish during shutdown.
    ///
    /// Executions still running when the grace elapses are aborted and
    /// reported via `EngineError::GraceExceeded`.
    pub grace: Duration,

    /// Default per-attempt execution timeout.
    ///
    /// - `Duration::ZERO` = no timeout (an attempt runs until it returns)
    /// - `> 0` = applied to every emission that does not set its own
    pub timeout: Duration,
}

impl Config {
    /// Returns the concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent executions
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the default per-attempt timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → timeout applied per attempt
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_concurrent = 5`
    /// - `bus_capacity = 1024`
    /// - `retention = 7 days`
    /// - `grace = 30s`
    /// - `timeout = 0s` (no timeout)
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            bus_capacity: 1024,
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            grace: Duration::from_secs(30),
            timeout: Duration::ZERO,
        }
    }
}
