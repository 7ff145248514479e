//! # Jitter for retry delays.
//!
//! [`JitterPolicy`] randomizes backoff delays so that a burst of events
//! failing together does not retry in lockstep.
//!
//! - [`JitterPolicy::None`] — exact computed delay (default; keeps retry
//!   timing fully deterministic)
//! - [`JitterPolicy::Full`] — random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`] — `delay/2 + random[0, delay/2]`

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use the exact computed delay.
    #[default]
    None,

    /// Full jitter: random delay in `[0, delay]`. Maximum load spreading,
    /// can shrink the delay all the way to zero.
    Full,

    /// Equal jitter: `delay/2 + random[0, delay/2]`. Preserves at least
    /// half the computed delay while still decorrelating retries.
    Equal,
}

impl JitterPolicy {
    /// Applies this policy to a computed delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => full_jitter(delay),
            JitterPolicy::Equal => equal_jitter(delay),
        }
    }
}

/// Full jitter: random[0, delay]
fn full_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

/// Equal jitter: delay/2 + random[0, delay/2]
fn equal_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    let half = ms / 2;
    let jitter = if half == 0 {
        0
    } else {
        rand::rng().random_range(0..=half)
    };
    Duration::from_millis(half + jitter)
}
