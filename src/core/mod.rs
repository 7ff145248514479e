//! Engine core: orchestration and lifecycle.
//!
//! The only public API from this module is [`Engine`]. Internal modules:
//! - [`engine`]: the engine instance, its owned components, and the
//!   public emit/on/inspect/shutdown surface;
//! - [`dispatcher`]: the long-lived scheduling loop (selection, capacity,
//!   wakeups, retention sweep, drain);
//! - [`executor`]: runs all handlers for one selected event and applies
//!   the retry policy to the outcome.

mod dispatcher;
mod engine;
mod executor;

pub use engine::Engine;

#[cfg(test)]
pub(crate) mod test_util {
    use std::future::Future;
    use std::time::Duration;

    use tokio::time::{sleep, Instant};

    /// Polls `probe` until it yields `true` or `max` elapses.
    ///
    /// Under the paused test clock the sleeps auto-advance, so waiting is
    /// effectively instant.
    pub(crate) async fn wait_until<F, Fut>(max: Duration, probe: F) -> bool
    where
        F: Fn() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = Instant::now() + max;
        loop {
            if probe().await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(5)).await;
        }
    }
}
