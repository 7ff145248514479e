//! # Dispatcher: the engine's single scheduling loop.
//!
//! One long-lived task per engine. Each pass takes a sorted snapshot,
//! picks the first eligible pending record (pending status, eligibility
//! window elapsed, not in flight), claims a concurrency permit, and
//! spawns an execution unit. The loop re-enters on every wake signal —
//! `emit` and each execution completion both notify — rather than being
//! recursively re-invoked from completion callbacks.
//!
//! ## Waiting states
//! ```text
//! nothing pending, nothing in flight ──► retention sweep, then wait for wake
//! only delayed work pending          ──► sleep until earliest eligibility
//!                                        (or wake, whichever first)
//! eligible work, capacity saturated  ──► block on a free permit, then
//!                                        re-evaluate selection
//! eligible work, capacity free       ──► claim in-flight, spawn execution
//! ```
//!
//! Blocking on the semaphore replaces the original design's fixed-interval
//! poll: the loop wakes exactly when a slot frees.
//!
//! ## Shutdown
//! On cancellation the loop stops selecting and drains the in-flight
//! executions, waiting up to the configured grace before aborting the
//! rest and reporting them.

use std::sync::Arc;

use tokio::sync::TryAcquireError;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::engine::EngineInner;
use crate::core::executor;
use crate::error::EngineError;
use crate::event::{EventRecord, EventStatus};
use crate::signals::{Signal, SignalKind};

/// The engine's scheduling loop.
pub(crate) struct Dispatcher {
    inner: Arc<EngineInner>,
    token: CancellationToken,
}

/// What a scheduling pass decided to do next.
enum Pass {
    /// Launch this record now.
    Launch(EventRecord),
    /// Nothing selectable before this instant; sleep until then.
    SleepUntil(Instant),
    /// Nothing selectable and nothing scheduled; wait for a wake signal.
    Wait { quiescent: bool },
}

impl Dispatcher {
    pub(crate) fn new(inner: Arc<EngineInner>, token: CancellationToken) -> Self {
        Self { inner, token }
    }

    /// Runs until cancelled, then drains in-flight executions.
    pub(crate) async fn run(self) -> Result<(), EngineError> {
        let mut executions: JoinSet<()> = JoinSet::new();

        loop {
            // Reap finished execution tasks so the set stays bounded.
            while executions.try_join_next().is_some() {}

            if self.token.is_cancelled() {
                break;
            }

            match self.select().await {
                Pass::Launch(record) => {
                    if !self.launch(&mut executions, record).await {
                        break;
                    }
                }
                Pass::SleepUntil(at) => {
                    tokio::select! {
                        _ = time::sleep_until(at) => {}
                        _ = self.inner.wake.notified() => {}
                        _ = self.token.cancelled() => break,
                    }
                }
                Pass::Wait { quiescent } => {
                    if quiescent {
                        self.sweep().await;
                    }
                    tokio::select! {
                        _ = self.inner.wake.notified() => {}
                        _ = self.token.cancelled() => break,
                    }
                }
            }
        }

        self.drain(executions).await
    }

    /// One scheduling pass over a sorted snapshot.
    ///
    /// The snapshot is sorted by the dispatch order, so the first record
    /// that passes the eligibility checks is the selection.
    async fn select(&self) -> Pass {
        let now = Instant::now();
        let snapshot = self.inner.store.snapshot().await;

        let mut next_wake: Option<Instant> = None;
        for record in snapshot {
            if record.status != EventStatus::Pending {
                // Pending records sort first; nothing selectable follows.
                break;
            }
            if self.inner.is_in_flight(&record.id) {
                continue;
            }
            match record.next_eligible_at {
                Some(at) if at > now => {
                    next_wake = Some(next_wake.map_or(at, |w| w.min(at)));
                }
                _ => return Pass::Launch(record),
            }
        }

        match next_wake {
            Some(at) => Pass::SleepUntil(at),
            None => Pass::Wait {
                quiescent: self.inner.in_flight_count() == 0,
            },
        }
    }

    /// Claims capacity and the in-flight slot, then spawns the execution.
    ///
    /// Returns `false` when the loop should stop (cancelled while waiting
    /// for capacity, or the semaphore was closed).
    async fn launch(&self, executions: &mut JoinSet<()>, record: EventRecord) -> bool {
        let permit = match &self.inner.semaphore {
            Some(sem) => match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(TryAcquireError::Closed) => return false,
                Err(TryAcquireError::NoPermits) => {
                    // Saturated: block until a slot frees, then re-evaluate
                    // the selection against fresh state.
                    let acquire = sem.clone().acquire_owned();
                    tokio::select! {
                        res = acquire => match res {
                            Ok(permit) => drop(permit),
                            Err(_closed) => return false,
                        },
                        _ = self.token.cancelled() => return false,
                    }
                    return true;
                }
            },
            None => None,
        };

        if !self.inner.claim_in_flight(record.id) {
            // Already owned by an execution unit; drop the permit and
            // re-evaluate.
            return true;
        }

        let inner = Arc::clone(&self.inner);
        let id = record.id;
        executions.spawn(async move {
            executor::execute(&inner, id).await;
            inner.release_in_flight(&id);
            drop(permit);
            inner.wake.notify_one();
        });
        true
    }

    /// Trailing retention sweep, run when the engine goes idle.
    async fn sweep(&self) {
        let now = Instant::now();
        let retention = self.inner.cfg.retention;
        let pruned = self.inner.store.prune(now, retention).await;
        let expired = self.inner.idempotency.prune(now, retention).await;
        if pruned > 0 || expired > 0 {
            debug!(pruned, expired, "retention sweep");
            self.inner
                .bus
                .publish(Signal::now(SignalKind::Pruned).with_count(pruned + expired));
        }
    }

    /// Waits for in-flight executions after cancellation.
    ///
    /// Publishes [`SignalKind::Drained`] when everything finished within
    /// the grace window, or [`SignalKind::GraceExceeded`] (and returns the
    /// stuck ids) when it did not.
    async fn drain(&self, mut executions: JoinSet<()>) -> Result<(), EngineError> {
        let grace = self.inner.cfg.grace;
        let drained = time::timeout(grace, async {
            while executions.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => {
                self.inner.bus.publish(Signal::now(SignalKind::Drained));
                Ok(())
            }
            Err(_) => {
                let stuck = self.inner.in_flight_snapshot();
                self.inner
                    .bus
                    .publish(Signal::now(SignalKind::GraceExceeded));
                executions.shutdown().await;
                Err(EngineError::GraceExceeded { grace, stuck })
            }
        }
    }
}
