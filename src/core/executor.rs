//! # Execution unit: run one event through its handlers.
//!
//! Exclusively owns one event record for the duration of an attempt (the
//! dispatcher's in-flight set enforces that). Marks the record
//! `processing`, runs the type's handlers **sequentially** in
//! registration order, and applies the retry policy to the outcome.
//!
//! ## Outcome flow
//! ```text
//! all handlers Ok ──► completed (+ idempotency key recorded)
//! zero handlers   ──► completed, attempts untouched (warned, not an error)
//! handler Err:
//!   retryable && attempts < max ──► pending, next_eligible_at = now + backoff
//!   otherwise                   ──► failed (terminal)
//! ```
//!
//! ## Rules
//! - The first failing handler aborts the remaining handlers for this
//!   attempt.
//! - A configured timeout covers the whole handler chain of one attempt
//!   and is a retryable failure.
//! - A panicking handler is contained and treated as a retryable failure.
//! - Every transition is written through the store (immediately visible
//!   to `get_event`/`all_events`) and mirrored on the signal bus.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{self, Instant};
use tracing::warn;

use crate::core::engine::EngineInner;
use crate::error::HandlerError;
use crate::event::{EventId, EventRecord, EventStatus};
use crate::handler::HandlerRef;
use crate::signals::{Signal, SignalKind};

/// Executes one attempt of the event with the given id.
///
/// The caller (the dispatcher) has already claimed the id in the
/// in-flight set and releases it when this returns.
pub(crate) async fn execute(inner: &EngineInner, id: EventId) {
    let Some(record) = inner
        .store
        .update(&id, |r| {
            r.status = EventStatus::Processing;
            r.clone()
        })
        .await
    else {
        // Pruned between selection and execution; nothing to do.
        return;
    };

    let attempt = record.attempts + 1;
    inner.bus.publish(
        Signal::now(SignalKind::DispatchStarted)
            .with_event(id)
            .with_event_type(record.event_type.as_str())
            .with_attempt(attempt),
    );

    // An earlier emission with the same key may have completed after this
    // record was appended but before it was selected; in that case the
    // duplicate completes without invoking any handler.
    if let Some(key) = &record.idempotency_key {
        if inner.idempotency.has_completed(key).await {
            complete(inner, &record, None).await;
            return;
        }
    }

    let handlers = inner.registry.handlers_for(&record.event_type).await;
    if handlers.is_empty() {
        warn!(
            event_type = %record.event_type,
            event = %id,
            "no handlers registered for event type"
        );
        inner.bus.publish(
            Signal::now(SignalKind::NoHandlers)
                .with_event(id)
                .with_event_type(record.event_type.as_str()),
        );
        complete(inner, &record, None).await;
        return;
    }

    match run_handlers(&record, &handlers).await {
        Ok(()) => complete(inner, &record, Some(attempt)).await,
        Err(err) => fail(inner, &record, attempt, err).await,
    }
}

/// Runs the handler chain for one attempt, applying the per-attempt
/// timeout when configured.
async fn run_handlers(
    record: &EventRecord,
    handlers: &[HandlerRef],
) -> Result<(), HandlerError> {
    let chain = async {
        for handler in handlers {
            run_one(handler, record).await?;
        }
        Ok(())
    };

    match record.timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, chain).await {
            Ok(res) => res,
            Err(_elapsed) => Err(HandlerError::Timeout { timeout: dur }),
        },
        None => chain.await,
    }
}

/// Runs a single handler, containing panics.
async fn run_one(handler: &HandlerRef, record: &EventRecord) -> Result<(), HandlerError> {
    match AssertUnwindSafe(handler.handle(record.clone()))
        .catch_unwind()
        .await
    {
        Ok(res) => res,
        Err(panic) => {
            warn!(handler = %handler.name(), "handler panicked");
            Err(HandlerError::Fail {
                error: panic_message(panic.as_ref()),
            })
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("handler panicked: {msg}")
    } else {
        "handler panicked".to_string()
    }
}

/// Marks the record completed and records its idempotency key.
///
/// `attempt` is the 1-based attempt that ran, or `None` when no handler
/// was invoked (zero handlers, idempotent duplicate) — in that case the
/// attempt counter is left untouched.
async fn complete(inner: &EngineInner, record: &EventRecord, attempt: Option<u32>) {
    let now = Instant::now();
    inner
        .store
        .update(&record.id, |r| {
            r.status = EventStatus::Completed;
            r.next_eligible_at = None;
            r.finished_at = Some(now);
        })
        .await;

    if let Some(key) = &record.idempotency_key {
        inner.idempotency.mark_completed(key.clone(), now).await;
    }

    let mut signal = Signal::now(SignalKind::Completed)
        .with_event(record.id)
        .with_event_type(record.event_type.as_str());
    if let Some(attempt) = attempt {
        signal = signal.with_attempt(attempt);
    }
    inner.bus.publish(signal);
}

/// Applies the retry policy to a failed attempt: re-queue with backoff,
/// or mark failed when the budget is exhausted (or the error is fatal).
async fn fail(inner: &EngineInner, record: &EventRecord, attempt: u32, err: HandlerError) {
    let now = Instant::now();

    if let HandlerError::Timeout { timeout } = &err {
        inner.bus.publish(
            Signal::now(SignalKind::TimeoutHit)
                .with_event(record.id)
                .with_event_type(record.event_type.as_str())
                .with_attempt(attempt)
                .with_delay(*timeout),
        );
    }

    let retryable = err.is_retryable() && record.retry.allows_retry(attempt);
    if retryable {
        let delay = record.retry.delay_for(attempt);
        inner
            .store
            .update(&record.id, |r| {
                r.attempts = attempt;
                r.last_error = Some(err.to_string());
                r.status = EventStatus::Pending;
                r.next_eligible_at = Some(now + delay);
            })
            .await;
        inner.bus.publish(
            Signal::now(SignalKind::RetryScheduled)
                .with_event(record.id)
                .with_event_type(record.event_type.as_str())
                .with_attempt(attempt)
                .with_delay(delay)
                .with_error(err.to_string()),
        );
    } else {
        inner
            .store
            .update(&record.id, |r| {
                r.attempts = attempt;
                r.last_error = Some(err.to_string());
                r.status = EventStatus::Failed;
                r.next_eligible_at = None;
                r.finished_at = Some(now);
            })
            .await;
        inner.bus.publish(
            Signal::now(SignalKind::Failed)
                .with_event(record.id)
                .with_event_type(record.event_type.as_str())
                .with_attempt(attempt)
                .with_error(err.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::Notify;

    use crate::core::test_util::wait_until;
    use crate::event::{EmitOptions, EventRecord, EventStatus};
    use crate::handler::HandlerFn;
    use crate::signals::SignalKind;
    use crate::{Backoff, Config, Engine, HandlerError, RetryPolicy};

    fn engine() -> Engine {
        Engine::new(Config::default())
    }

    fn fixed_retry(attempts: u32, interval_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: attempts,
            backoff: Backoff::Fixed,
            interval: Duration::from_millis(interval_ms),
            ..RetryPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_handlers_completes_trivially() {
        let engine = engine();
        let id = engine
            .emit("nobody.listens", json!({}), EmitOptions::default())
            .await
            .unwrap();

        assert!(
            wait_until(Duration::from_secs(5), || async {
                engine.get_event(&id).await.unwrap().status == EventStatus::Completed
            })
            .await
        );
        let record = engine.get_event(&id).await.unwrap();
        assert_eq!(record.attempts, 0);
        assert!(record.last_error.is_none());
        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_handlers_run_sequentially_and_first_error_aborts() {
        let engine = engine();
        let calls: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

        {
            let calls = calls.clone();
            engine
                .on(
                    "chain",
                    HandlerFn::arc("first", move |_event: EventRecord| {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Err::<(), _>(HandlerError::fatal("broken"))
                        }
                    }),
                )
                .await;
        }
        {
            let calls = calls.clone();
            engine
                .on(
                    "chain",
                    HandlerFn::arc("second", move |_event: EventRecord| {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(100, Ordering::SeqCst);
                            Ok::<_, HandlerError>(())
                        }
                    }),
                )
                .await;
        }

        let id = engine
            .emit("chain", json!({}), EmitOptions::default())
            .await
            .unwrap();
        assert!(
            wait_until(Duration::from_secs(5), || async {
                engine.get_event(&id).await.unwrap().status.is_terminal()
            })
            .await
        );

        // Only the first handler ran; the fatal error skipped the second.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            engine.get_event(&id).await.unwrap().status,
            EventStatus::Failed
        );
        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_marks_failed_at_max_attempts() {
        let engine = engine();
        engine
            .on(
                "doomed",
                HandlerFn::arc("always-fails", |_event: EventRecord| async move {
                    Err::<(), _>(HandlerError::fail("nope"))
                }),
            )
            .await;

        let id = engine
            .emit(
                "doomed",
                json!({}),
                EmitOptions::default().with_retry(fixed_retry(2, 1000)),
            )
            .await
            .unwrap();

        assert!(
            wait_until(Duration::from_secs(30), || async {
                engine.get_event(&id).await.unwrap().status == EventStatus::Failed
            })
            .await
        );
        let record = engine.get_event(&id).await.unwrap();
        assert_eq!(record.attempts, 2);
        assert_eq!(record.max_attempts, 2);
        assert!(record.last_error.as_deref().unwrap().contains("nope"));
        assert!(record.finished_at.is_some());
        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_backoff_gaps_double() {
        let engine = engine();
        let mut signals = engine.subscribe();
        engine
            .on(
                "doomed",
                HandlerFn::arc("always-fails", |_event: EventRecord| async move {
                    Err::<(), _>(HandlerError::fail("nope"))
                }),
            )
            .await;

        let retry = RetryPolicy {
            max_attempts: 4,
            backoff: Backoff::Exponential,
            interval: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        let id = engine
            .emit("doomed", json!({}), EmitOptions::default().with_retry(retry))
            .await
            .unwrap();

        assert!(
            wait_until(Duration::from_secs(30), || async {
                engine.get_event(&id).await.unwrap().status == EventStatus::Failed
            })
            .await
        );

        let mut delays = Vec::new();
        while let Ok(signal) = signals.try_recv() {
            if signal.kind == SignalKind::RetryScheduled {
                delays.push(signal.delay_ms.unwrap());
            }
        }
        // Attempts 1..=3 re-queue; the 4th is terminal.
        assert_eq!(delays, vec![100, 200, 400]);
        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_backoff_walk_matches_state_machine() {
        let engine = engine();
        let mut signals = engine.subscribe();
        engine
            .on(
                "doomed",
                HandlerFn::arc("always-fails", |_event: EventRecord| async move {
                    Err::<(), _>(HandlerError::fail("nope"))
                }),
            )
            .await;

        let id = engine
            .emit(
                "doomed",
                json!({}),
                EmitOptions::default().with_retry(fixed_retry(2, 1000)),
            )
            .await
            .unwrap();

        // First failure re-queues with the base interval.
        assert!(
            wait_until(Duration::from_secs(5), || async {
                engine.get_event(&id).await.unwrap().attempts == 1
            })
            .await
        );
        let record = engine.get_event(&id).await.unwrap();
        if record.status == EventStatus::Pending {
            assert!(record.next_eligible_at.is_some());
        }

        assert!(
            wait_until(Duration::from_secs(30), || async {
                engine.get_event(&id).await.unwrap().status == EventStatus::Failed
            })
            .await
        );
        assert_eq!(engine.get_event(&id).await.unwrap().attempts, 2);

        let mut kinds = Vec::new();
        while let Ok(signal) = signals.try_recv() {
            if signal.event == Some(id) {
                kinds.push(signal.kind);
            }
        }
        assert_eq!(
            kinds,
            vec![
                SignalKind::Emitted,
                SignalKind::DispatchStarted,
                SignalKind::RetryScheduled,
                SignalKind::DispatchStarted,
                SignalKind::Failed,
            ]
        );
        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idempotent_duplicate_completed_before_emit() {
        let engine = engine();
        let calls: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
        {
            let calls = calls.clone();
            engine
                .on(
                    "order.placed",
                    HandlerFn::arc("charge", move |_event: EventRecord| {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, HandlerError>(())
                        }
                    }),
                )
                .await;
        }

        let opts = EmitOptions::default().with_idempotency_key("order-1");
        let first = engine
            .emit("order.placed", json!({}), opts.clone())
            .await
            .unwrap();
        assert!(
            wait_until(Duration::from_secs(5), || async {
                engine.get_event(&first).await.unwrap().status == EventStatus::Completed
            })
            .await
        );

        // The duplicate gets an id but no record and no handler runs.
        let second = engine
            .emit("order.placed", json!({}), opts)
            .await
            .unwrap();
        assert!(engine.get_event(&second).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idempotent_duplicate_emitted_before_first_completes() {
        let engine = Engine::new(Config {
            max_concurrent: 1,
            ..Config::default()
        });
        let calls: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let running = Arc::new(Notify::new());
        {
            let calls = calls.clone();
            let gate = gate.clone();
            let running = running.clone();
            engine
                .on(
                    "order.placed",
                    HandlerFn::arc("charge", move |_event: EventRecord| {
                        let calls = calls.clone();
                        let gate = gate.clone();
                        let running = running.clone();
                        async move {
                            running.notify_one();
                            gate.notified().await;
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, HandlerError>(())
                        }
                    }),
                )
                .await;
        }

        let opts = EmitOptions::default().with_idempotency_key("order-2");
        let first = engine
            .emit("order.placed", json!({}), opts.clone())
            .await
            .unwrap();
        running.notified().await;

        // Key not completed yet, so the duplicate is appended as a record.
        let second = engine
            .emit("order.placed", json!({}), opts)
            .await
            .unwrap();
        assert!(engine.get_event(&second).await.is_some());

        gate.notify_one();
        assert!(
            wait_until(Duration::from_secs(5), || async {
                let a = engine.get_event(&first).await.unwrap().status;
                let b = engine.get_event(&second).await.unwrap().status;
                a == EventStatus::Completed && b == EventStatus::Completed
            })
            .await
        );

        // The duplicate completed without invoking the handler again.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.get_event(&second).await.unwrap().attempts, 0);
        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_retryable_failure() {
        let engine = engine();
        engine
            .on(
                "slow",
                HandlerFn::arc("sleeper", |_event: EventRecord| async move {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok::<_, HandlerError>(())
                }),
            )
            .await;

        let id = engine
            .emit(
                "slow",
                json!({}),
                EmitOptions::default()
                    .with_retry(fixed_retry(1, 10))
                    .with_timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap();

        assert!(
            wait_until(Duration::from_secs(30), || async {
                engine.get_event(&id).await.unwrap().status == EventStatus::Failed
            })
            .await
        );
        let record = engine.get_event(&id).await.unwrap();
        assert_eq!(record.attempts, 1);
        assert!(record.last_error.as_deref().unwrap().contains("timed out"));
        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_panic_is_contained() {
        let engine = engine();
        engine
            .on(
                "explosive",
                HandlerFn::arc("panicker", |event: EventRecord| async move {
                    assert!(event.payload["armed"].as_bool() == Some(false), "boom");
                    Ok::<_, HandlerError>(())
                }),
            )
            .await;

        let id = engine
            .emit(
                "explosive",
                json!({}),
                EmitOptions::default().with_retry(fixed_retry(1, 10)),
            )
            .await
            .unwrap();

        assert!(
            wait_until(Duration::from_secs(5), || async {
                engine.get_event(&id).await.unwrap().status == EventStatus::Failed
            })
            .await
        );
        let record = engine.get_event(&id).await.unwrap();
        assert!(record.last_error.as_deref().unwrap().contains("panicked"));
        engine.shutdown().await.unwrap();
    }
}
