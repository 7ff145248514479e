//! # Example: retry_with_backoff
//!
//! Demonstrates how the engine re-drives a failing event according to its
//! per-emission [`RetryPolicy`].
//!
//! The handler fails twice before succeeding, showing the backoff delay
//! applied between attempts and the signal feed mirroring each step.
//!
//! ## Flow
//! ```text
//! emit("payment.capture")
//!   ├─► DispatchStarted attempt=1 → Err("boom #1")
//!   ├─► RetryScheduled delay=100ms
//!   ├─► DispatchStarted attempt=2 → Err("boom #2")
//!   ├─► RetryScheduled delay=200ms
//!   ├─► DispatchStarted attempt=3 → Ok
//!   └─► Completed
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example retry_with_backoff
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use conveyor::{
    Backoff, Config, EmitOptions, Engine, EventRecord, EventStatus, HandlerError, HandlerFn, RetryPolicy,
    SignalKind,
};
use serde_json::json;

static FAIL_COUNT: AtomicU32 = AtomicU32::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. Create the engine.
    let engine = Engine::new(Config::default());

    // 2. Watch the signal feed in the background.
    let mut signals = engine.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(signal) = signals.recv().await {
            match signal.kind {
                SignalKind::DispatchStarted => {
                    println!("[signal] attempt {:?}", signal.attempt);
                }
                SignalKind::RetryScheduled => {
                    println!(
                        "[signal] retry in {:?}ms after: {:?}",
                        signal.delay_ms, signal.error
                    );
                }
                SignalKind::Completed => {
                    println!("[signal] completed");
                    break;
                }
                _ => {}
            }
        }
    });

    // 3. A handler that fails twice before succeeding.
    engine
        .on(
            "payment.capture",
            HandlerFn::arc("flaky-capture", |_event: EventRecord| async move {
                let attempt = FAIL_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
                if attempt <= 2 {
                    println!("[flaky-capture] simulated failure #{attempt}");
                    Err(HandlerError::fail(format!("boom #{attempt}")))
                } else {
                    println!("[flaky-capture] success on attempt {attempt}");
                    Ok(())
                }
            }),
        )
        .await;

    // 4. Emit with an exponential policy: 100ms, then 200ms.
    let id = engine
        .emit(
            "payment.capture",
            json!({"amount_cents": 4200}),
            EmitOptions::default().with_retry(RetryPolicy {
                max_attempts: 5,
                backoff: Backoff::Exponential,
                interval: Duration::from_millis(100),
                ..RetryPolicy::default()
            }),
        )
        .await?;

    // 5. Wait for the walk to finish, then inspect the record.
    watcher.await?;
    let record = engine.get_event(&id).await.expect("record is retained");
    assert_eq!(record.status, EventStatus::Completed);
    println!("[main] {} completed after {} failed attempt(s)", id, record.attempts);

    engine.shutdown().await?;
    Ok(())
}
