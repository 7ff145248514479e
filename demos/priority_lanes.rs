//! # Example: priority_lanes
//!
//! Emits a burst of mixed-priority events against a single execution slot
//! and prints the order the engine selects them in: high before medium
//! before low, regardless of emission order.
//!
//! ## Run
//! ```bash
//! cargo run --example priority_lanes
//! ```

use std::time::Duration;

use conveyor::{Config, EmitOptions, Engine, EventRecord, HandlerError, HandlerFn, Priority};
use serde_json::json;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. One execution slot, so selection order is visible.
    let engine = Engine::new(Config {
        max_concurrent: 1,
        ..Config::default()
    });

    engine
        .on(
            "report.render",
            HandlerFn::arc("renderer", |event: EventRecord| async move {
                println!(
                    "[renderer] {} ({:?})",
                    event.payload["name"], event.priority
                );
                // Simulate a little work so the queue stays occupied.
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, HandlerError>(())
            }),
        )
        .await;

    // 2. Occupy the single slot so the next emissions queue up behind it.
    engine
        .emit(
            "report.render",
            json!({"name": "warmup"}),
            EmitOptions::default(),
        )
        .await?;
    tokio::time::sleep(Duration::from_millis(5)).await;

    // 3. Emit low first, high last: selection still runs high → low.
    for (name, priority) in [
        ("nightly-batch", Priority::Low),
        ("weekly-digest", Priority::Medium),
        ("incident-page", Priority::High),
    ] {
        engine
            .emit(
                "report.render",
                json!({"name": name}),
                EmitOptions::default().with_priority(priority),
            )
            .await?;
    }

    // 4. Let the queue drain, then show the final counts.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let stats = engine.stats().await;
    println!("[main] completed={} failed={}", stats.completed, stats.failed);

    engine.shutdown().await?;
    Ok(())
}
