//! # Example: idempotent_emit
//!
//! Emits the same logical event twice with one idempotency key. The first
//! emission runs its handler; once it completes, the second is a no-op
//! that still hands back an event id.
//!
//! ## Run
//! ```bash
//! cargo run --example idempotent_emit
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use conveyor::{Config, EmitOptions, Engine, EventRecord, HandlerError, HandlerFn};
use serde_json::json;

static CHARGES: AtomicU32 = AtomicU32::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::new(Config::default());

    engine
        .on(
            "order.placed",
            HandlerFn::arc("charge-card", |event: EventRecord| async move {
                let n = CHARGES.fetch_add(1, Ordering::Relaxed) + 1;
                println!("[charge-card] charge #{n} for order {}", event.payload["order"]);
                Ok::<_, HandlerError>(())
            }),
        )
        .await;

    let opts = EmitOptions::default().with_idempotency_key("order-1177");

    // 1. First emission: charges the card.
    let first = engine
        .emit("order.placed", json!({"order": 1177}), opts.clone())
        .await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // 2. Second emission with the same key: no handler runs, but the
    //    caller still gets an id back.
    let second = engine
        .emit("order.placed", json!({"order": 1177}), opts)
        .await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!(
        "[main] first={first} second={second} charges={}",
        CHARGES.load(Ordering::Relaxed)
    );
    assert_eq!(CHARGES.load(Ordering::Relaxed), 1);
    assert!(engine.get_event(&second).await.is_none());

    engine.shutdown().await?;
    Ok(())
}
