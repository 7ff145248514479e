//! # conveyor
//!
//! **Conveyor** is an in-process asynchronous event-processing engine for
//! Rust.
//!
//! Producers submit typed events with priority, delay, retry, and
//! idempotency metadata; the engine orders them, dispatches them through
//! registered handlers with bounded concurrency, and re-drives failures
//! with backoff until they succeed or exhaust their attempt budget.
//!
//! ## Architecture
//! ```text
//!  emit(type, payload, opts)         on(type, handler)
//!          │                               │
//!          ▼                               ▼
//! ┌────────────────────┐        ┌───────────────────────┐
//! │     EventStore     │        │    HandlerRegistry    │
//! │ (records, statuses)│        │ (type → ordered list) │
//! └─────────┬──────────┘        └──────────┬────────────┘
//!           │  wake                        │
//!           ▼                              │
//! ┌───────────────────────────────────────────────────────────┐
//! │  Dispatcher (one long-lived loop per engine)              │
//! │  - sorted selection: pending, window elapsed, not in      │
//! │    flight                                                 │
//! │  - semaphore permit caps concurrent executions            │
//! │  - sleeps until the earliest delayed event, or a wake     │
//! │  - idle: retention sweep (store + idempotency keys)       │
//! └───────┬───────────────────┬───────────────────┬───────────┘
//!         ▼                   ▼                   ▼
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ Execution #1 │    │ Execution #2 │    │ Execution #N │
//! │ (handlers in │    │              │    │              │
//! │  order, stop │    │              │    │              │
//! │  on error)   │    │              │    │              │
//! └──────┬───────┘    └──────┬───────┘    └──────┬───────┘
//!        │ completed / pending+backoff / failed  │
//!        ▼                   ▼                   ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │ EventStore updates + IdempotencyTracker marks + Signal    │
//! │ bus (Emitted, DispatchStarted, Completed, RetryScheduled, │
//! │ Failed, Pruned, ...)                                      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle of one event
//! ```text
//! emit ──► pending ──► processing ──► completed
//!             ▲             │
//!             │   retryable failure, attempts < max:
//!             └── pending, next_eligible_at = now + backoff(attempts)
//!                           │
//!                           └──► failed   (attempts exhausted or fatal)
//! ```
//!
//! ## Guarantees
//! | Area            | Behavior                                                                 |
//! |-----------------|--------------------------------------------------------------------------|
//! | **Ordering**    | Per pass: ready-before-delayed, then priority (high > medium > low), then earliest creation. |
//! | **Delay**       | An event emitted with a delay is never selected before it elapses.       |
//! | **Concurrency** | At most `max_concurrent` executions at any instant; one owner per record. |
//! | **Retry**       | Fixed or exponential backoff per emission; `failed` after `max_attempts`. |
//! | **Idempotency** | A key that completed suppresses handlers for every later emission with it. |
//! | **Failure**     | Handler errors never reach the emitter; inspect the record or signals.   |
//!
//! Events are memory-resident: state is lost on restart, and delivery is
//! de-duplicated rather than exactly-once to the outside world.
//!
//! ## Example
//! ```rust
//! use conveyor::{Config, EmitOptions, Engine, EventRecord, HandlerError, HandlerFn, Priority};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(Config::default());
//!
//!     engine
//!         .on(
//!             "invoice.created",
//!             HandlerFn::arc("send-invoice-mail", |event: EventRecord| async move {
//!                 if event.payload["total"].as_i64().unwrap_or(0) < 0 {
//!                     return Err(HandlerError::fatal("negative total"));
//!                 }
//!                 // deliver the mail...
//!                 Ok(())
//!             }),
//!         )
//!         .await;
//!
//!     let id = engine
//!         .emit(
//!             "invoice.created",
//!             json!({"total": 4200}),
//!             EmitOptions::default().with_priority(Priority::High),
//!         )
//!         .await?;
//!
//!     tokio::time::sleep(Duration::from_millis(200)).await;
//!     let record = engine.get_event(&id).await.expect("record is retained");
//!     println!("{} → {:?} after {} attempt(s)", id, record.status, record.attempts);
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod event;
mod handler;
mod idempotency;
mod policies;
mod registry;
mod signals;
mod stats;
mod store;

// ---- Public re-exports ----

pub use config::Config;
pub use core::Engine;
pub use error::{EmitError, EngineError, HandlerError};
pub use event::{EmitOptions, EventId, EventRecord, EventStatus, Priority};
pub use handler::{Handler, HandlerFn, HandlerRef};
pub use idempotency::IdempotencyTracker;
pub use policies::{Backoff, JitterPolicy, RetryPolicy};
pub use registry::HandlerRegistry;
pub use signals::{Signal, SignalBus, SignalKind};
pub use stats::EventStats;
pub use store::EventStore;
