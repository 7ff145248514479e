//! # Engine: the explicit event-processing instance.
//!
//! An [`Engine`] owns the event store, handler registry, idempotency
//! tracker, and signal bus, and runs one dispatcher task for its whole
//! life. There is no global instance: construct one, share it, shut it
//! down.
//!
//! ## High-level architecture
//! ```text
//! Producers                 Engine                        Handlers
//!   emit(type, payload, ──► EventStore.append()
//!        options)           wake.notify()
//!                              │
//!                              ▼
//!                        Dispatcher loop ── selection (sort + eligibility
//!                              │             + in-flight guard)
//!                              │  semaphore permit (max_concurrent)
//!                              ▼
//!                        Execution unit ────► handler 1 → handler 2 → ...
//!                              │                (sequential, first error
//!                              │                 aborts the attempt)
//!                              ▼
//!                        store update: completed | pending+backoff | failed
//!                        idempotency mark on completion
//!                        wake.notify()  (dispatcher re-enters)
//!
//! Observability: every transition publishes a Signal on the broadcast
//! bus; `stats()` derives status counts from a store snapshot.
//! ```
//!
//! ## Lifecycle
//! - [`Engine::new`] spawns the dispatcher immediately (requires a Tokio
//!   runtime).
//! - [`Engine::shutdown`] cancels the dispatcher, waits up to
//!   [`Config::grace`] for in-flight executions, then aborts stragglers
//!   and reports them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::core::dispatcher::Dispatcher;
use crate::error::{EmitError, EngineError};
use crate::event::{EmitOptions, EventId, EventRecord, EventStatus};
use crate::handler::HandlerRef;
use crate::idempotency::IdempotencyTracker;
use crate::registry::HandlerRegistry;
use crate::signals::{Signal, SignalBus, SignalKind};
use crate::stats::EventStats;
use crate::store::EventStore;

/// Components and shared state behind an [`Engine`].
///
/// The in-flight set is the dispatch guard: an id is inserted before its
/// execution task is spawned and removed when that task finishes, so no
/// record is ever owned by two execution units.
pub(crate) struct EngineInner {
    pub(crate) cfg: Config,
    pub(crate) store: EventStore,
    pub(crate) registry: HandlerRegistry,
    pub(crate) idempotency: IdempotencyTracker,
    pub(crate) bus: SignalBus,
    /// Wakes the dispatcher on emit and on each execution completion.
    pub(crate) wake: Notify,
    /// Optional global execution cap (`None` = unlimited).
    pub(crate) semaphore: Option<Arc<Semaphore>>,
    in_flight: Mutex<HashSet<EventId>>,
}

impl EngineInner {
    /// Inserts `id` into the in-flight set. Returns `false` when the id
    /// was already claimed.
    pub(crate) fn claim_in_flight(&self, id: EventId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    /// Removes `id` from the in-flight set.
    pub(crate) fn release_in_flight(&self, id: &EventId) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Returns `true` while `id` is owned by an execution unit.
    pub(crate) fn is_in_flight(&self, id: &EventId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// Number of executions currently in flight.
    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Snapshot of the in-flight ids (for shutdown reporting).
    pub(crate) fn in_flight_snapshot(&self) -> Vec<EventId> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}

/// In-process asynchronous event-processing engine.
///
/// ## Example
/// ```
/// use conveyor::{Config, EmitOptions, Engine, EventRecord, HandlerError, HandlerFn};
/// use serde_json::json;
/// use std::time::Duration;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = Engine::new(Config::default());
///
///     engine
///         .on(
///             "user.created",
///             HandlerFn::arc("greeter", |event: EventRecord| async move {
///                 println!("welcome, {}", event.payload["name"]);
///                 Ok::<_, HandlerError>(())
///             }),
///         )
///         .await;
///
///     let id = engine
///         .emit("user.created", json!({"name": "ada"}), EmitOptions::default())
///         .await?;
///
///     tokio::time::sleep(Duration::from_millis(200)).await;
///     let record = engine.get_event(&id).await.expect("record is retained");
///     println!("{} is now {:?}", record.id, record.status);
///
///     engine.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct Engine {
    inner: Arc<EngineInner>,
    token: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<Result<(), EngineError>>>>,
}

impl Engine {
    /// Creates an engine with freshly-constructed components and starts
    /// its dispatcher.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(cfg: Config) -> Self {
        Self::with_components(
            cfg,
            EventStore::new(),
            HandlerRegistry::new(),
            IdempotencyTracker::new(),
        )
    }

    /// Creates an engine around caller-provided components.
    ///
    /// Useful for pre-registering handlers or sharing a registry across
    /// construction sites; the engine takes ownership either way.
    pub fn with_components(
        cfg: Config,
        store: EventStore,
        registry: HandlerRegistry,
        idempotency: IdempotencyTracker,
    ) -> Self {
        let bus = SignalBus::new(cfg.bus_capacity_clamped());
        let semaphore = cfg
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));
        let inner = Arc::new(EngineInner {
            cfg,
            store,
            registry,
            idempotency,
            bus,
            wake: Notify::new(),
            semaphore,
            in_flight: Mutex::new(HashSet::new()),
        });

        let token = CancellationToken::new();
        let dispatcher = Dispatcher::new(Arc::clone(&inner), token.clone());
        let handle = tokio::spawn(dispatcher.run());

        Self {
            inner,
            token,
            dispatcher: Mutex::new(Some(handle)),
        }
    }

    /// Registers a handler for an event type.
    ///
    /// Handlers run in registration order; duplicates are allowed and all
    /// run. Registration takes effect for every later-selected event,
    /// including ones already pending.
    pub async fn on(&self, event_type: impl Into<String>, handler: HandlerRef) {
        self.inner.registry.register(event_type, handler).await;
    }

    /// Submits an event for asynchronous processing.
    ///
    /// Returns as soon as the record is appended; processing happens in
    /// the background. The only failures surfaced here are malformed
    /// options — handler failures are recorded on the event record and
    /// never reach the emitter.
    ///
    /// When `options.idempotency_key` names a key that already completed,
    /// no record is appended and no handler will run; a fresh id is still
    /// returned.
    pub async fn emit(
        &self,
        event_type: impl Into<String>,
        payload: Value,
        options: EmitOptions,
    ) -> Result<EventId, EmitError> {
        let event_type = event_type.into();
        if event_type.is_empty() {
            return Err(EmitError::EmptyEventType);
        }
        if options.retry.max_attempts == 0 {
            return Err(EmitError::ZeroAttempts);
        }

        let id = EventId::generate();

        if let Some(key) = &options.idempotency_key {
            if self.inner.idempotency.has_completed(key).await {
                debug!(event = %id, key = %key, "idempotency key already completed; skipping");
                self.inner.bus.publish(
                    Signal::now(SignalKind::IdempotentSkip)
                        .with_event(id)
                        .with_event_type(event_type),
                );
                return Ok(id);
            }
        }

        let now = Instant::now();
        let record = EventRecord {
            id,
            event_type: event_type.clone(),
            payload,
            created_at: now,
            priority: options.priority,
            status: EventStatus::Pending,
            attempts: 0,
            max_attempts: options.retry.max_attempts,
            next_eligible_at: (options.delay > Duration::ZERO).then(|| now + options.delay),
            last_error: None,
            idempotency_key: options.idempotency_key,
            finished_at: None,
            retry: options.retry,
            timeout: options.timeout.or_else(|| self.inner.cfg.default_timeout()),
        };

        self.inner.store.append(record).await;
        self.inner.bus.publish(
            Signal::now(SignalKind::Emitted)
                .with_event(id)
                .with_event_type(event_type),
        );
        self.inner.wake.notify_one();
        Ok(id)
    }

    /// Returns a snapshot of the record with the given id.
    pub async fn get_event(&self, id: &EventId) -> Option<EventRecord> {
        self.inner.store.get(id).await
    }

    /// Returns a snapshot of all retained records, in dispatch order.
    pub async fn all_events(&self) -> Vec<EventRecord> {
        self.inner.store.snapshot().await
    }

    /// Counts of retained records by status (the metrics surface).
    pub async fn stats(&self) -> EventStats {
        EventStats::from_records(&self.inner.store.snapshot().await)
    }

    /// Subscribes to the engine's lifecycle signal feed.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.inner.bus.subscribe()
    }

    /// Stops the dispatcher and drains in-flight executions.
    ///
    /// Waits up to [`Config::grace`]; executions still running after that
    /// are aborted and reported via [`EngineError::GraceExceeded`].
    /// Subsequent calls return `Ok(())`.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let handle = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        self.inner
            .bus
            .publish(Signal::now(SignalKind::ShutdownRequested));
        self.token.cancel();
        self.inner.wake.notify_one();

        match handle {
            Some(handle) => handle.await.unwrap_or(Ok(())),
            None => Ok(()),
        }
    }
}
