//! # Handler abstraction and function-backed implementation.
//!
//! This module defines the [`Handler`] trait and a convenient
//! function-backed implementation, [`HandlerFn`]. The common handle type
//! is [`HandlerRef`], an `Arc<dyn Handler>` suitable for sharing across
//! the runtime.
//!
//! Handlers receive a cloned snapshot of the event record; mutating it has
//! no effect on the engine's copy. All handlers registered for an event
//! type run sequentially in registration order, and the first failure
//! aborts the remaining handlers for that attempt.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::event::EventRecord;

/// Shared handle to a registered handler.
pub type HandlerRef = Arc<dyn Handler>;

/// # Asynchronous event handler.
///
/// A `Handler` has a stable [`name`](Handler::name) (used in logs and
/// signals) and an async [`handle`](Handler::handle) method invoked once
/// per execution attempt of a matching event.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use conveyor::{EventRecord, Handler, HandlerError};
///
/// struct SendWelcomeMail;
///
/// #[async_trait]
/// impl Handler for SendWelcomeMail {
///     fn name(&self) -> &str {
///         "send-welcome-mail"
///     }
///
///     async fn handle(&self, event: EventRecord) -> Result<(), HandlerError> {
///         let user = event.payload["user"].as_str()
///             .ok_or_else(|| HandlerError::fatal("payload missing user"))?;
///         // deliver the mail...
///         let _ = user;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Returns a stable, human-readable handler name.
    fn name(&self) -> &str;

    /// Processes one attempt of a matching event.
    ///
    /// Returning a retryable error ([`HandlerError::Fail`] or
    /// [`HandlerError::Timeout`]) re-queues the event per its retry
    /// policy; [`HandlerError::Fatal`] fails it immediately.
    async fn handle(&self, event: EventRecord) -> Result<(), HandlerError>;
}

/// Function-backed handler implementation.
///
/// Wraps a closure that creates a new future per invocation, so there is
/// no hidden shared mutable state between attempts. Use `Arc<...>`
/// explicitly inside the closure when attempts need to share state.
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    ///
    /// ## Example
    /// ```
    /// use conveyor::{EventRecord, HandlerError, HandlerFn, HandlerRef};
    ///
    /// let h: HandlerRef = HandlerFn::arc("audit-log", |event: EventRecord| async move {
    ///     println!("saw {} ({})", event.id, event.event_type);
    ///     Ok::<_, HandlerError>(())
    /// });
    /// assert_eq!(h.name(), "audit-log");
    /// ```
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(EventRecord) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: EventRecord) -> Result<(), HandlerError> {
        (self.f)(event).await
    }
}
