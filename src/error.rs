//! Error types used by the conveyor engine and event handlers.
//!
//! This module defines three error enums:
//!
//! - [`EmitError`] — synchronous validation failures surfaced to the caller
//!   of [`Engine::emit`](crate::Engine::emit).
//! - [`HandlerError`] — failures raised by handler executions; these are
//!   never propagated to the emitter, only recorded on the event record.
//! - [`EngineError`] — errors raised by the engine runtime itself, such as
//!   a shutdown drain exceeding its grace period.
//!
//! All types provide `as_label` helpers for logging/metrics, and
//! [`HandlerError::is_retryable`] classifies failures for the retry policy.

use std::time::Duration;
use thiserror::Error;

use crate::event::EventId;

/// Validation errors returned synchronously by `emit`.
///
/// Emission is fire-and-forget: these are the *only* failures an emitter
/// ever sees. Everything downstream (handler failures, exhausted retries)
/// is inspectable asynchronously through the event record.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EmitError {
    /// The event type was empty; there is nothing to route on.
    #[error("event type must not be empty")]
    EmptyEventType,

    /// The retry policy allowed zero attempts; the event could never run.
    #[error("retry attempts must be at least 1")]
    ZeroAttempts,
}

impl EmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EmitError::EmptyEventType => "emit_empty_event_type",
            EmitError::ZeroAttempts => "emit_zero_attempts",
        }
    }
}

/// Failures raised during handler execution.
///
/// A failing handler aborts the remaining handlers for the current attempt.
/// Retryable failures re-queue the event with a backoff delay until its
/// attempt budget is exhausted; [`HandlerError::Fatal`] terminates the
/// event immediately.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Handler execution failed but may succeed if retried.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The attempt exceeded its configured timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable failure: the event is marked failed without
    /// consuming its remaining attempts.
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl HandlerError {
    /// Shorthand for a retryable failure.
    ///
    /// # Example
    /// ```
    /// use conveyor::HandlerError;
    ///
    /// let err = HandlerError::fail("connection refused");
    /// assert!(err.is_retryable());
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for a terminal failure.
    pub fn fatal(error: impl Into<String>) -> Self {
        HandlerError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Timeout { .. } => "handler_timeout",
            HandlerError::Fatal { .. } => "handler_fatal",
        }
    }

    /// Indicates whether the failure is safe to retry.
    ///
    /// Returns `true` for [`HandlerError::Fail`] and
    /// [`HandlerError::Timeout`], `false` for [`HandlerError::Fatal`].
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HandlerError::Fail { .. } | HandlerError::Timeout { .. }
        )
    }
}

/// Errors produced by the engine runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EngineError {
    /// Shutdown grace period was exceeded; some executions were still in
    /// flight and had to be aborted.
    #[error("shutdown grace {grace:?} exceeded; in flight: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of the events whose executions did not finish in time.
        stuck: Vec<EventId>,
    },
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::GraceExceeded { .. } => "engine_grace_exceeded",
        }
    }
}
