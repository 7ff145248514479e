//! # Engine observability: lifecycle signals and the broadcast bus.
//!
//! This module groups the signal **data model** and the **bus** used to
//! publish/subscribe to signals emitted by the engine, dispatcher, and
//! execution units.
//!
//! The metrics/dashboard collaborator consumes this feed (together with
//! [`EventStats`](crate::EventStats)) rather than polling records.

mod bus;
mod signal;

pub use bus::SignalBus;
pub use signal::{Signal, SignalKind};
