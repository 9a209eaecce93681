//! Event sink system for observability.
//!
//! The coordinator reports each request's lifecycle through an
//! [`EventSink`]; event types are the constants below.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink};

/// The request was refused (unknown run, other tenant, or not
/// cancellable); nothing was published.
pub const CANCELLATION_REJECTED: &str = "cancellation.rejected";
/// A command was accepted by the channel.
pub const CANCELLATION_DISPATCHED: &str = "cancellation.dispatched";
/// The run's status changed within the watch window.
pub const CANCELLATION_CONVERGED: &str = "cancellation.converged";
/// The watch window closed with the status unchanged.
pub const CANCELLATION_UNCONFIRMED: &str = "cancellation.unconfirmed";
/// The request failed internally.
pub const CANCELLATION_FAILED: &str = "cancellation.failed";
