//! # Steprun Cancel
//!
//! Cancellation coordination for step runs executed by remote workers.
//!
//! The control plane that receives a cancel request cannot stop the work
//! itself. This crate provides:
//!
//! - **Cancellability checks**: only pending or running runs accept a request
//! - **Command dispatch**: one at-least-once command toward the owning worker
//! - **Bounded convergence**: a short, fixed poll of the run store to report
//!   what happened, without ever blocking indefinitely
//! - **Boundary mapping**: rejections and internal failures as API responses
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use steprun_cancel::prelude::*;
//!
//! let coordinator = CancellationCoordinator::new(
//!     CancellationPorts::from_store(store, channel),
//!     CancellationConfig::from_env()?,
//! );
//!
//! let response = CancelResponse::from(
//!     coordinator.cancel_by_id(tenant_id, run_id, "user request").await,
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod boundary;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod ports;
pub mod testing;
pub mod watcher;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::boundary::{ApiErrors, CancelResponse, StepRunView};
    pub use crate::config::{CancellationConfig, ConfigError};
    pub use crate::coordinator::{CancellationCoordinator, CancellationOutcome};
    pub use crate::core::{
        CancellationCommand, EngineRunRecord, RunId, RunStatus, StepRun, TenantId,
        CANCELLED_BY_USER,
    };
    pub use crate::errors::{CancellationError, PublishError, StoreError};
    pub use crate::events::{EventSink, LoggingEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::ports::{
        CancellationPorts, CommandChannel, EngineRunRepository, RunResolver, RunStatusReader,
    };
    pub use crate::watcher::{Convergence, ConvergenceWatcher, WatchConfig};
}
