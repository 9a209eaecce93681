//! Core types shared by the coordinator and the watcher.

mod command;
mod run;
mod status;

pub use command::{CancellationCommand, CANCELLED_BY_USER};
pub use run::{EngineRunRecord, RunId, StepRun, TenantId};
pub use status::RunStatus;
