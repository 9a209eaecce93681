//! Result of a successful cancellation request.

use crate::core::{CancellationCommand, RunStatus, StepRun};
use crate::watcher::Convergence;

/// A cancellation that was requested.
///
/// "Requested" is all this guarantees. The run may still be pending or
/// running if the worker had not acted by the end of the watch window,
/// and it may have finished some other way in the meantime.
#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    /// The command that was published.
    pub command: CancellationCommand,
    /// What the watcher observed afterwards.
    pub convergence: Convergence,
}

impl CancellationOutcome {
    /// The final observed snapshot.
    #[must_use]
    pub const fn run(&self) -> &StepRun {
        &self.convergence.run
    }

    /// The final observed status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.convergence.run.status
    }

    /// True if the run was observed as cancelled.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status() == RunStatus::Cancelled
    }

    /// True if any status change was observed.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.convergence.converged
    }
}
