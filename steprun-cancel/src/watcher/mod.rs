//! Bounded observation of a run after a command has been dispatched.
//!
//! The watcher re-reads the run on a fixed cadence until its status
//! differs from the baseline or the attempt budget is spent. It is a
//! best-effort window: a worker that is slow or unavailable will not be
//! observed, and the caller gets the last snapshot it saw.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument};

use crate::core::{RunId, StepRun, TenantId};
use crate::errors::{CancellationError, StoreError};
use crate::ports::RunStatusReader;

/// Poll cadence and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Delay before each read.
    pub poll_interval: Duration,
    /// Maximum number of reads.
    pub max_attempts: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_attempts: 5,
        }
    }
}

impl WatchConfig {
    /// Creates the default config (100ms, 5 attempts).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum number of reads.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Upper bound on the time spent sleeping.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.poll_interval
            .saturating_mul(u32::try_from(self.max_attempts).unwrap_or(u32::MAX))
    }
}

/// What the watcher saw.
#[derive(Debug, Clone, PartialEq)]
pub struct Convergence {
    /// Most recently observed snapshot, or the baseline if nothing was read.
    pub run: StepRun,
    /// Number of reads performed.
    pub attempts: usize,
    /// True if a status different from the baseline was observed.
    pub converged: bool,
    /// Time spent watching.
    pub elapsed: Duration,
}

/// Polls the run store until the run's status moves off the baseline.
#[derive(Clone)]
pub struct ConvergenceWatcher {
    reader: Arc<dyn RunStatusReader>,
    config: WatchConfig,
}

impl ConvergenceWatcher {
    /// Creates a watcher. Sleeps go through `tokio::time`, so a runtime
    /// with paused time drives the loop without real delays.
    #[must_use]
    pub fn new(reader: Arc<dyn RunStatusReader>, config: WatchConfig) -> Self {
        Self { reader, config }
    }

    /// Returns the config.
    #[must_use]
    pub const fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Waits for the run's status to differ from `baseline`.
    ///
    /// Not reaching convergence is not an error; inspect
    /// [`Convergence::converged`]. Any read error aborts the wait.
    #[instrument(skip_all, fields(run_id = %run_id, baseline = %baseline.status))]
    pub async fn await_convergence(
        &self,
        tenant_id: TenantId,
        run_id: RunId,
        baseline: &StepRun,
    ) -> Result<Convergence, CancellationError> {
        let started = Instant::now();
        let mut latest = baseline.clone();
        let mut attempts = 0;

        while attempts < self.config.max_attempts {
            sleep(self.config.poll_interval).await;
            attempts += 1;

            let observed = self
                .reader
                .get_run_status(run_id)
                .await
                .map_err(|source| CancellationError::lookup("get_run_status", run_id, source))?;

            if observed.tenant_id != tenant_id {
                return Err(CancellationError::lookup(
                    "get_run_status",
                    run_id,
                    StoreError::ForeignRecord,
                ));
            }

            if baseline.status_differs(&observed) {
                debug!(attempt = attempts, status = %observed.status, "Run status changed");
                return Ok(Convergence {
                    run: observed,
                    attempts,
                    converged: true,
                    elapsed: started.elapsed(),
                });
            }

            debug!(attempt = attempts, "Run status unchanged");
            latest = observed;
        }

        Ok(Convergence {
            run: latest,
            attempts,
            converged: false,
            elapsed: started.elapsed(),
        })
    }
}

impl std::fmt::Debug for ConvergenceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvergenceWatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
