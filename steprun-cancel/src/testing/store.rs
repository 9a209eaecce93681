//! In-memory run store implementing every read port.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::{EngineRunRecord, RunId, RunStatus, StepRun, TenantId};
use crate::errors::StoreError;
use crate::ports::{EngineRunRepository, RunResolver, RunStatusReader};

#[derive(Debug, Clone, Copy)]
enum Trigger {
    AfterReads(usize),
    At(Duration),
}

#[derive(Debug, Clone, Copy)]
struct ScheduledTransition {
    trigger: Trigger,
    status: RunStatus,
}

#[derive(Debug)]
struct StoredRun {
    run: StepRun,
    worker_id: Option<String>,
    job_run_id: Uuid,
    step_id: Uuid,
    scheduled: Vec<ScheduledTransition>,
    status_reads: usize,
    engine_reads: usize,
    transitions: usize,
    status_error: Option<StoreError>,
    engine_error: Option<StoreError>,
    resolve_error: Option<StoreError>,
}

impl StoredRun {
    fn new(run: StepRun, worker_id: Option<String>) -> Self {
        Self {
            run,
            worker_id,
            job_run_id: Uuid::new_v4(),
            step_id: Uuid::new_v4(),
            scheduled: Vec::new(),
            status_reads: 0,
            engine_reads: 0,
            transitions: 0,
            status_error: None,
            engine_error: None,
            resolve_error: None,
        }
    }

    fn apply(&mut self, status: RunStatus) -> bool {
        if self.run.status == status || !self.run.status.can_transition_to(status) {
            return false;
        }
        self.run.status = status;
        self.run.updated_at = Utc::now();
        self.transitions += 1;
        true
    }

    fn apply_due(&mut self, now: Duration) {
        let reads = self.status_reads;
        let (due, pending): (Vec<_>, Vec<_>) =
            self.scheduled.iter().copied().partition(|t| match t.trigger {
                Trigger::AfterReads(n) => reads >= n,
                Trigger::At(at) => now >= at,
            });
        self.scheduled = pending;
        for transition in due {
            self.apply(transition.status);
        }
    }
}

/// A run store held in memory.
///
/// Workers are simulated by scheduling transitions, either after a
/// number of status reads or at an offset from the store's creation.
/// Offsets are measured with `tokio::time`, so they follow paused time
/// in tests.
pub struct InMemoryRunStore {
    runs: DashMap<RunId, StoredRun>,
    created: Instant,
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self {
            runs: DashMap::new(),
            created: Instant::now(),
        }
    }
}

impl InMemoryRunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an unclaimed run.
    pub fn insert(&self, run: StepRun) {
        self.runs.insert(run.id, StoredRun::new(run, None));
    }

    /// Inserts a run claimed by `worker_id`.
    pub fn insert_claimed(&self, run: StepRun, worker_id: impl Into<String>) {
        self.runs
            .insert(run.id, StoredRun::new(run, Some(worker_id.into())));
    }

    /// Current record, without counting as a read.
    #[must_use]
    pub fn get(&self, run_id: RunId) -> Option<StepRun> {
        self.runs.get(&run_id).map(|stored| stored.run.clone())
    }

    /// Writes a status the way a worker would. Returns false if the
    /// transition is illegal or a no-op.
    pub fn set_status(&self, run_id: RunId, status: RunStatus) -> Result<bool, StoreError> {
        let mut stored = self.runs.get_mut(&run_id).ok_or(StoreError::NotFound)?;
        Ok(stored.apply(status))
    }

    /// Applies `status` once the run has been read `reads` times through
    /// [`RunStatusReader`].
    pub fn transition_after_reads(&self, run_id: RunId, reads: usize, status: RunStatus) {
        self.schedule(run_id, Trigger::AfterReads(reads), status);
    }

    /// Applies `status` on the first status read at least `at` after the
    /// store was created.
    pub fn transition_at(&self, run_id: RunId, at: Duration, status: RunStatus) {
        self.schedule(run_id, Trigger::At(at), status);
    }

    fn schedule(&self, run_id: RunId, trigger: Trigger, status: RunStatus) {
        if let Some(mut stored) = self.runs.get_mut(&run_id) {
            stored.scheduled.push(ScheduledTransition { trigger, status });
        }
    }

    /// Makes every status read of `run_id` fail.
    pub fn fail_status_reads(&self, run_id: RunId, error: StoreError) {
        if let Some(mut stored) = self.runs.get_mut(&run_id) {
            stored.status_error = Some(error);
        }
    }

    /// Makes every engine lookup of `run_id` fail.
    pub fn fail_engine_lookups(&self, run_id: RunId, error: StoreError) {
        if let Some(mut stored) = self.runs.get_mut(&run_id) {
            stored.engine_error = Some(error);
        }
    }

    /// Makes every resolve of `run_id` fail.
    pub fn fail_resolves(&self, run_id: RunId, error: StoreError) {
        if let Some(mut stored) = self.runs.get_mut(&run_id) {
            stored.resolve_error = Some(error);
        }
    }

    /// Number of status reads served for `run_id`.
    #[must_use]
    pub fn status_reads(&self, run_id: RunId) -> usize {
        self.runs.get(&run_id).map_or(0, |stored| stored.status_reads)
    }

    /// Number of engine lookups served for `run_id`.
    #[must_use]
    pub fn engine_reads(&self, run_id: RunId) -> usize {
        self.runs.get(&run_id).map_or(0, |stored| stored.engine_reads)
    }

    /// Number of status changes applied to `run_id`.
    #[must_use]
    pub fn transition_count(&self, run_id: RunId) -> usize {
        self.runs.get(&run_id).map_or(0, |stored| stored.transitions)
    }
}

impl std::fmt::Debug for InMemoryRunStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRunStore")
            .field("runs", &self.runs.len())
            .finish()
    }
}

#[async_trait]
impl RunResolver for InMemoryRunStore {
    async fn resolve_run(
        &self,
        tenant_id: TenantId,
        run_id: RunId,
    ) -> Result<Option<StepRun>, StoreError> {
        let Some(stored) = self.runs.get(&run_id) else {
            return Ok(None);
        };
        if let Some(err) = &stored.resolve_error {
            return Err(err.clone());
        }
        Ok((stored.run.tenant_id == tenant_id).then(|| stored.run.clone()))
    }
}

#[async_trait]
impl EngineRunRepository for InMemoryRunStore {
    async fn get_run_for_execution(
        &self,
        tenant_id: TenantId,
        run_id: RunId,
    ) -> Result<EngineRunRecord, StoreError> {
        let mut stored = self.runs.get_mut(&run_id).ok_or(StoreError::NotFound)?;
        stored.engine_reads += 1;
        if let Some(err) = &stored.engine_error {
            return Err(err.clone());
        }
        if stored.run.tenant_id != tenant_id {
            return Err(StoreError::NotFound);
        }
        Ok(EngineRunRecord {
            run_id,
            tenant_id,
            status: stored.run.status,
            worker_id: stored.worker_id.clone(),
            dispatcher_id: stored.worker_id.as_ref().map(|_| "dispatcher-0".to_string()),
            job_run_id: stored.job_run_id,
            step_id: stored.step_id,
        })
    }
}

#[async_trait]
impl RunStatusReader for InMemoryRunStore {
    async fn get_run_status(&self, run_id: RunId) -> Result<StepRun, StoreError> {
        let now = self.created.elapsed();
        let mut stored = self.runs.get_mut(&run_id).ok_or(StoreError::NotFound)?;
        stored.status_reads += 1;
        if let Some(err) = &stored.status_error {
            return Err(err.clone());
        }
        stored.apply_due(now);
        Ok(stored.run.clone())
    }
}
