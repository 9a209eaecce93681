//! Turns a synchronous cancel request into an asynchronous command.
//!
//! The coordinator never writes run state. It checks that the run can be
//! cancelled, publishes one command toward the owning worker, and then
//! hands over to the [`ConvergenceWatcher`] to report what the store
//! shows afterwards. Concurrent requests for the same run are allowed;
//! duplicates reach the worker, which applies them idempotently.

mod outcome;

pub use outcome::CancellationOutcome;

use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::CancellationConfig;
use crate::core::{CancellationCommand, RunId, StepRun, TenantId};
use crate::errors::CancellationError;
use crate::events::{
    EventSink, LoggingEventSink, CANCELLATION_CONVERGED, CANCELLATION_DISPATCHED,
    CANCELLATION_FAILED, CANCELLATION_REJECTED, CANCELLATION_UNCONFIRMED,
};
use crate::ports::CancellationPorts;
use crate::watcher::ConvergenceWatcher;

/// Coordinates cancellation of step runs.
pub struct CancellationCoordinator {
    ports: CancellationPorts,
    config: CancellationConfig,
    events: Arc<dyn EventSink>,
}

impl CancellationCoordinator {
    /// Creates a coordinator whose events go to a debug-level
    /// [`LoggingEventSink`].
    #[must_use]
    pub fn new(ports: CancellationPorts, config: CancellationConfig) -> Self {
        Self {
            ports,
            config,
            events: Arc::new(LoggingEventSink::default()),
        }
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the config.
    #[must_use]
    pub const fn config(&self) -> &CancellationConfig {
        &self.config
    }

    fn watcher(&self) -> ConvergenceWatcher {
        ConvergenceWatcher::new(self.ports.status_reader.clone(), self.config.watch())
    }

    /// Resolves `run_id` within the tenant, then requests its cancellation.
    #[instrument(skip_all, fields(run_id = %run_id))]
    pub async fn cancel_by_id(
        &self,
        tenant_id: TenantId,
        run_id: RunId,
        detail: &str,
    ) -> Result<CancellationOutcome, CancellationError> {
        let run = match self.ports.resolver.resolve_run(tenant_id, run_id).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                return Err(self
                    .rejected(CancellationError::RunNotFound { run_id })
                    .await)
            }
            Err(source) => {
                return Err(self
                    .failed(CancellationError::lookup("resolve_run", run_id, source))
                    .await)
            }
        };
        self.request_cancellation(tenant_id, &run, detail).await
    }

    /// Requests cancellation of an already resolved run.
    ///
    /// The cancellability check uses `run` as given; the store is not read
    /// again before deciding. On success exactly one command has been
    /// published. `detail` is free text carried alongside the reason code.
    #[instrument(skip_all, fields(run_id = %run.id, status = %run.status))]
    pub async fn request_cancellation(
        &self,
        tenant_id: TenantId,
        run: &StepRun,
        detail: &str,
    ) -> Result<CancellationOutcome, CancellationError> {
        if run.tenant_id != tenant_id {
            return Err(self
                .rejected(CancellationError::TenantMismatch { run_id: run.id })
                .await);
        }

        if !run.status.is_cancellable() {
            return Err(self
                .rejected(CancellationError::NotCancellable {
                    run_id: run.id,
                    status: run.status,
                })
                .await);
        }

        let record = match self.ports.engine.get_run_for_execution(tenant_id, run.id).await {
            Ok(record) => record,
            Err(source) => {
                return Err(self
                    .failed(CancellationError::lookup("get_run_for_execution", run.id, source))
                    .await)
            }
        };

        let command = CancellationCommand::for_record(
            &record,
            self.config.reason.as_str(),
            self.config.propagate_to_children,
        )
        .with_detail(detail);

        if let Err(source) = self.ports.channel.publish(&self.config.queue, &command).await {
            return Err(self
                .failed(CancellationError::dispatch(&self.config.queue, run.id, source))
                .await);
        }

        info!(
            queue = %self.config.queue,
            command_id = %command.command_id(),
            routing_key = %command.routing_key(),
            "Cancellation dispatched"
        );
        self.events
            .emit(
                CANCELLATION_DISPATCHED,
                Some(json!({
                    "run_id": run.id,
                    "command_id": command.command_id(),
                    "queue": self.config.queue,
                    "reason": command.reason(),
                })),
            )
            .await;

        let convergence = match self.watcher().await_convergence(tenant_id, run.id, run).await {
            Ok(convergence) => convergence,
            Err(err) => return Err(self.failed(err).await),
        };

        let data = json!({
            "run_id": run.id,
            "command_id": command.command_id(),
            "status": convergence.run.status,
            "attempts": convergence.attempts,
            "elapsed_ms": u64::try_from(convergence.elapsed.as_millis()).unwrap_or(u64::MAX),
        });
        if convergence.converged {
            info!(status = %convergence.run.status, attempts = convergence.attempts, "Run status converged");
            self.events.emit(CANCELLATION_CONVERGED, Some(data)).await;
        } else {
            info!(attempts = convergence.attempts, "Run status unchanged after watch window");
            self.events.emit(CANCELLATION_UNCONFIRMED, Some(data)).await;
        }

        Ok(CancellationOutcome {
            command,
            convergence,
        })
    }

    async fn rejected(&self, err: CancellationError) -> CancellationError {
        info!(code = err.code(), error = %err, "Cancellation request rejected");
        let mut data = json!({ "run_id": err.run_id(), "code": err.code() });
        if let CancellationError::NotCancellable { status, .. } = &err {
            data["status"] = json!(status);
        }
        self.events.emit(CANCELLATION_REJECTED, Some(data)).await;
        err
    }

    async fn failed(&self, err: CancellationError) -> CancellationError {
        warn!(code = err.code(), error = %err, "Cancellation request failed");
        let data: serde_json::Map<String, serde_json::Value> = err.to_dict().into_iter().collect();
        self.events
            .emit(CANCELLATION_FAILED, Some(serde_json::Value::Object(data)))
            .await;
        err
    }
}

impl std::fmt::Debug for CancellationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
