//! Ports to the collaborators the coordinator depends on.
//!
//! The run store and the command channel live outside this crate. Each
//! read path gets its own trait so callers can back them by different
//! repositories (the API view and the engine view are not required to
//! agree at every instant).

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::{CancellationCommand, EngineRunRecord, RunId, StepRun, TenantId};
use crate::errors::{PublishError, StoreError};

/// API-facing run lookup, scoped to a tenant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunResolver: Send + Sync {
    /// Resolves a run within `tenant_id`. Returns `Ok(None)` if the tenant
    /// has no such run.
    async fn resolve_run(&self, tenant_id: TenantId, run_id: RunId)
        -> Result<Option<StepRun>, StoreError>;
}

/// Engine-facing run lookup used to address commands.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineRunRepository: Send + Sync {
    /// Fetches the full engine record for a run.
    async fn get_run_for_execution(
        &self,
        tenant_id: TenantId,
        run_id: RunId,
    ) -> Result<EngineRunRecord, StoreError>;
}

/// Point read of a run's current status. No transaction is held between
/// calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunStatusReader: Send + Sync {
    /// Reads the current record for `run_id`.
    async fn get_run_status(&self, run_id: RunId) -> Result<StepRun, StoreError>;
}

/// At-least-once transport for commands.
///
/// Implementations must keep commands sharing a routing key in order.
/// A successful return only means the message was accepted by the
/// transport, not that any worker acted on it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Publishes `command` to `queue`.
    async fn publish(&self, queue: &str, command: &CancellationCommand) -> Result<(), PublishError>;
}

/// The set of collaborators a coordinator is wired with.
#[derive(Clone)]
pub struct CancellationPorts {
    /// API-facing resolver.
    pub resolver: Arc<dyn RunResolver>,
    /// Engine-facing repository.
    pub engine: Arc<dyn EngineRunRepository>,
    /// Status reader used while waiting for convergence.
    pub status_reader: Arc<dyn RunStatusReader>,
    /// Command transport.
    pub channel: Arc<dyn CommandChannel>,
}

impl CancellationPorts {
    /// Wires every read port to one store implementation.
    #[must_use]
    pub fn from_store<S>(store: Arc<S>, channel: Arc<dyn CommandChannel>) -> Self
    where
        S: RunResolver + EngineRunRepository + RunStatusReader + 'static,
    {
        Self {
            resolver: store.clone(),
            engine: store.clone(),
            status_reader: store,
            channel,
        }
    }
}

impl std::fmt::Debug for CancellationPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationPorts").finish_non_exhaustive()
    }
}
