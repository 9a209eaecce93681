//! The cancellation command sent to a run's owning worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EngineRunRecord, RunId, TenantId};

/// Reason code attached to cancellations requested through the API.
pub const CANCELLED_BY_USER: &str = "CANCELLED_BY_USER";

/// A request for the owning worker to cancel a step run.
///
/// Commands are immutable once built. Delivery is at-least-once, so a
/// worker may see the same command (or several commands for one run)
/// more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationCommand {
    command_id: Uuid,
    run_id: RunId,
    tenant_id: TenantId,
    reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    propagate_to_children: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dispatcher_id: Option<String>,
    issued_at: DateTime<Utc>,
}

impl CancellationCommand {
    /// Builds a command addressed to the worker recorded in `record`.
    #[must_use]
    pub fn for_record(
        record: &EngineRunRecord,
        reason: impl Into<String>,
        propagate_to_children: bool,
    ) -> Self {
        Self {
            command_id: Uuid::now_v7(),
            run_id: record.run_id,
            tenant_id: record.tenant_id,
            reason: reason.into(),
            detail: None,
            propagate_to_children,
            worker_id: record.worker_id.clone(),
            dispatcher_id: record.dispatcher_id.clone(),
            issued_at: Utc::now(),
        }
    }

    /// Attaches caller-supplied text. Blank text is dropped.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let trimmed = detail.trim();
        self.detail = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Unique id of this command, distinct for every publish.
    #[must_use]
    pub const fn command_id(&self) -> Uuid {
        self.command_id
    }

    /// The run to cancel.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The tenant owning the run.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Machine-readable reason code.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Human-readable text from the requester, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Whether in-progress child work should be cancelled too.
    #[must_use]
    pub const fn propagate_to_children(&self) -> bool {
        self.propagate_to_children
    }

    /// Worker the command is addressed to, when the run has been claimed.
    #[must_use]
    pub fn worker_id(&self) -> Option<&str> {
        self.worker_id.as_deref()
    }

    /// When the command was built.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Key the transport orders and routes by.
    ///
    /// Claimed runs route to their worker; unclaimed runs route by run id
    /// so whichever worker picks the run up sees the commands in order.
    #[must_use]
    pub fn routing_key(&self) -> String {
        match &self.worker_id {
            Some(worker) => format!("worker:{worker}"),
            None => format!("run:{}", self.run_id),
        }
    }

    /// Serializes the command as the JSON message payload.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
