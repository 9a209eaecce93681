//! Error types for step run cancellation.
//!
//! Collaborator failures (`StoreError`, `PublishError`) are wrapped into
//! `CancellationError` together with the operation name and run id. Tenant
//! identifiers are never part of an error message.

use std::collections::HashMap;
use thiserror::Error;

use crate::core::{RunId, RunStatus};

/// Failure reported by a run store read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The record does not exist.
    #[error("record not found")]
    NotFound,

    /// The record exists but belongs to another tenant.
    #[error("record belongs to a different tenant")]
    ForeignRecord,

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The query itself failed.
    #[error("query failed: {0}")]
    Query(String),
}

/// Failure reported by the command channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The transport could not be reached.
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// The transport refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The command could not be encoded.
    #[error("could not encode command: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// The error type for a cancellation request.
///
/// Every variant is terminal for the request; nothing here is retried
/// locally.
#[derive(Debug, Error)]
pub enum CancellationError {
    /// The run is not pending or running.
    #[error("step run {run_id} is not in a running or pending state (status: {status})")]
    NotCancellable {
        /// The run.
        run_id: RunId,
        /// Its status when the request was checked.
        status: RunStatus,
    },

    /// The run could not be resolved within the tenant.
    #[error("step run {run_id} not found")]
    RunNotFound {
        /// The run.
        run_id: RunId,
    },

    /// The snapshot handed to the coordinator belongs to another tenant.
    #[error("step run {run_id} does not belong to the requesting tenant")]
    TenantMismatch {
        /// The run.
        run_id: RunId,
    },

    /// A run store read failed.
    #[error("could not {operation} for step run {run_id}: {source}")]
    LookupFailed {
        /// The read that failed.
        operation: &'static str,
        /// The run.
        run_id: RunId,
        /// The store failure.
        #[source]
        source: StoreError,
    },

    /// The command could not be published; no cancellation was requested.
    #[error("could not publish cancellation for step run {run_id} to queue '{queue}': {source}")]
    DispatchFailed {
        /// The queue published to.
        queue: String,
        /// The run.
        run_id: RunId,
        /// The channel failure.
        #[source]
        source: PublishError,
    },
}

impl CancellationError {
    /// Wraps a store failure for `operation`.
    #[must_use]
    pub const fn lookup(operation: &'static str, run_id: RunId, source: StoreError) -> Self {
        Self::LookupFailed {
            operation,
            run_id,
            source,
        }
    }

    /// Wraps a publish failure.
    #[must_use]
    pub fn dispatch(queue: impl Into<String>, run_id: RunId, source: PublishError) -> Self {
        Self::DispatchFailed {
            queue: queue.into(),
            run_id,
            source,
        }
    }

    /// Stable machine-readable code for the variant.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotCancellable { .. } => "NOT_CANCELLABLE",
            Self::RunNotFound { .. } => "RUN_NOT_FOUND",
            Self::TenantMismatch { .. } => "TENANT_MISMATCH",
            Self::LookupFailed { .. } => "LOOKUP_FAILED",
            Self::DispatchFailed { .. } => "DISPATCH_FAILED",
        }
    }

    /// The run the error concerns.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        match self {
            Self::NotCancellable { run_id, .. }
            | Self::RunNotFound { run_id }
            | Self::TenantMismatch { run_id }
            | Self::LookupFailed { run_id, .. }
            | Self::DispatchFailed { run_id, .. } => *run_id,
        }
    }

    /// Returns true if the error is a rejection of the request rather
    /// than an internal failure.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::NotCancellable { .. } | Self::RunNotFound { .. } | Self::TenantMismatch { .. }
        )
    }

    /// Always false: the cancellation flow is never retried as a whole.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }

    /// Converts to a dictionary representation for diagnostics.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("run_id".to_string(), serde_json::json!(self.run_id()));

        match self {
            Self::NotCancellable { status, .. } => {
                map.insert("status".to_string(), serde_json::json!(status));
            }
            Self::LookupFailed { operation, source, .. } => {
                map.insert("operation".to_string(), serde_json::json!(operation));
                map.insert("cause".to_string(), serde_json::json!(source.to_string()));
            }
            Self::DispatchFailed { queue, source, .. } => {
                map.insert("operation".to_string(), serde_json::json!("publish"));
                map.insert("queue".to_string(), serde_json::json!(queue));
                map.insert("cause".to_string(), serde_json::json!(source.to_string()));
            }
            Self::RunNotFound { .. } | Self::TenantMismatch { .. } => {}
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}
