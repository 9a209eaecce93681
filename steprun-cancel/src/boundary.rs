//! Maps coordinator results onto API responses.
//!
//! Rejections become 4xx responses with a description; internal failures
//! become a 500 carrying the wrapped message, which names the operation
//! and run but never a tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::coordinator::CancellationOutcome;
use crate::core::{RunId, RunStatus, TenantId};
use crate::errors::CancellationError;

/// One error entry in an API error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable description.
    pub description: String,
    /// Machine-readable code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// API error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrors {
    /// The errors.
    pub errors: Vec<ApiError>,
}

impl ApiErrors {
    /// Creates a body with a single description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            errors: vec![ApiError {
                description: description.into(),
                code: None,
            }],
        }
    }

    fn from_error(description: impl Into<String>, err: &CancellationError) -> Self {
        Self {
            errors: vec![ApiError {
                description: description.into(),
                code: Some(err.code().to_string()),
            }],
        }
    }
}

/// Cancellation details attached to the returned run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationView {
    /// The published command.
    pub command_id: Uuid,
    /// True if the run was observed as cancelled.
    pub confirmed: bool,
    /// Convergence reads performed.
    pub attempts: usize,
}

/// The run as returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRunView {
    /// Run id.
    pub id: RunId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Last observed status.
    pub status: RunStatus,
    /// Execution metadata.
    pub metadata: HashMap<String, serde_json::Value>,
    /// Last store update.
    pub updated_at: DateTime<Utc>,
    /// Cancellation request details.
    pub cancellation: CancellationView,
}

impl From<&CancellationOutcome> for StepRunView {
    fn from(outcome: &CancellationOutcome) -> Self {
        let run = outcome.run();
        Self {
            id: run.id,
            tenant_id: run.tenant_id,
            status: run.status,
            metadata: run.metadata.clone(),
            updated_at: run.updated_at,
            cancellation: CancellationView {
                command_id: outcome.command.command_id(),
                confirmed: outcome.is_confirmed(),
                attempts: outcome.convergence.attempts,
            },
        }
    }
}

/// Outcome of the cancel endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelResponse {
    /// Cancellation requested; body is the last observed run.
    Ok(Box<StepRunView>),
    /// The run cannot be cancelled.
    BadRequest(ApiErrors),
    /// The run is not visible to the tenant.
    NotFound(ApiErrors),
    /// The run belongs to another tenant.
    Forbidden(ApiErrors),
    /// An internal failure; no assumption about the run should be made.
    Internal(ApiErrors),
}

impl CancelResponse {
    /// HTTP status code for the response.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Ok(_) => 200,
            Self::BadRequest(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }

    /// Serializes the response body.
    pub fn body(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Ok(view) => serde_json::to_value(view),
            Self::BadRequest(errors)
            | Self::NotFound(errors)
            | Self::Forbidden(errors)
            | Self::Internal(errors) => serde_json::to_value(errors),
        }
    }
}

impl From<Result<CancellationOutcome, CancellationError>> for CancelResponse {
    fn from(result: Result<CancellationOutcome, CancellationError>) -> Self {
        match result {
            Ok(outcome) => Self::Ok(Box::new(StepRunView::from(&outcome))),
            Err(err @ CancellationError::NotCancellable { .. }) => Self::BadRequest(
                ApiErrors::from_error("step run is not in a running or pending state", &err),
            ),
            Err(err @ CancellationError::RunNotFound { .. }) => {
                Self::NotFound(ApiErrors::from_error("step run not found", &err))
            }
            Err(err @ CancellationError::TenantMismatch { .. }) => Self::Forbidden(
                ApiErrors::from_error("step run does not belong to this tenant", &err),
            ),
            Err(err) => Self::Internal(ApiErrors::from_error(err.to_string(), &err)),
        }
    }
}
