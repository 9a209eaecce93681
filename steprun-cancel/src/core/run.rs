//! Step run identifiers and snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::RunStatus;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Identifies a step run. Only meaningful within its tenant.
    RunId
);

uuid_id!(
    /// Identifies a tenant, the isolation boundary for all runs.
    TenantId
);

/// A read-only snapshot of a step run as seen at one point in time.
///
/// The run store owns the record; holders of a `StepRun` only ever
/// have a copy and never write it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRun {
    /// The run identifier.
    pub id: RunId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Status at the time the snapshot was taken.
    pub status: RunStatus,
    /// Execution metadata, opaque to cancellation.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// When the store last changed this record.
    pub updated_at: DateTime<Utc>,
}

impl StepRun {
    /// Creates a snapshot with empty metadata.
    #[must_use]
    pub fn new(id: RunId, tenant_id: TenantId, status: RunStatus) -> Self {
        Self {
            id,
            tenant_id,
            status,
            metadata: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true if `other` reports a different status than this snapshot.
    #[must_use]
    pub fn status_differs(&self, other: &Self) -> bool {
        self.status != other.status
    }
}

/// The engine-facing view of a run, used to address commands to the
/// worker that currently owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRunRecord {
    /// The run identifier.
    pub run_id: RunId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Status according to the engine.
    pub status: RunStatus,
    /// Worker holding the run, if it has been claimed.
    pub worker_id: Option<String>,
    /// Dispatcher the owning worker is connected through.
    pub dispatcher_id: Option<String>,
    /// The job run this step belongs to.
    pub job_run_id: Uuid,
    /// The step definition this run executes.
    pub step_id: Uuid,
}

impl EngineRunRecord {
    /// Creates a record for an unclaimed run.
    #[must_use]
    pub fn new(run_id: RunId, tenant_id: TenantId, status: RunStatus) -> Self {
        Self {
            run_id,
            tenant_id,
            status,
            worker_id: None,
            dispatcher_id: None,
            job_run_id: Uuid::new_v4(),
            step_id: Uuid::new_v4(),
        }
    }

    /// Sets the owning worker.
    #[must_use]
    pub fn with_worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    /// Sets the dispatcher.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher_id: impl Into<String>) -> Self {
        self.dispatcher_id = Some(dispatcher_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_parse_and_display() {
        let raw = "6f1c2b0e-7d43-4d4f-9f0a-0b7a5a8f2c11";
        let id: RunId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert!("not-a-uuid".parse::<RunId>().is_err());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = TenantId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn test_status_differs_ignores_metadata() {
        let run = StepRun::new(RunId::new(), TenantId::new(), RunStatus::Running);
        let same = run.clone().with_metadata("attempt", serde_json::json!(2));
        let mut changed = run.clone();
        changed.status = RunStatus::Cancelled;

        assert!(!run.status_differs(&same));
        assert!(run.status_differs(&changed));
    }

    #[test]
    fn test_engine_record_builder() {
        let record = EngineRunRecord::new(RunId::new(), TenantId::new(), RunStatus::Running)
            .with_worker("worker-7")
            .with_dispatcher("dispatcher-1");

        assert_eq!(record.worker_id.as_deref(), Some("worker-7"));
        assert_eq!(record.dispatcher_id.as_deref(), Some("dispatcher-1"));
    }
}
