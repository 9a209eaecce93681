//! Step run status enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The execution status of a step run as recorded by the run store.
///
/// Transitions only move toward a terminal state. Once a run is
/// `Succeeded`, `Failed` or `Cancelled` its status never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run is queued and waiting for a worker.
    Pending,
    /// Run has been claimed by a worker and is executing.
    Running,
    /// Run completed successfully.
    Succeeded,
    /// Run failed.
    Failed,
    /// Run was cancelled.
    Cancelled,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

impl RunStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns true if a cancellation may be requested from this status.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    ///
    /// Staying in the same non-terminal status is allowed; terminal
    /// statuses accept nothing.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Pending => true,
            Self::Running => !matches!(next, Self::Pending),
            Self::Succeeded | Self::Failed | Self::Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RunStatus; 5] = [
        RunStatus::Pending,
        RunStatus::Running,
        RunStatus::Succeeded,
        RunStatus::Failed,
        RunStatus::Cancelled,
    ];

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::Pending.to_string(), "PENDING");
        assert_eq!(RunStatus::Running.to_string(), "RUNNING");
        assert_eq!(RunStatus::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn test_run_status_is_cancellable() {
        assert!(RunStatus::Pending.is_cancellable());
        assert!(RunStatus::Running.is_cancellable());
        assert!(!RunStatus::Succeeded.is_cancellable());
        assert!(!RunStatus::Failed.is_cancellable());
        assert!(!RunStatus::Cancelled.is_cancellable());
    }

    #[test]
    fn test_cancellable_and_terminal_are_disjoint() {
        for status in ALL {
            assert_ne!(status.is_cancellable(), status.is_terminal(), "{status}");
        }
    }

    #[test]
    fn test_terminal_status_accepts_no_transition() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_running_cannot_go_back_to_pending() {
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Pending));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Cancelled));
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));
    }

    #[test]
    fn test_run_status_serialize() {
        let json = serde_json::to_string(&RunStatus::Cancelled).unwrap();
        assert_eq!(json, r#""CANCELLED""#);

        let deserialized: RunStatus = serde_json::from_str(r#""RUNNING""#).unwrap();
        assert_eq!(deserialized, RunStatus::Running);
    }

    #[test]
    fn test_run_status_from_str() {
        assert_eq!("succeeded".parse::<RunStatus>(), Ok(RunStatus::Succeeded));
        assert!("unknown".parse::<RunStatus>().is_err());
    }
}
