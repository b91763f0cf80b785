//! Device status state machine.

use serde::{Deserialize, Serialize};

/// Outward-reported availability of this device.
///
/// The operator's enabled/disabled preference drives `Active`/`Inactive`;
/// a running job pins the reported status to `Busy` until it completes,
/// regardless of the preference. Accepted jobs run to completion even if
/// the operator disables sharing mid-job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    /// Operator disabled sharing.
    Inactive,
    /// Operator enabled sharing, no job running.
    Active,
    /// A job is currently executing.
    Busy,
}

impl DeviceStatus {
    /// Resolve the reported status from the stored preference and the
    /// presence of a current job. Job presence always wins.
    pub fn resolve(enabled: bool, job_running: bool) -> Self {
        if job_running {
            Self::Busy
        } else if enabled {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Inactive => "INACTIVE",
            Self::Active => "ACTIVE",
            Self::Busy => "BUSY",
        };
        write!(f, "{s}")
    }
}
