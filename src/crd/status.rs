//! # Application Status
//!
//! Status types reported by the application controller, and the status code
//! enumerations the exporter expands into one-hot gauges.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the Application resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(default)]
    pub sync: SyncStatus,
    #[serde(default)]
    pub health: HealthStatus,
    /// State of the last (or current) sync operation
    #[serde(default)]
    pub operation_state: Option<OperationState>,
}

/// Comparison result between the live state and the desired state
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Raw status code. Kept as a string so unknown and empty values survive deserialization.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub revision: Option<String>,
}

/// Aggregated health of the application resources
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Sync operation state
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    #[serde(default)]
    pub phase: OperationPhase,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

impl OperationState {
    pub fn new(phase: OperationPhase) -> Self {
        Self {
            phase,
            message: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Phase of a sync operation
///
/// Phases this exporter does not know about (or a missing phase) read as
/// [`OperationPhase::Unknown`] so one odd resource cannot fail a whole list page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, JsonSchema)]
pub enum OperationPhase {
    Running,
    Terminating,
    Failed,
    Error,
    Succeeded,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OperationPhase {
    /// Whether the operation has reached a terminal phase
    pub fn is_completed(self) -> bool {
        matches!(
            self,
            OperationPhase::Failed | OperationPhase::Error | OperationPhase::Succeeded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationPhase::Running => "Running",
            OperationPhase::Terminating => "Terminating",
            OperationPhase::Failed => "Failed",
            OperationPhase::Error => "Error",
            OperationPhase::Succeeded => "Succeeded",
            OperationPhase::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync status codes, in exposition order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatusCode {
    Synced,
    OutOfSync,
    Unknown,
}

impl SyncStatusCode {
    pub const ALL: [SyncStatusCode; 3] = [
        SyncStatusCode::Synced,
        SyncStatusCode::OutOfSync,
        SyncStatusCode::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatusCode::Synced => "Synced",
            SyncStatusCode::OutOfSync => "OutOfSync",
            SyncStatusCode::Unknown => "Unknown",
        }
    }

    /// Whether a raw status string denotes this code.
    ///
    /// An empty status is reported as `Unknown`. This conflates "never set" with
    /// an explicit `Unknown`; existing dashboards rely on it.
    pub fn matches(self, raw: &str) -> bool {
        raw == self.as_str() || (self == SyncStatusCode::Unknown && raw.is_empty())
    }
}

/// Health status codes, in exposition order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatusCode {
    Unknown,
    Progressing,
    Suspended,
    Healthy,
    Degraded,
    Missing,
}

impl HealthStatusCode {
    pub const ALL: [HealthStatusCode; 6] = [
        HealthStatusCode::Unknown,
        HealthStatusCode::Progressing,
        HealthStatusCode::Suspended,
        HealthStatusCode::Healthy,
        HealthStatusCode::Degraded,
        HealthStatusCode::Missing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatusCode::Unknown => "Unknown",
            HealthStatusCode::Progressing => "Progressing",
            HealthStatusCode::Suspended => "Suspended",
            HealthStatusCode::Healthy => "Healthy",
            HealthStatusCode::Degraded => "Degraded",
            HealthStatusCode::Missing => "Missing",
        }
    }

    /// Same empty-equals-`Unknown` rule as [`SyncStatusCode::matches`]
    pub fn matches(self, raw: &str) -> bool {
        raw == self.as_str() || (self == HealthStatusCode::Unknown && raw.is_empty())
    }
}
