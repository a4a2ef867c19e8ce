use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Sensitivity;

/// A record of a human overriding the classifier's auto-assigned
/// sensitivity. Retained permanently for audit once it exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOverride {
    pub previous_level: Sensitivity,
    pub new_level: Sensitivity,
    pub reviewer_principal_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// An operation exposed by a server ("tool" in MCP vocabulary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub id: Uuid,
    pub server_id: Uuid,
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub override_history: Vec<SensitivityOverride>,
    pub requires_approval: bool,
}

impl Capability {
    /// Manually override the classifier's sensitivity, appending to the
    /// override history (§4.9's `set_sensitivity`).
    pub fn set_sensitivity(
        &mut self,
        level: Sensitivity,
        reviewer_principal_id: Uuid,
        reason: impl Into<String>,
    ) {
        self.override_history.push(SensitivityOverride {
            previous_level: self.sensitivity,
            new_level: level,
            reviewer_principal_id,
            timestamp: Utc::now(),
            reason: reason.into(),
        });
        self.sensitivity = level;
    }
}
