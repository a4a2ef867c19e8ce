use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Sensitivity;
use crate::error::SarkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Grpc,
    Database,
    Stdio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Registered,
    Active,
    Inactive,
    Unhealthy,
    Decommissioned,
}

impl ServerStatus {
    /// Validate a transition per the status machine in §4.11. Returns the
    /// new status, or a `conflict` error naming the disallowed transition.
    pub fn transition(self, to: ServerStatus) -> Result<ServerStatus, SarkError> {
        use ServerStatus::*;
        let allowed = match (self, to) {
            (Registered, Active) => true,
            (Active, Inactive) => true,
            (Inactive, Active) => true,
            (Active, Unhealthy) => true,
            (Unhealthy, Active) => true,
            (_, Decommissioned) => self != Decommissioned,
            _ => false,
        };
        if allowed {
            Ok(to)
        } else {
            Err(SarkError::Conflict(format!(
                "invalid server status transition {self:?} -> {to:?}"
            )))
        }
    }
}

/// A registered downstream MCP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceServer {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub transport: TransportKind,
    pub endpoint: String,
    pub sensitivity: Sensitivity,
    pub owner_principal_id: Uuid,
    #[serde(default)]
    pub team_tags: Vec<String>,
    pub status: ServerStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceServer {
    /// Apply a validated status transition, bumping `updated_at`.
    pub fn apply_status(&mut self, to: ServerStatus) -> Result<(), SarkError> {
        self.status = self.status.transition(to)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}
