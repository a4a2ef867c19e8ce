use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SarkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

/// Time-limited human approval for a critical action, consulted by the
/// enforcement pipeline (C12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub requester_principal_id: Uuid,
    pub target_tool_id: Uuid,
    pub justification: String,
    pub requested_duration: Duration,
    pub status: ApprovalStatus,
    /// Set once approved; `granted_at + requested_duration`.
    pub expires_at: Option<DateTime<Utc>>,
    pub reviewer_principal_id: Option<Uuid>,
    pub reviewer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set by `use_approval` the first time it's consumed — kept so
    /// `use_approval` can remain idempotent.
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    pub fn new(
        requester_principal_id: Uuid,
        target_tool_id: Uuid,
        justification: impl Into<String>,
        requested_duration: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester_principal_id,
            target_tool_id,
            justification: justification.into(),
            requested_duration,
            status: ApprovalStatus::Pending,
            expires_at: None,
            reviewer_principal_id: None,
            reviewer_notes: None,
            created_at: Utc::now(),
            used_at: None,
        }
    }

    /// A reviewer distinct from the requester approves or denies.
    /// `approve = false` denies.
    pub fn decide(
        &mut self,
        reviewer_principal_id: Uuid,
        approve: bool,
        notes: Option<String>,
    ) -> Result<(), SarkError> {
        if self.status != ApprovalStatus::Pending {
            return Err(SarkError::Conflict(format!(
                "approval {} is not pending (status={:?})",
                self.id, self.status
            )));
        }
        if reviewer_principal_id == self.requester_principal_id {
            return Err(SarkError::ForbiddenPolicy {
                reason: "a requester may not approve their own request".into(),
            });
        }
        self.reviewer_principal_id = Some(reviewer_principal_id);
        self.reviewer_notes = notes;
        if approve {
            self.status = ApprovalStatus::Approved;
            self.expires_at = Some(Utc::now() + self.requested_duration);
        } else {
            self.status = ApprovalStatus::Denied;
        }
        Ok(())
    }

    /// Transition to `expired` on first observation past `expires_at`.
    pub fn refresh_expiry(&mut self, now: DateTime<Utc>) {
        if self.status == ApprovalStatus::Approved {
            if let Some(expires_at) = self.expires_at {
                if now >= expires_at {
                    self.status = ApprovalStatus::Expired;
                }
            }
        }
    }

    /// Idempotent consumption: succeeds only while approved and unexpired.
    /// Returns `true` exactly once semantics-wise — repeated calls after a
    /// first success still return `true` (idempotent per request id).
    pub fn use_approval(&mut self, now: DateTime<Utc>) -> bool {
        self.refresh_expiry(now);
        if self.status != ApprovalStatus::Approved {
            return false;
        }
        if self.used_at.is_none() {
            self.used_at = Some(now);
        }
        true
    }
}
