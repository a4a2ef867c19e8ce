//! Approval Workflow (C12): time-limited human sign-off for actions the
//! enforcement pipeline can't grant by policy or budget alone.
//!
//! Mirrors the teacher's exec approval store (one `RwLock`-guarded map, a
//! request id as key) but the decision/expiry/consumption state machine
//! itself lives in `sark_domain::ApprovalRequest` — this crate is just the
//! shared store and the operations the gateway's HTTP surface calls.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use parking_lot::RwLock;
use sark_domain::error::SarkError;
use sark_domain::{ApprovalRequest, ApprovalStatus};
use uuid::Uuid;

#[derive(Default)]
pub struct ApprovalStore {
    requests: RwLock<HashMap<Uuid, ApprovalRequest>>,
}

impl ApprovalStore {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
        }
    }

    /// Open a new pending approval request.
    pub fn request_approval(
        &self,
        requester_principal_id: Uuid,
        target_tool_id: Uuid,
        justification: impl Into<String>,
        requested_duration: Duration,
    ) -> ApprovalRequest {
        let request = ApprovalRequest::new(requester_principal_id, target_tool_id, justification, requested_duration);
        self.requests.write().insert(request.id, request.clone());
        request
    }

    /// A reviewer approves or denies a pending request.
    pub fn decide(
        &self,
        id: Uuid,
        reviewer_principal_id: Uuid,
        approve: bool,
        notes: Option<String>,
    ) -> Result<ApprovalRequest, SarkError> {
        let mut requests = self.requests.write();
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| SarkError::NotFound(format!("approval request {id} not found")))?;
        request.decide(reviewer_principal_id, approve, notes)?;
        Ok(request.clone())
    }

    pub fn get(&self, id: Uuid) -> Result<ApprovalRequest, SarkError> {
        self.requests
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| SarkError::NotFound(format!("approval request {id} not found")))
    }

    /// Every request still in `pending` status, newest first.
    pub fn list_pending(&self) -> Vec<ApprovalRequest> {
        let mut pending: Vec<ApprovalRequest> = self
            .requests
            .read()
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pending
    }

    /// Consume a grant. Refreshes expiry on first observation past its
    /// deadline, so a request that expired since it was last touched still
    /// correctly reports `false` here rather than stale `true`.
    pub fn use_approval(&self, id: Uuid) -> Result<bool, SarkError> {
        let mut requests = self.requests.write();
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| SarkError::NotFound(format!("approval request {id} not found")))?;
        Ok(request.use_approval(Utc::now()))
    }
}
