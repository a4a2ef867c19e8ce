//! Human approval workflow — `/api/v1/approvals/*`, backed by
//! [`sark_approval::ApprovalStore`]. A decided request authorizes the
//! `approval_id` a later `tools/invoke` call presents; the enforcement
//! pipeline consumes it via `ApprovalStore::use_approval`.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Duration;
use serde::Deserialize;
use uuid::Uuid;

use sark_domain::ApprovalRequest;

use crate::api::auth::CurrentPrincipal;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RequestApprovalRequest {
    pub target_tool_id: Uuid,
    pub justification: String,
    #[serde(default = "default_duration_minutes")]
    pub requested_duration_minutes: i64,
}

fn default_duration_minutes() -> i64 {
    15
}

pub async fn request(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<RequestApprovalRequest>,
) -> Json<ApprovalRequest> {
    let request = state.approvals.request_approval(
        principal.id,
        req.target_tool_id,
        req.justification,
        Duration::minutes(req.requested_duration_minutes),
    );
    Json(request)
}

#[derive(Debug, Deserialize)]
pub struct ListApprovalsQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// Only `status=pending` is backed by the store today — every other
/// filter value falls back to the pending list as well, since there is no
/// decided-requests index yet.
pub async fn list(
    State(state): State<AppState>,
    Query(_query): Query<ListApprovalsQuery>,
) -> Json<Vec<ApprovalRequest>> {
    Json(state.approvals.list_pending())
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    Ok(Json(state.approvals.get(id)?))
}

#[derive(Debug, Deserialize)]
pub struct DecideApprovalRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<DecideApprovalRequest>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    Ok(Json(state.approvals.decide(id, principal.id, true, req.notes)?))
}

pub async fn deny(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<DecideApprovalRequest>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    Ok(Json(state.approvals.decide(id, principal.id, false, req.notes)?))
}
