//! Tool catalogue — `GET /v1/tools`, `GET /v1/tools/{id}/sensitivity`,
//! `PATCH /v1/tools/{id}/sensitivity` — backed by
//! [`sark_registry::CapabilityStore`].

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sark_domain::{Capability, Sensitivity};

use crate::api::auth::CurrentPrincipal;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListToolsQuery {
    pub server_id: Option<Uuid>,
}

pub async fn list_tools(
    State(state): State<AppState>,
    Query(query): Query<ListToolsQuery>,
) -> Json<Vec<Capability>> {
    Json(state.capabilities.list(query.server_id))
}

#[derive(Debug, Serialize)]
pub struct SensitivityResponse {
    pub capability_id: Uuid,
    pub sensitivity: Sensitivity,
    pub requires_approval: bool,
}

pub async fn get_sensitivity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SensitivityResponse>, ApiError> {
    let cap = state.capabilities.get(id)?;
    Ok(Json(SensitivityResponse {
        capability_id: cap.id,
        sensitivity: cap.sensitivity,
        requires_approval: cap.requires_approval,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetSensitivityRequest {
    pub sensitivity: Sensitivity,
    pub reason: String,
}

/// A human reviewer's override of a capability's auto-classified
/// sensitivity. `reviewer_principal_id` is the caller attributed by
/// [`CurrentPrincipal`], not a client-supplied field — an override always
/// has to trace back to whoever is logged in.
pub async fn set_sensitivity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<SetSensitivityRequest>,
) -> Result<Json<Capability>, ApiError> {
    let updated = state
        .capabilities
        .set_sensitivity(id, req.sensitivity, principal.id, req.reason)?;
    Ok(Json(updated))
}
