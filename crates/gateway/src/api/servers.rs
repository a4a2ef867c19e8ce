//! Resource server registry — `/api/v1/servers`, `/api/v1/bulk/servers/*`.
//! Thin HTTP shell over [`sark_registry::ServerRegistry`]; all matching,
//! pagination and transition rules live in that crate.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sark_domain::{ResourceServer, Sensitivity, ServerStatus, TransportKind};
use sark_registry::{bulk_register, bulk_update, BulkMode, BulkResult, ListRequest, ListResult, ServerQuery, SortOrder};

use crate::api::auth::CurrentPrincipal;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterServerRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub transport: TransportKind,
    pub endpoint: String,
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub team_tags: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RegisterServerRequest {
    fn into_server(self, owner_principal_id: Uuid) -> ResourceServer {
        let now = Utc::now();
        ResourceServer {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            transport: self.transport,
            endpoint: self.endpoint,
            sensitivity: self.sensitivity,
            owner_principal_id,
            team_tags: self.team_tags,
            status: ServerStatus::Registered,
            tags: self.tags,
            created_at: now,
            updated_at: now,
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<RegisterServerRequest>,
) -> Result<Json<ResourceServer>, ApiError> {
    let server = req.into_server(principal.id);
    state.servers.register_server(server.clone())?;
    Ok(Json(server))
}

// `status`/`sensitivity`/`tags` take comma-separated values (`?status=active,quarantined`)
// rather than repeated query keys — axum's `Query` extractor flattens the
// whole string into one field either way, and a single field reads the
// same however many values it holds.
#[derive(Debug, Deserialize)]
pub struct ListServersQuery {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
    pub status: Option<String>,
    pub sensitivity: Option<String>,
    pub team_id: Option<String>,
    pub owner_id: Option<Uuid>,
    pub tags: Option<String>,
    #[serde(default)]
    pub match_all_tags: bool,
    pub search: Option<String>,
    #[serde(default)]
    pub include_total: bool,
}

fn split_csv(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListServersQuery>,
) -> Result<Json<ListResult>, ApiError> {
    let order = match query.sort_order.as_deref() {
        Some("asc") | Some("ascending") => SortOrder::Ascending,
        _ => SortOrder::Descending,
    };
    let status = split_csv(&query.status)
        .into_iter()
        .filter_map(|s| serde_json::from_str::<ServerStatus>(&format!("\"{s}\"")).ok())
        .collect();
    let sensitivity = split_csv(&query.sensitivity)
        .into_iter()
        .filter_map(|s| serde_json::from_str::<Sensitivity>(&format!("\"{s}\"")).ok())
        .collect();
    let request = ListRequest {
        query: ServerQuery {
            status,
            sensitivity,
            team: query.team_id,
            owner_principal_id: query.owner_id,
            tags: split_csv(&query.tags),
            match_all_tags: query.match_all_tags,
            text: query.search,
        },
        page_size: query.limit,
        cursor: query.cursor,
        order,
        with_total: query.include_total,
    };
    let result = state.servers.list_servers(request)?;
    Ok(Json(result))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResourceServer>, ApiError> {
    Ok(Json(state.servers.get_server(id)?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(), ApiError> {
    state.servers.remove_server(id)?;
    state.capabilities.remove_for_server(id);
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct BulkRegisterRequest {
    pub servers: Vec<RegisterServerRequest>,
    #[serde(default)]
    pub fail_on_first_error: bool,
}

pub async fn bulk_register_servers(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<BulkRegisterRequest>,
) -> Json<BulkResult> {
    let mode = if req.fail_on_first_error {
        BulkMode::Transactional
    } else {
        BulkMode::BestEffort
    };
    let specs = req
        .servers
        .into_iter()
        .map(|s| s.into_server(principal.id))
        .collect();
    Json(bulk_register(&state.servers, specs, mode))
}

#[derive(Debug, Deserialize)]
pub struct BulkStatusUpdate {
    pub id: Uuid,
    pub status: ServerStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkStatusRequest {
    pub updates: Vec<BulkStatusUpdate>,
    #[serde(default)]
    pub fail_on_first_error: bool,
}

pub async fn bulk_update_status(
    State(state): State<AppState>,
    Json(req): Json<BulkStatusRequest>,
) -> Json<BulkResult> {
    let mode = if req.fail_on_first_error {
        BulkMode::Transactional
    } else {
        BulkMode::BestEffort
    };
    let updates = req.updates.into_iter().map(|u| (u.id, u.status)).collect();
    Json(bulk_update(&state.servers, updates, mode))
}
