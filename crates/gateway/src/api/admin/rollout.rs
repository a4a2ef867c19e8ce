//! Policy engine rollout control (`/admin/rollout/*`) — moves traffic
//! between the embedded and remote policy backends via the shared
//! [`sark_policy::RolloutRegistry`] without restarting the gateway.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::admin::AdminGuard;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetRolloutRequest {
    pub feature: String,
    pub percent: u8,
}

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub feature: String,
}

#[derive(Debug, Serialize)]
pub struct RolloutStatus {
    pub percentages: std::collections::HashMap<String, u8>,
}

pub async fn set(_guard: AdminGuard, State(state): State<AppState>, Json(req): Json<SetRolloutRequest>) -> Json<RolloutStatus> {
    state.rollout.set(req.feature, req.percent);
    Json(RolloutStatus { percentages: state.rollout.snapshot() })
}

pub async fn rollback(_guard: AdminGuard, State(state): State<AppState>, Json(req): Json<FeatureRequest>) -> Json<RolloutStatus> {
    state.rollout.rollback(&req.feature);
    Json(RolloutStatus { percentages: state.rollout.snapshot() })
}

pub async fn rollback_all(_guard: AdminGuard, State(state): State<AppState>) -> Json<RolloutStatus> {
    state.rollout.rollback_all();
    Json(RolloutStatus { percentages: state.rollout.snapshot() })
}

pub async fn status(_guard: AdminGuard, State(state): State<AppState>) -> Json<RolloutStatus> {
    Json(RolloutStatus { percentages: state.rollout.snapshot() })
}
