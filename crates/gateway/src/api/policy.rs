//! `POST /api/v1/policy/evaluate` — runs the full enforcement pipeline
//! (cache, governance, budget, rate limit, policy) for a hypothetical
//! action against a capability, without dispatching anything downstream.
//! `api/invoke.rs` runs the same pipeline before an actual invocation.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use sark_domain::entities::Decision;
use sark_enforcement::EnforcementRequest;

use crate::api::auth::CurrentPrincipal;
use crate::error::ApiError;
use crate::request_meta::ClientMeta;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub action: String,
    pub resource_id: Uuid,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub policy_name: Option<String>,
}

pub async fn evaluate(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    meta: ClientMeta,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<Decision>, ApiError> {
    let capability = state.capabilities.get(req.resource_id)?;
    let server = state.servers.get_server(capability.server_id).ok();

    let mut context = req.parameters.clone();
    if req.dry_run {
        if let Value::Object(ref mut map) = context {
            map.insert("dry_run".into(), json!(true));
        } else {
            context = json!({"dry_run": true, "parameters": context});
        }
    }

    let request = EnforcementRequest {
        request_id: Uuid::new_v4(),
        principal_id: principal.id,
        principal_tags: principal.roles.iter().chain(principal.groups.iter()).cloned().collect(),
        action: req.action,
        resource_id: capability.id,
        resource_name: capability.name.clone(),
        sensitivity: capability.sensitivity,
        requires_approval: capability.requires_approval,
        approval_id: None,
        path: "/api/v1/policy/evaluate".into(),
        is_admin: principal.is_admin(),
        api_key: meta.api_key,
        bearer_token: meta.bearer_token,
        forwarded_for: meta.forwarded_for,
        real_ip: meta.real_ip,
        peer_addr: meta.peer_addr,
        user: json!({
            "id": principal.id,
            "email": principal.email,
            "roles": principal.roles,
            "groups": principal.groups,
        }),
        tool: Some(json!(capability)),
        server: server.map(|s| json!(s)),
        context,
        policy_name: req.policy_name.unwrap_or_else(|| "default".to_string()),
        provider: "policy-evaluate".into(),
        model: None,
        estimated_input_chars: None,
        device: None,
        parameters: req.parameters,
        override_pin: None,
    };

    let decision = state.enforcement.evaluate(request).await;
    Ok(Json(decision))
}
