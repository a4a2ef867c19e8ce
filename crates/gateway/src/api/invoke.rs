//! `POST /api/v1/tools/invoke` — the one route that actually dispatches to
//! a downstream capability. Runs the same enforcement pipeline as
//! `api/policy.rs`, then on allow hands off to the transport-appropriate
//! `sark-adapters::Adapter` and records the invocation's cost.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use sark_adapters::{DiscoveredResource, Invocation, InvocationResult};
use sark_domain::entities::DecisionSource;
use sark_domain::error::SarkError;
use sark_enforcement::EnforcementRequest;

use crate::api::auth::CurrentPrincipal;
use crate::error::ApiError;
use crate::request_meta::ClientMeta;
use crate::state::AppState;

const INVOKE_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub tool_id: Uuid,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub approval_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct InvokeResponse {
    pub request_id: Uuid,
    pub decision: sark_domain::entities::Decision,
    pub result: InvocationResultBody,
}

#[derive(Debug, Serialize)]
pub struct InvocationResultBody {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub metadata: Value,
    pub duration_ms: u64,
}

impl From<InvocationResult> for InvocationResultBody {
    fn from(r: InvocationResult) -> Self {
        Self {
            success: r.success,
            result: r.result,
            error: r.error,
            metadata: r.metadata,
            duration_ms: r.duration_ms,
        }
    }
}

pub async fn invoke(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    meta: ClientMeta,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<InvokeResponse>, ApiError> {
    let capability = state.capabilities.get(req.tool_id)?;
    let server = state.servers.get_server(capability.server_id)?;

    let request_id = Uuid::new_v4();
    let enforcement_request = EnforcementRequest {
        request_id,
        principal_id: principal.id,
        principal_tags: principal.roles.iter().chain(principal.groups.iter()).cloned().collect(),
        action: format!("invoke:{}", capability.name),
        resource_id: capability.id,
        resource_name: capability.name.clone(),
        sensitivity: capability.sensitivity,
        requires_approval: capability.requires_approval,
        approval_id: req.approval_id,
        path: "/api/v1/tools/invoke".into(),
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
        server: Some(json!(server)),
        context: req.arguments.clone(),
        policy_name: "default".into(),
        provider: server.name.clone(),
        model: None,
        estimated_input_chars: req.arguments.as_str().map(str::len),
        device: None,
        parameters: req.arguments.clone(),
        override_pin: None,
    };

    let decision = state.enforcement.evaluate(enforcement_request.clone()).await;
    if !decision.allow {
        return Err(match decision.source {
            DecisionSource::Rate => SarkError::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(60),
            },
            _ => SarkError::ForbiddenPolicy { reason: decision.reason },
        }
        .into());
    }

    let estimate = state.enforcement.estimate_cost(&enforcement_request);
    let adapter = state.adapters.get(server.transport);
    let invocation = Invocation {
        request_id,
        resource: DiscoveredResource {
            name: server.name.clone(),
            endpoint: server.endpoint.clone(),
            transport: server.transport,
            description: server.description.clone(),
            metadata: Value::Null,
        },
        capability_name: capability.name.clone(),
        arguments: req.arguments,
        deadline: INVOKE_DEADLINE,
    };

    let result = match adapter.invoke(&invocation).await {
        Ok(result) => result,
        Err(err) => InvocationResult::failed(err.to_string(), 0),
    };

    // One ledger entry iff the invocation completed without cancellation:
    // a failed downstream call releases its budget reservation instead of
    // charging for it.
    if result.success {
        state.enforcement.record_invocation_cost(&enforcement_request, &estimate, None);
    } else {
        state.enforcement.release_invocation_cost(&enforcement_request);
    }

    Ok(Json(InvokeResponse {
        request_id,
        decision,
        result: result.into(),
    }))
}
