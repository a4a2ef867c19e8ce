use serde_json::Value;
use uuid::Uuid;

use sark_domain::entities::Sensitivity;

/// Everything the pipeline needs to evaluate one request. Callers (the
/// gateway's HTTP surface, in practice) are responsible for resolving
/// identity, the target capability's sensitivity, and cost inputs before
/// building this — the pipeline itself never looks anything up in C11.
#[derive(Debug, Clone)]
pub struct EnforcementRequest {
    pub request_id: Uuid,
    pub principal_id: Uuid,
    /// Role/group tags used to match time rules (§4.6).
    pub principal_tags: Vec<String>,
    pub action: String,
    pub resource_id: Uuid,
    pub resource_name: String,
    pub sensitivity: Sensitivity,
    /// Carried from the target `Capability`; when set, a granted approval
    /// is folded into the policy input bundle's context as
    /// `approval_granted` rather than treated as its own pipeline step.
    pub requires_approval: bool,
    pub approval_id: Option<Uuid>,

    /// HTTP path, for the rate limiter's always-bypassed paths.
    pub path: String,
    pub is_admin: bool,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
    pub peer_addr: String,

    /// Policy input bundle pieces (§4.2).
    pub user: Value,
    pub tool: Option<Value>,
    pub server: Option<Value>,
    pub context: Value,
    pub policy_name: String,

    /// Cost/budget inputs (§4.3-4.4).
    pub provider: String,
    pub model: Option<String>,
    pub estimated_input_chars: Option<usize>,
    pub device: Option<String>,

    pub parameters: Value,
    /// Presented break-glass pin, if any, scoped to this request id.
    pub override_pin: Option<String>,
}
