use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct PolicyQuery {
    pub policy_name: String,
}

/// `{user, action, tool?, server?, context}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBundle {
    pub user: Value,
    pub action: String,
    #[serde(default)]
    pub tool: Option<Value>,
    #[serde(default)]
    pub server: Option<Value>,
    #[serde(default)]
    pub context: Value,
}

impl InputBundle {
    /// Render as the flat JSON object that policy conditions' dot-paths
    /// address.
    pub fn as_value(&self) -> Value {
        serde_json::json!({
            "user": self.user,
            "action": self.action,
            "tool": self.tool,
            "server": self.server,
            "context": self.context,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyOutcome {
    pub allow: bool,
    pub reason: String,
    #[serde(default)]
    pub filtered_parameters: Option<Value>,
    #[serde(default)]
    pub audit_id: Option<String>,
    /// Set when the adapter failed closed because the named policy doesn't
    /// exist. Callers should emit a high-severity audit event in this case.
    #[serde(default)]
    pub not_found: bool,
}

impl PolicyOutcome {
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            filtered_parameters: None,
            audit_id: None,
            not_found: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait PolicyBackend: Send + Sync {
    async fn evaluate(&self, query: &PolicyQuery, bundle: &InputBundle) -> Result<PolicyOutcome, PolicyError>;
}
