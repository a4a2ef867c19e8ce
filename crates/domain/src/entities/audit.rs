use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditEventKind {
    ServerRegistered,
    ToolInvoked,
    AuthorizationAllowed,
    AuthorizationDenied,
    ApprovalGranted,
    ApprovalDenied,
    ApprovalExpired,
    EmergencyActivated,
    EmergencyDeactivated,
    OverrideGranted,
    OverrideConsumed,
}

/// Immutable structured audit record. Created at each interesting point,
/// enqueued to the audit pipeline, never modified thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventKind,
    pub severity: AuditSeverity,
    pub user_email: Option<String>,
    pub resource_id: Option<Uuid>,
    pub tool_name: Option<String>,
    pub decision: Option<String>,
    pub policy_id: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Uuid,
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventKind, severity: AuditSeverity, request_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            severity,
            user_email: None,
            resource_id: None,
            tool_name: None,
            decision: None,
            policy_id: None,
            client_ip: None,
            user_agent: None,
            request_id,
            details: HashMap::new(),
        }
    }

    pub fn with_decision(mut self, decision: impl Into<String>) -> Self {
        self.decision = Some(decision.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}
