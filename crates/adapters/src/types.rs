use std::time::Duration;

use sark_domain::entities::Sensitivity;
use sark_domain::TransportKind;
use serde_json::Value;
use uuid::Uuid;

/// A resource discovered on a downstream backend, before it has been
/// registered (no server id, owner, or status yet — that's
/// `sark-registry`'s job once an operator accepts it).
#[derive(Debug, Clone)]
pub struct DiscoveredResource {
    pub name: String,
    pub endpoint: String,
    pub transport: TransportKind,
    pub description: String,
    pub metadata: Value,
}

/// A capability discovered under a resource.
#[derive(Debug, Clone)]
pub struct DiscoveredCapability {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub sensitivity_hint: Sensitivity,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub request_id: Uuid,
    pub resource: DiscoveredResource,
    pub capability_name: String,
    pub arguments: Value,
    pub deadline: Duration,
}

#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub metadata: Value,
    pub duration_ms: u64,
}

impl InvocationResult {
    pub fn ok(result: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            metadata: Value::Null,
            duration_ms,
        }
    }

    pub fn failed(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            metadata: Value::Null,
            duration_ms,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("capability {0} not found")]
    CapabilityNotFound(String),

    #[error("request rejected: {0}")]
    ValidationFailed(String),

    #[error("payload of {actual} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { actual: usize, limit: usize },

    #[error("call exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("invocation failed: {0}")]
    Invocation(String),
}

impl From<AdapterError> for sark_domain::error::SarkError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::CapabilityNotFound(name) => sark_domain::error::SarkError::NotFound(name),
            AdapterError::ValidationFailed(reason) => sark_domain::error::SarkError::Validation(reason),
            AdapterError::Timeout(_) => sark_domain::error::SarkError::DownstreamUnavailable(err.to_string()),
            AdapterError::PayloadTooLarge { .. } => sark_domain::error::SarkError::Validation(err.to_string()),
            AdapterError::Discovery(_) | AdapterError::Invocation(_) => {
                sark_domain::error::SarkError::DownstreamError(err.to_string())
            }
        }
    }
}
