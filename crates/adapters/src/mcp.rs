//! Thin adapter wrapping `sark-mcp`'s `McpManager` — the one transport the
//! teacher repo already spoke fluently. MCP servers are configured and
//! connected once at startup; this adapter just exposes that manager
//! through the common `Adapter` surface so MCP tools flow through the same
//! enforcement pipeline as HTTP, gRPC, and database capabilities.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};

use sark_domain::TransportKind;
use sark_mcp::McpManager;

use crate::adapter::{check_payload_size, with_deadline, Adapter};
use crate::types::{AdapterError, DiscoveredCapability, DiscoveredResource, Invocation, InvocationResult};

pub struct McpAdapter {
    manager: Arc<McpManager>,
}

impl McpAdapter {
    pub fn new(manager: Arc<McpManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Adapter for McpAdapter {
    fn protocol_name(&self) -> &str {
        "mcp"
    }

    fn protocol_version(&self) -> &str {
        "2024-11-05"
    }

    /// `config` is ignored: MCP servers are already connected via
    /// `sark-mcp`'s own config at startup. This enumerates the servers
    /// currently live in the shared manager.
    async fn discover_resources(&self, _config: &Value) -> Result<Vec<DiscoveredResource>, AdapterError> {
        let mut server_ids = HashSet::new();
        for (server_id, _) in self.manager.list_tools() {
            server_ids.insert(server_id.to_string());
        }

        Ok(server_ids
            .into_iter()
            .map(|server_id| DiscoveredResource {
                name: server_id.clone(),
                endpoint: format!("mcp://{server_id}"),
                transport: TransportKind::Stdio,
                description: format!("MCP server {server_id}"),
                metadata: Value::Null,
            })
            .collect())
    }

    async fn get_capabilities(&self, resource: &DiscoveredResource) -> Result<Vec<DiscoveredCapability>, AdapterError> {
        Ok(self
            .manager
            .list_tools()
            .into_iter()
            .filter(|(server_id, _)| *server_id == resource.name)
            .map(|(_, tool)| {
                let sensitivity_hint = sark_classifier::detect(&tool.name, Some(&tool.description), Some(&tool.input_schema));
                DiscoveredCapability {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    input_schema: tool.input_schema.clone(),
                    sensitivity_hint,
                    metadata: Value::Null,
                }
            })
            .collect())
    }

    fn validate_request(&self, invocation: &Invocation) -> Result<(), AdapterError> {
        check_payload_size(&invocation.arguments)
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationResult, AdapterError> {
        self.validate_request(invocation)?;
        let started = Instant::now();
        let server_id = invocation.resource.name.clone();
        let tool_name = invocation.capability_name.clone();
        let arguments = invocation.arguments.clone();

        let call = async { self.manager.call_tool(&server_id, &tool_name, arguments).await.map_err(AdapterError::from) };

        match with_deadline(invocation.deadline, call).await {
            Ok(result) => {
                let payload = json!({
                    "content": result.content.into_iter().map(|c| json!({ "type": c.content_type, "text": c.text })).collect::<Vec<_>>(),
                });
                let duration_ms = started.elapsed().as_millis() as u64;
                if result.is_error {
                    Ok(InvocationResult::failed("MCP tool reported isError", duration_ms))
                } else {
                    Ok(InvocationResult::ok(payload, duration_ms))
                }
            }
            Err(err) => Ok(InvocationResult::failed(err.to_string(), started.elapsed().as_millis() as u64)),
        }
    }

    async fn health_check(&self, resource: &DiscoveredResource) -> bool {
        self.manager.list_tools().iter().any(|(server_id, _)| *server_id == resource.name)
    }
}

impl From<sark_mcp::McpError> for AdapterError {
    fn from(err: sark_mcp::McpError) -> Self {
        AdapterError::Invocation(err.to_string())
    }
}
