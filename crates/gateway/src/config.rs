//! Gateway-local config wrapper.
//!
//! `sark_domain::config::Config` has no `mcp` field — `sark-domain` depends
//! on nothing else in the workspace, and MCP server definitions belong to
//! `sark-mcp`. The gateway is the first crate allowed to know about both, so
//! it flattens them into one TOML document here rather than growing a
//! `sark-domain` -> `sark-mcp` dependency.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(flatten)]
    pub core: sark_domain::config::Config,
    #[serde(default)]
    pub mcp: sark_mcp::McpConfig,
}
