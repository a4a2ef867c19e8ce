use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-adapter connection/timeout defaults (C8). Keyed by adapter name
/// (`http`, `grpc`, `database`, `mcp`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "d_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "d_invoke_timeout")]
    pub invoke_timeout_seconds: u64,
    #[serde(default = "d_max_payload")]
    pub max_payload_bytes: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: d_connect_timeout(),
            invoke_timeout_seconds: d_invoke_timeout(),
            max_payload_bytes: d_max_payload(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdaptersConfig {
    #[serde(default)]
    pub defaults: AdapterConfig,
    /// Overrides keyed by adapter name, merged over `defaults`.
    #[serde(default)]
    pub per_adapter: HashMap<String, AdapterConfig>,
}

impl AdaptersConfig {
    pub fn for_adapter(&self, name: &str) -> &AdapterConfig {
        self.per_adapter.get(name).unwrap_or(&self.defaults)
    }
}

fn d_connect_timeout() -> u64 {
    5
}
fn d_invoke_timeout() -> u64 {
    30
}
fn d_max_payload() -> usize {
    10 * 1024 * 1024
}
