use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decision Cache configuration (C1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "d_max_size")]
    pub max_size: usize,
    #[serde(default = "d_default_ttl")]
    pub default_ttl_seconds: u64,
    /// Per-sensitivity TTL overrides; unset sensitivities fall back to the
    /// table in §4.1 (critical=60s, high=120s, medium=180s, low=300s).
    #[serde(default)]
    pub ttl_overrides_seconds: HashMap<String, u64>,
    #[serde(default = "d_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: d_max_size(),
            default_ttl_seconds: d_default_ttl(),
            ttl_overrides_seconds: HashMap::new(),
            sweep_interval_seconds: d_sweep_interval(),
        }
    }
}

fn d_max_size() -> usize {
    10_000
}
fn d_default_ttl() -> u64 {
    180
}
fn d_sweep_interval() -> u64 {
    60
}
