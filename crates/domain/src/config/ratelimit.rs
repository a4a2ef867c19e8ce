use serde::{Deserialize, Serialize};

/// Rate limit configuration (C5). `store` selects the backing counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_per_api_key")]
    pub per_api_key_limit: u64,
    #[serde(default = "d_per_user")]
    pub per_user_limit: u64,
    #[serde(default = "d_per_ip")]
    pub per_ip_limit: u64,
    #[serde(default = "d_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "d_true")]
    pub admin_bypass: bool,
    #[serde(default)]
    pub store: RateLimitStore,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: d_true(),
            per_api_key_limit: d_per_api_key(),
            per_user_limit: d_per_user(),
            per_ip_limit: d_per_ip(),
            window_seconds: d_window_seconds(),
            admin_bypass: d_true(),
            store: RateLimitStore::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RateLimitStore {
    Memory,
    Redis { url: String },
}

impl Default for RateLimitStore {
    fn default() -> Self {
        RateLimitStore::Memory
    }
}

fn d_true() -> bool {
    true
}
fn d_per_api_key() -> u64 {
    1000
}
fn d_per_user() -> u64 {
    5000
}
fn d_per_ip() -> u64 {
    100
}
fn d_window_seconds() -> u64 {
    3600
}
