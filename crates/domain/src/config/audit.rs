use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Hec,
    Datadog,
}

/// One audit sink's configuration (C10). Defaults match §4.10's numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSinkConfig {
    pub kind: SinkKind,
    pub endpoint: String,
    /// Environment variable holding the sink's auth token.
    pub token_env: String,
    pub index: Option<String>,
    #[serde(default = "d_true")]
    pub verify_ssl: bool,
    #[serde(default = "d_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "d_batch_size")]
    pub batch_size: usize,
    #[serde(default = "d_batch_timeout")]
    pub batch_timeout_seconds: u64,
    #[serde(default = "d_min_size")]
    pub compression_min_size_bytes: usize,
    #[serde(default = "d_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "d_recovery_timeout")]
    pub circuit_breaker_recovery_timeout_seconds: u64,
    #[serde(default = "d_fallback_dir")]
    pub fallback_dir: String,
    #[serde(default = "d_health_interval")]
    pub health_check_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditConfig {
    #[serde(default)]
    pub sinks: Vec<AuditSinkConfig>,
    #[serde(default = "d_fallback_dir")]
    pub fallback_dir: String,
    #[serde(default = "d_rotate_size")]
    pub fallback_rotate_bytes: u64,
}

fn d_true() -> bool {
    true
}
fn d_timeout() -> u64 {
    10
}
fn d_batch_size() -> usize {
    50
}
fn d_batch_timeout() -> u64 {
    2
}
fn d_min_size() -> usize {
    1024
}
fn d_failure_threshold() -> u32 {
    5
}
fn d_recovery_timeout() -> u64 {
    30
}
fn d_fallback_dir() -> String {
    "./audit-fallback".into()
}
fn d_health_interval() -> u64 {
    30
}
fn d_rotate_size() -> u64 {
    100 * 1024 * 1024
}
