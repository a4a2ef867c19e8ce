use serde::{Deserialize, Serialize};

/// Result of a `RateLimiter::check` call — mirrors the
/// `X-RateLimit-*`/`Retry-After` headers verbatim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateInfo {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Epoch seconds at which the current window resets.
    pub reset_at: i64,
    pub retry_after: Option<u64>,
}

impl RateInfo {
    /// Synthetic unlimited result for admin-bypass requests.
    pub fn unlimited(reset_at: i64) -> Self {
        Self {
            allowed: true,
            limit: u64::MAX,
            remaining: u64::MAX,
            reset_at,
            retry_after: None,
        }
    }
}
