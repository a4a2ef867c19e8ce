use sark_domain::entities::RateInfo;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("rate limit backend unavailable: {0}")]
    Unavailable(String),
}

/// Pluggable counter backend. Errors propagate to the caller, which is
/// responsible for failing open per the rate limiter's contract.
#[async_trait::async_trait]
pub trait RateLimitBackend: Send + Sync {
    async fn check(&self, identifier: &str, limit: u64, window_seconds: u64) -> Result<RateInfo, BackendError>;
}

/// In-memory sliding-window counter, the same weighted-overlap approximation
/// as Cloudflare's: the current fixed window is tracked exactly, and the
/// immediately preceding window's count still contributes a fraction of
/// itself proportional to how much of it overlaps the trailing `window`
/// from `now`. That fraction decays linearly from 1.0 at the start of the
/// current window to 0.0 at its end, so a burst that lands right at a
/// fixed-window boundary can no longer admit `2 * limit` requests the way a
/// plain tumbling window would. Sufficient for a single instance; a shared
/// backend is required for horizontal scale-out.
pub struct MemoryBackend {
    state: parking_lot::RwLock<std::collections::HashMap<String, WindowState>>,
}

struct WindowState {
    current_start: i64,
    current_count: u64,
    previous_count: u64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: parking_lot::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RateLimitBackend for MemoryBackend {
    async fn check(&self, identifier: &str, limit: u64, window_seconds: u64) -> Result<RateInfo, BackendError> {
        let now = chrono::Utc::now().timestamp();
        let window_seconds_i = window_seconds.max(1) as i64;
        let current_start = now - now.rem_euclid(window_seconds_i);
        let reset_at = current_start + window_seconds_i;

        let mut map = self.state.write();
        let entry = map.entry(identifier.to_string()).or_insert(WindowState {
            current_start,
            current_count: 0,
            previous_count: 0,
        });

        if entry.current_start != current_start {
            entry.previous_count = if current_start == entry.current_start + window_seconds_i {
                entry.current_count
            } else {
                0
            };
            entry.current_start = current_start;
            entry.current_count = 0;
        }

        let elapsed = (now - current_start).max(0) as f64;
        let weight = ((window_seconds_i as f64 - elapsed) / window_seconds_i as f64).clamp(0.0, 1.0);
        let weighted = entry.previous_count as f64 * weight + entry.current_count as f64;

        if weighted < limit as f64 {
            entry.current_count += 1;
            let remaining_weighted = limit as f64 - (weighted + 1.0);
            Ok(RateInfo {
                allowed: true,
                limit,
                remaining: remaining_weighted.max(0.0) as u64,
                reset_at,
                retry_after: None,
            })
        } else {
            let retry_after = (reset_at - now).max(0) as u64;
            Ok(RateInfo {
                allowed: false,
                limit,
                remaining: 0,
                reset_at,
                retry_after: Some(retry_after),
            })
        }
    }
}
