use std::sync::Arc;

use sark_domain::config::RateLimitConfig;
use sark_domain::entities::RateInfo;

use crate::backend::{MemoryBackend, RateLimitBackend};
use crate::identifier::{Identifier, IdentityHints};

/// Paths that are always exempt from rate limiting, regardless of config.
const BYPASS_PATHS: &[&str] = &["/healthz", "/health", "/metrics"];

pub struct RateLimiter {
    config: RateLimitConfig,
    backend: Arc<dyn RateLimitBackend>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, backend: Arc<dyn RateLimitBackend>) -> Self {
        Self { config, backend }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(MemoryBackend::new()))
    }

    fn limit_for(&self, identifier: &Identifier) -> u64 {
        match identifier {
            Identifier::ApiKey(_) => self.config.per_api_key_limit,
            Identifier::User(_) => self.config.per_user_limit,
            Identifier::TokenHash(_) => self.config.per_user_limit,
            Identifier::Ip(_) => self.config.per_ip_limit,
        }
    }

    /// Evaluate a request. `path` bypasses for health/metrics; `is_admin`
    /// bypasses when `admin_bypass` is configured on.
    pub async fn check(&self, path: &str, is_admin: bool, hints: &IdentityHints<'_>) -> RateInfo {
        let now = chrono::Utc::now().timestamp();

        if !self.config.enabled || BYPASS_PATHS.contains(&path) {
            return RateInfo::unlimited(now);
        }
        if is_admin && self.config.admin_bypass {
            return RateInfo::unlimited(now);
        }

        let identifier = Identifier::resolve(hints);
        let limit = self.limit_for(&identifier);

        match self
            .backend
            .check(&identifier.as_key(), limit, self.config.window_seconds)
            .await
        {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, "rate limit backend error, failing open");
                RateInfo {
                    allowed: true,
                    limit,
                    remaining: limit,
                    reset_at: now + self.config.window_seconds as i64,
                    retry_after: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints(ip: &str) -> IdentityHints<'static> {
        IdentityHints {
            api_key: None,
            principal_id: None,
            bearer_token: None,
            forwarded_for: None,
            real_ip: None,
            peer_addr: Box::leak(ip.to_string().into_boxed_str()),
        }
    }

    #[tokio::test]
    async fn bypass_path_is_unlimited() {
        let limiter = RateLimiter::in_memory(RateLimitConfig::default());
        let info = limiter.check("/metrics", false, &hints("1.1.1.1")).await;
        assert_eq!(info.limit, u64::MAX);
    }

    #[tokio::test]
    async fn admin_bypass_when_enabled() {
        let mut config = RateLimitConfig::default();
        config.admin_bypass = true;
        let limiter = RateLimiter::in_memory(config);
        let info = limiter.check("/v1/tools", true, &hints("1.1.1.1")).await;
        assert_eq!(info.limit, u64::MAX);
    }

    #[tokio::test]
    async fn ip_identifier_uses_per_ip_limit() {
        let mut config = RateLimitConfig::default();
        config.per_ip_limit = 2;
        let limiter = RateLimiter::in_memory(config);
        assert!(limiter.check("/v1/tools", false, &hints("9.9.9.9")).await.allowed);
        assert!(limiter.check("/v1/tools", false, &hints("9.9.9.9")).await.allowed);
        assert!(!limiter.check("/v1/tools", false, &hints("9.9.9.9")).await.allowed);
    }

    #[tokio::test]
    async fn disabled_config_is_always_unlimited() {
        let mut config = RateLimitConfig::default();
        config.enabled = false;
        let limiter = RateLimiter::in_memory(config);
        let info = limiter.check("/v1/tools", false, &hints("9.9.9.9")).await;
        assert_eq!(info.limit, u64::MAX);
    }
}
