//! Redis-backed counter for horizontal scale-out, grounded on the pack's
//! `redis::aio::ConnectionManager` usage.

use redis::AsyncCommands;

use crate::backend::{BackendError, RateLimitBackend};
use sark_domain::entities::RateInfo;

pub struct RedisBackend {
    manager: redis::aio::ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        let client = redis::Client::open(url).map_err(|e| BackendError::Unavailable(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait::async_trait]
impl RateLimitBackend for RedisBackend {
    async fn check(&self, identifier: &str, limit: u64, window_seconds: u64) -> Result<RateInfo, BackendError> {
        let now = chrono::Utc::now().timestamp();
        let window_seconds_i = window_seconds.max(1) as i64;
        let window_start = now - now.rem_euclid(window_seconds_i);
        let reset_at = window_start + window_seconds_i;
        let key = format!("sark:ratelimit:{identifier}:{window_start}");

        let mut conn = self.manager.clone();
        let count: u64 = conn
            .incr(&key, 1u64)
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        if count == 1 {
            let _: Result<(), redis::RedisError> = conn.expire(&key, window_seconds as i64).await;
        }

        if count <= limit {
            Ok(RateInfo {
                allowed: true,
                limit,
                remaining: limit - count,
                reset_at,
                retry_after: None,
            })
        } else {
            Ok(RateInfo {
                allowed: false,
                limit,
                remaining: 0,
                reset_at,
                retry_after: Some((reset_at - now).max(0) as u64),
            })
        }
    }
}
