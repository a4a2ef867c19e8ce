//! Per-request identity hints shared by every enforcement-gated handler —
//! the same fields [`sark_ratelimit::IdentityHints`] resolves an
//! [`sark_ratelimit::Identifier`] from, collected once via an extractor so
//! `policy.rs`/`invoke.rs` don't each re-derive them from raw headers.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ClientMeta {
    pub peer_addr: String,
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for ClientMeta {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let peer_addr = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let bearer_token = header("authorization").and_then(|v| v.strip_prefix("Bearer ").map(str::to_string));

        Ok(ClientMeta {
            peer_addr,
            forwarded_for: header("x-forwarded-for"),
            real_ip: header("x-real-ip"),
            api_key: header("x-api-key"),
            bearer_token,
        })
    }
}
