//! Request authentication for `/api/v1/*` plus the principal login/refresh
//! endpoints backed by [`crate::principal_store::PrincipalStore`].
//!
//! Two credentials are accepted on `Authorization: Bearer <token>`:
//! - A principal's session access token, minted by `login`/`refresh` and
//!   validated against [`crate::principal_store::PrincipalStore`]. This is
//!   the normal path: every enforcement decision needs a `Principal` to
//!   evaluate budget/governance/policy against.
//! - The static service token named by `config.admin.api_token_env`
//!   (default `SARK_API_TOKEN`, checked once at startup, hashed in
//!   `AppState`). Callers presenting it run as a synthetic system
//!   principal with the `admin` role — for trusted internal callers
//!   (schedulers, sidecars) that have no human principal to attribute to.
//!
//! If neither `SARK_API_TOKEN` is configured nor the token resolves to a
//! principal, the request is rejected with 401 — except in full dev mode
//! (`SARK_API_TOKEN` unset), where an unrecognized token is treated as the
//! synthetic system principal so local development doesn't need a login
//! round-trip.
//!
//! `login`/`refresh` are a different concern: SARK doesn't replace the
//! source of truth for user identity (no LDAP/SAML/OIDC wire protocol is
//! implemented here), so a login call attests that the caller already
//! completed the named provider's out-of-band handshake by presenting the
//! shared secret named in that provider's `credential_env`, plus the
//! principal attributes the provider resolved. SARK mints and owns the
//! session tokens from that point on.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use sark_domain::entities::Principal;
use sark_domain::error::SarkError;

use crate::error::ApiError;
use crate::state::AppState;

fn access_token_ttl() -> Duration {
    Duration::minutes(15)
}

fn refresh_token_ttl() -> Duration {
    Duration::days(7)
}

fn system_principal() -> Principal {
    Principal {
        id: Uuid::nil(),
        email: "system@sark.internal".into(),
        roles: vec!["admin".into()],
        groups: vec![],
        mfa_verified: true,
        source_provider: "system".into(),
    }
}

/// Axum middleware that resolves the calling [`Principal`] (session token
/// or the static service token) and attaches it to the request so
/// [`CurrentPrincipal`] can extract it downstream. Attach via
/// `axum::middleware::from_fn_with_state`.
pub async fn require_principal(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let provided = {
        let headers = req.headers();
        headers
            .get("authorization")
            .and_then(|v: &axum::http::HeaderValue| v.to_str().ok())
            .and_then(|v: &str| v.strip_prefix("Bearer "))
            .unwrap_or("")
            .to_string()
    };

    if let Some(expected_hash) = &state.api_token_hash {
        let provided_hash = Sha256::digest(provided.as_bytes());
        if bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
            req.extensions_mut().insert(system_principal());
            return next.run(req).await;
        }
    }

    if let Some(principal) = state.principals.authenticate(&provided) {
        req.extensions_mut().insert(principal);
        return next.run(req).await;
    }

    if state.api_token_hash.is_none() {
        req.extensions_mut().insert(system_principal());
        return next.run(req).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "error": "invalid or missing bearer token" })),
    )
        .into_response()
}

/// The authenticated principal attributed to the current request. Only
/// usable on routes behind [`require_principal`], which always inserts one.
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or_else(|| SarkError::Internal("no principal attached to request".into()).into())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginPrincipal {
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub mfa_verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Proves the caller already completed this provider's out-of-band
    /// handshake; compared against the provider's `credential_env` secret.
    pub assertion_secret: String,
    pub principal: LoginPrincipal,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Principal,
}

pub async fn login(
    Path(provider): Path<String>,
    State(state): State<AppState>,
    axum::Json(req): axum::Json<LoginRequest>,
) -> Result<axum::Json<SessionResponse>, ApiError> {
    let provider_config = state
        .config
        .core
        .identity
        .providers
        .iter()
        .find(|p| p.id == provider)
        .ok_or_else(|| SarkError::NotFound(format!("identity provider '{provider}'")))?;

    let expected = std::env::var(&provider_config.credential_env)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SarkError::DownstreamUnavailable(format!("{} is unset", provider_config.credential_env)))?;

    let provided_hash = Sha256::digest(req.assertion_secret.as_bytes());
    let expected_hash = Sha256::digest(expected.as_bytes());
    if !bool::from(provided_hash.ct_eq(&expected_hash)) {
        return Err(SarkError::Unauthenticated.into());
    }

    let principal = Principal {
        id: Uuid::new_v4(),
        email: req.principal.email,
        roles: req.principal.roles,
        groups: req.principal.groups,
        mfa_verified: req.principal.mfa_verified,
        source_provider: provider_config.id.clone(),
    };

    let session = state.principals.issue(principal, access_token_ttl(), refresh_token_ttl());
    Ok(axum::Json(SessionResponse {
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        user: session.principal,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<RefreshRequest>,
) -> Result<axum::Json<SessionResponse>, ApiError> {
    let session = state
        .principals
        .refresh(&req.refresh_token, access_token_ttl())
        .ok_or(SarkError::Unauthenticated)?;

    Ok(axum::Json(SessionResponse {
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        user: session.principal,
    }))
}
