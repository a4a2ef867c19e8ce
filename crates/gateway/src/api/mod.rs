pub mod admin;
pub mod approvals;
pub mod auth;
pub mod invoke;
pub mod policy;
pub mod servers;
pub mod tools;

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Three auth surfaces, same shape the teacher used for its own API/admin
/// split:
/// - `/healthz`, `/health`, `/metrics` and the login/refresh endpoints are
///   public — callers need them to even obtain a session, and uptime
///   probes can't present a bearer token.
/// - `/api/v1/*` is gated by [`auth::require_principal`], which resolves
///   either a session token or the static service token to a `Principal`.
/// - `/admin/*` is gated by [`admin::AdminGuard`] (`SARK_ADMIN_TOKEN`),
///   independent of the principal scheme above.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/healthz", get(admin::healthz))
        .route("/health", get(admin::health))
        .route("/metrics", get(admin::metrics))
        .route("/api/v1/auth/login/:provider", post(auth::login))
        .route("/api/v1/auth/refresh", post(auth::refresh));

    let api = Router::new()
        .route("/api/v1/servers", post(servers::register))
        .route("/api/v1/servers", get(servers::list))
        .route("/api/v1/servers/:id", get(servers::get))
        .route("/api/v1/servers/:id", delete(servers::delete))
        .route("/api/v1/bulk/servers/register", post(servers::bulk_register_servers))
        .route("/api/v1/bulk/servers/status", patch(servers::bulk_update_status))
        .route("/api/v1/tools", get(tools::list_tools))
        .route("/api/v1/tools/:id/sensitivity", get(tools::get_sensitivity))
        .route("/api/v1/tools/:id/sensitivity", patch(tools::set_sensitivity))
        .route("/api/v1/tools/invoke", post(invoke::invoke))
        .route("/api/v1/policy/evaluate", post(policy::evaluate))
        .route("/api/v1/approvals/request", post(approvals::request))
        .route("/api/v1/approvals", get(approvals::list))
        .route("/api/v1/approvals/:id", get(approvals::get))
        .route("/api/v1/approvals/:id/approve", post(approvals::approve))
        .route("/api/v1/approvals/:id/deny", post(approvals::deny))
        .route_layer(middleware::from_fn_with_state(state, auth::require_principal));

    // `AdminGuard` is taken as a handler argument (see `admin::rollout`)
    // rather than a `route_layer`, matching the pattern already used for
    // the dozen-plus admin handlers it was built for.
    let admin = Router::new()
        .route("/admin/rollout/set", post(admin::set))
        .route("/admin/rollout/rollback", post(admin::rollback))
        .route("/admin/rollout/rollback-all", post(admin::rollback_all))
        .route("/admin/rollout/status", get(admin::status));

    public
        .merge(api)
        .merge(admin)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
