//! Maps `sark_domain::error::SarkError` to the gateway's one JSON error
//! envelope. Centralized here because, unlike the teacher's handlers (each
//! building its own `(StatusCode, Json(...))` pair inline), every error in
//! this gateway already funnels through the same taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sark_domain::error::SarkError;

/// Thin wrapper so handlers can `?`-propagate a `SarkError` straight into
/// an HTTP response without an orphan-rule violation on the foreign type.
pub struct ApiError(pub SarkError);

impl From<SarkError> for ApiError {
    fn from(err: SarkError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SarkError::Unauthenticated => StatusCode::UNAUTHORIZED,
            SarkError::ForbiddenPolicy { .. }
            | SarkError::ForbiddenBudget { .. }
            | SarkError::ForbiddenTime { .. } => StatusCode::FORBIDDEN,
            SarkError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SarkError::NotFound(_) => StatusCode::NOT_FOUND,
            SarkError::Conflict(_) => StatusCode::CONFLICT,
            SarkError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SarkError::DownstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SarkError::DownstreamError(_) => StatusCode::BAD_GATEWAY,
            SarkError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let reason = self.0.to_string();
        let mut body = serde_json::json!({
            "error": self.0.class(),
            "reason": reason,
        });

        if let SarkError::RateLimited { retry_after_secs } = &self.0 {
            body["retry_after"] = serde_json::json!(retry_after_secs);
        }

        let mut response = (status, Json(body)).into_response();
        if let SarkError::RateLimited { retry_after_secs } = &self.0 {
            if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}
