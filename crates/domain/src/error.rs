use std::fmt;

/// Stable error taxonomy surfaced across every SARK crate.
///
/// Each variant maps to exactly one HTTP status in `sark-gateway`; the
/// mapping lives there, not here, since `sark-domain` must not depend on
/// `axum`.
#[derive(thiserror::Error, Debug)]
pub enum SarkError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {reason}")]
    ForbiddenPolicy { reason: String },

    #[error("forbidden: budget exceeded ({period})")]
    ForbiddenBudget { period: BudgetPeriod, reason: String },

    #[error("forbidden: time rule \"{rule}\"")]
    ForbiddenTime { rule: String },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    #[error("downstream error: {0}")]
    DownstreamError(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl SarkError {
    /// The machine-readable error class used in HTTP bodies and audit events.
    pub fn class(&self) -> &'static str {
        match self {
            SarkError::Unauthenticated => "unauthenticated",
            SarkError::ForbiddenPolicy { .. } => "forbidden_policy",
            SarkError::ForbiddenBudget { .. } => "forbidden_budget",
            SarkError::ForbiddenTime { .. } => "forbidden_time",
            SarkError::RateLimited { .. } => "rate_limited",
            SarkError::NotFound(_) => "not_found",
            SarkError::Conflict(_) => "conflict",
            SarkError::Validation(_) => "validation",
            SarkError::DownstreamUnavailable(_) => "downstream_unavailable",
            SarkError::DownstreamError(_) => "downstream_error",
            SarkError::Internal(_) => "internal",
        }
    }

    /// Construct an `internal` error from a lower-level error's type name,
    /// never its `Display` output — the taxonomy promises no leaked detail.
    pub fn internal_from<E: std::error::Error>(class_hint: &str, _err: &E) -> Self {
        SarkError::Internal(class_hint.to_string())
    }
}

/// Budget period named in a `forbidden_budget` denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetPeriod {
    Daily,
    Monthly,
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetPeriod::Daily => write!(f, "daily"),
            BudgetPeriod::Monthly => write!(f, "monthly"),
        }
    }
}

pub type Result<T> = std::result::Result<T, SarkError>;
