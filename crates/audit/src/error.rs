use std::fmt;

/// Classification buckets a sink send failure falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Network,
    Timeout,
    Authentication,
    RateLimit,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryStrategy {
    Retry,
    Fallback,
    Skip,
    CircuitBreak,
    Alert,
}

/// Error a sink implementation reports back to the pipeline. Transport
/// errors carry their own variant so classification doesn't need to sniff
/// text for the common cases; `Other` covers everything a sink can't place
/// more precisely.
#[derive(Debug, Clone)]
pub enum SinkError {
    Network(String),
    Timeout(String),
    Validation(String),
    Http { status: u16, body: String },
    Other(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Network(msg) => write!(f, "network error: {msg}"),
            SinkError::Timeout(msg) => write!(f, "timeout: {msg}"),
            SinkError::Validation(msg) => write!(f, "validation error: {msg}"),
            SinkError::Http { status, body } => write!(f, "http {status}: {body}"),
            SinkError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

fn classify_http(status: u16) -> (ErrorCategory, ErrorSeverity) {
    match status {
        401 | 403 => (ErrorCategory::Authentication, ErrorSeverity::High),
        429 => (ErrorCategory::RateLimit, ErrorSeverity::Low),
        400..=499 => (ErrorCategory::Validation, ErrorSeverity::Medium),
        _ => (ErrorCategory::Unknown, ErrorSeverity::Medium),
    }
}

fn classify_message(msg: &str) -> (ErrorCategory, ErrorSeverity) {
    let lower = msg.to_lowercase();
    if lower.contains("401") || lower.contains("unauthorized") || lower.contains("403") {
        (ErrorCategory::Authentication, ErrorSeverity::High)
    } else if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit") {
        (ErrorCategory::RateLimit, ErrorSeverity::Low)
    } else if lower.contains("timeout") || lower.contains("timed out") {
        (ErrorCategory::Timeout, ErrorSeverity::Medium)
    } else if lower.contains("connection") || lower.contains("network") || lower.contains("unreachable") {
        (ErrorCategory::Network, ErrorSeverity::Medium)
    } else {
        (ErrorCategory::Unknown, ErrorSeverity::Medium)
    }
}

pub fn classify_error(err: &SinkError) -> (ErrorCategory, ErrorSeverity) {
    match err {
        SinkError::Network(_) => (ErrorCategory::Network, ErrorSeverity::Medium),
        SinkError::Timeout(_) => (ErrorCategory::Timeout, ErrorSeverity::Medium),
        SinkError::Validation(_) => (ErrorCategory::Validation, ErrorSeverity::Medium),
        SinkError::Http { status, .. } => classify_http(*status),
        SinkError::Other(msg) => classify_message(msg),
    }
}

/// Critical severity always escalates to an alert regardless of category;
/// below that, the category decides.
pub fn recovery_strategy(category: ErrorCategory, severity: ErrorSeverity) -> RecoveryStrategy {
    if severity == ErrorSeverity::Critical {
        return RecoveryStrategy::Alert;
    }
    match category {
        ErrorCategory::Authentication => RecoveryStrategy::CircuitBreak,
        ErrorCategory::RateLimit => RecoveryStrategy::Retry,
        ErrorCategory::Validation => RecoveryStrategy::Skip,
        ErrorCategory::Network | ErrorCategory::Timeout => RecoveryStrategy::Fallback,
        ErrorCategory::Unknown if severity == ErrorSeverity::High => RecoveryStrategy::CircuitBreak,
        ErrorCategory::Unknown => RecoveryStrategy::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_network_error() {
        assert_eq!(
            classify_error(&SinkError::Network("refused".into())),
            (ErrorCategory::Network, ErrorSeverity::Medium)
        );
    }

    #[test]
    fn classifies_timeout_error() {
        assert_eq!(
            classify_error(&SinkError::Timeout("deadline".into())),
            (ErrorCategory::Timeout, ErrorSeverity::Medium)
        );
    }

    #[test]
    fn classifies_auth_from_message() {
        assert_eq!(
            classify_error(&SinkError::Other("401 unauthorized".into())),
            (ErrorCategory::Authentication, ErrorSeverity::High)
        );
    }

    #[test]
    fn classifies_rate_limit_from_message() {
        assert_eq!(
            classify_error(&SinkError::Other("429 too many requests".into())),
            (ErrorCategory::RateLimit, ErrorSeverity::Low)
        );
    }

    #[test]
    fn classifies_validation_error() {
        assert_eq!(
            classify_error(&SinkError::Validation("invalid data format".into())),
            (ErrorCategory::Validation, ErrorSeverity::Medium)
        );
    }

    #[test]
    fn classifies_unknown_message() {
        assert_eq!(
            classify_error(&SinkError::Other("something went wrong".into())),
            (ErrorCategory::Unknown, ErrorSeverity::Medium)
        );
    }

    #[test]
    fn critical_errors_always_alert() {
        assert_eq!(
            recovery_strategy(ErrorCategory::Validation, ErrorSeverity::Critical),
            RecoveryStrategy::Alert
        );
    }

    #[test]
    fn auth_error_circuit_breaks() {
        assert_eq!(
            recovery_strategy(ErrorCategory::Authentication, ErrorSeverity::High),
            RecoveryStrategy::CircuitBreak
        );
    }

    #[test]
    fn rate_limit_retries() {
        assert_eq!(
            recovery_strategy(ErrorCategory::RateLimit, ErrorSeverity::Low),
            RecoveryStrategy::Retry
        );
    }

    #[test]
    fn validation_skips() {
        assert_eq!(
            recovery_strategy(ErrorCategory::Validation, ErrorSeverity::Medium),
            RecoveryStrategy::Skip
        );
    }

    #[test]
    fn network_falls_back() {
        assert_eq!(
            recovery_strategy(ErrorCategory::Network, ErrorSeverity::Medium),
            RecoveryStrategy::Fallback
        );
    }
}
