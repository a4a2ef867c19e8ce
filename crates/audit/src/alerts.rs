use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::error::{ErrorCategory, ErrorSeverity};

#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    pub at: DateTime<Utc>,
}

pub type AlertCondition = Arc<dyn Fn(&[ErrorRecord]) -> bool + Send + Sync>;
pub type AlertCallback = Arc<dyn Fn(&[ErrorRecord]) + Send + Sync>;

/// A user-registered predicate over the recent-error window. Fires
/// `callback` the first time `condition` holds, then suppresses repeat
/// fires until `cooldown` elapses.
pub struct ErrorAlert {
    pub name: String,
    condition: AlertCondition,
    callback: AlertCallback,
    cooldown: Duration,
    last_fired: RwLock<Option<Instant>>,
    fire_count: AtomicU64,
}

impl ErrorAlert {
    pub fn new(
        name: impl Into<String>,
        condition: AlertCondition,
        callback: AlertCallback,
        cooldown: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            condition,
            callback,
            cooldown,
            last_fired: RwLock::new(None),
            fire_count: AtomicU64::new(0),
        }
    }

    pub fn maybe_fire(&self, errors: &[ErrorRecord]) {
        if !(self.condition)(errors) {
            return;
        }
        {
            let mut last = self.last_fired.write();
            if let Some(t) = *last {
                if t.elapsed() < self.cooldown {
                    return;
                }
            }
            *last = Some(Instant::now());
        }
        self.fire_count.fetch_add(1, Ordering::SeqCst);
        (self.callback)(errors);
    }

    pub fn fire_count(&self) -> u64 {
        self.fire_count.load(Ordering::SeqCst)
    }
}

pub fn high_error_rate_condition(errors: &[ErrorRecord], threshold: usize, window_seconds: i64) -> bool {
    let cutoff = Utc::now() - chrono::Duration::seconds(window_seconds);
    errors.iter().filter(|e| e.at >= cutoff).count() >= threshold
}

pub fn critical_error_condition(errors: &[ErrorRecord]) -> bool {
    errors.iter().any(|e| e.severity == ErrorSeverity::Critical)
}

pub fn auth_failure_condition(errors: &[ErrorRecord]) -> bool {
    errors.iter().any(|e| e.category == ErrorCategory::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: ErrorCategory, severity: ErrorSeverity) -> ErrorRecord {
        ErrorRecord {
            category,
            severity,
            message: "test".into(),
            at: Utc::now(),
        }
    }

    #[test]
    fn high_error_rate_below_threshold_is_false() {
        let errors: Vec<_> = (0..5).map(|_| record(ErrorCategory::Unknown, ErrorSeverity::Low)).collect();
        assert!(!high_error_rate_condition(&errors, 10, 60));
    }

    #[test]
    fn high_error_rate_above_threshold_is_true() {
        let errors: Vec<_> = (0..15).map(|_| record(ErrorCategory::Unknown, ErrorSeverity::Low)).collect();
        assert!(high_error_rate_condition(&errors, 10, 60));
    }

    #[test]
    fn critical_error_condition_detects_critical() {
        let errors = vec![record(ErrorCategory::Unknown, ErrorSeverity::Critical)];
        assert!(critical_error_condition(&errors));
        let errors = vec![record(ErrorCategory::Unknown, ErrorSeverity::Low)];
        assert!(!critical_error_condition(&errors));
    }

    #[test]
    fn auth_failure_condition_detects_authentication_category() {
        let errors = vec![record(ErrorCategory::Authentication, ErrorSeverity::High)];
        assert!(auth_failure_condition(&errors));
        let errors = vec![record(ErrorCategory::Network, ErrorSeverity::Low)];
        assert!(!auth_failure_condition(&errors));
    }

    #[test]
    fn alert_fires_once_then_respects_cooldown() {
        let fired = Arc::new(AtomicU64::new(0));
        let fired2 = fired.clone();
        let alert = ErrorAlert::new(
            "test",
            Arc::new(|errors: &[ErrorRecord]| !errors.is_empty()),
            Arc::new(move |_| {
                fired2.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_secs(60),
        );
        let errors = vec![record(ErrorCategory::Unknown, ErrorSeverity::Low)];
        alert.maybe_fire(&errors);
        alert.maybe_fire(&errors);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(alert.fire_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn alert_fires_again_after_cooldown_elapses() {
        let fired = Arc::new(AtomicU64::new(0));
        let fired2 = fired.clone();
        let alert = ErrorAlert::new(
            "test",
            Arc::new(|_: &[ErrorRecord]| true),
            Arc::new(move |_| {
                fired2.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_secs(1),
        );
        let errors = vec![record(ErrorCategory::Unknown, ErrorSeverity::Low)];
        alert.maybe_fire(&errors);
        alert.maybe_fire(&errors);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        tokio::time::advance(Duration::from_millis(1100)).await;
        alert.maybe_fire(&errors);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
