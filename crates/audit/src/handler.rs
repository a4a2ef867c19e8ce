use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use sark_domain::AuditEvent;

use crate::alerts::{ErrorAlert, ErrorRecord};
use crate::error::{classify_error, recovery_strategy, ErrorCategory, RecoveryStrategy, SinkError};
use crate::fallback::FallbackLogger;

#[derive(Debug, Clone)]
pub struct ErrorHandlerConfig {
    pub fallback_log_dir: PathBuf,
    pub enable_fallback: bool,
    pub max_error_history: usize,
    pub max_fallback_file_size_mb: u64,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            fallback_log_dir: PathBuf::from("./audit-fallback"),
            enable_fallback: true,
            max_error_history: 500,
            max_fallback_file_size_mb: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorHandlerMetrics {
    pub total_errors: u64,
    pub fallback_count: u64,
    pub errors_by_category: HashMap<&'static str, u64>,
}

/// Central error-classification point shared by every sink's batch worker:
/// classifies the failure, decides a recovery strategy, records history,
/// routes to the fallback logger, and runs registered alerts.
pub struct ErrorHandler {
    pub(crate) fallback: Option<FallbackLogger>,
    history: RwLock<VecDeque<ErrorRecord>>,
    max_error_history: usize,
    total_errors: AtomicU64,
    fallback_count: AtomicU64,
    by_category: RwLock<HashMap<&'static str, u64>>,
    alerts: RwLock<Vec<Arc<ErrorAlert>>>,
}

fn category_name(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Network => "network",
        ErrorCategory::Timeout => "timeout",
        ErrorCategory::Authentication => "authentication",
        ErrorCategory::RateLimit => "rate_limit",
        ErrorCategory::Validation => "validation",
        ErrorCategory::Unknown => "unknown",
    }
}

impl ErrorHandler {
    pub fn new(config: ErrorHandlerConfig) -> Self {
        let fallback = config
            .enable_fallback
            .then(|| FallbackLogger::new(config.fallback_log_dir.clone(), config.max_fallback_file_size_mb));
        Self {
            fallback,
            history: RwLock::new(VecDeque::with_capacity(config.max_error_history)),
            max_error_history: config.max_error_history,
            total_errors: AtomicU64::new(0),
            fallback_count: AtomicU64::new(0),
            by_category: RwLock::new(HashMap::new()),
            alerts: RwLock::new(Vec::new()),
        }
    }

    pub fn add_alert(&self, alert: ErrorAlert) {
        self.alerts.write().push(Arc::new(alert));
    }

    /// Classify `err`, decide the recovery strategy, and fall back the
    /// single `event` (if present and the strategy calls for it).
    pub async fn handle_error(&self, err: SinkError, event: Option<&AuditEvent>) -> RecoveryStrategy {
        let strategy = self.record_and_classify(&err);
        if strategy == RecoveryStrategy::Fallback {
            if let (Some(fb), Some(event)) = (&self.fallback, event) {
                fb.log_event(event);
                self.fallback_count.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.check_alerts();
        strategy
    }

    /// Same classification as [`Self::handle_error`] but fans the fallback
    /// write out across every event in a failed batch.
    pub async fn handle_batch_failure(&self, err: SinkError, events: &[AuditEvent]) -> RecoveryStrategy {
        let strategy = self.record_and_classify(&err);
        if strategy == RecoveryStrategy::Fallback {
            if let Some(fb) = &self.fallback {
                for event in events {
                    fb.log_event(event);
                }
                self.fallback_count.fetch_add(events.len() as u64, Ordering::SeqCst);
            }
        }
        self.check_alerts();
        strategy
    }

    fn record_and_classify(&self, err: &SinkError) -> RecoveryStrategy {
        let (category, severity) = classify_error(err);
        let strategy = recovery_strategy(category, severity);
        self.total_errors.fetch_add(1, Ordering::SeqCst);
        *self.by_category.write().entry(category_name(category)).or_insert(0) += 1;
        let mut history = self.history.write();
        if history.len() >= self.max_error_history {
            history.pop_front();
        }
        history.push_back(ErrorRecord {
            category,
            severity,
            message: err.to_string(),
            at: Utc::now(),
        });
        strategy
    }

    fn check_alerts(&self) {
        let snapshot: Vec<ErrorRecord> = self.history.read().iter().cloned().collect();
        let alerts = self.alerts.read().clone();
        for alert in alerts {
            alert.maybe_fire(&snapshot);
        }
    }

    pub fn metrics(&self) -> ErrorHandlerMetrics {
        ErrorHandlerMetrics {
            total_errors: self.total_errors.load(Ordering::SeqCst),
            fallback_count: self.fallback_count.load(Ordering::SeqCst),
            errors_by_category: self.by_category.read().clone(),
        }
    }

    pub fn recent_errors(&self, count: usize) -> Vec<ErrorRecord> {
        let history = self.history.read();
        history.iter().rev().take(count).cloned().collect()
    }

    #[cfg(test)]
    pub fn inject_for_test(&self, record: ErrorRecord) {
        self.history.write().push_back(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::critical_error_condition;
    use crate::error::ErrorSeverity;
    use sark_domain::{AuditEventKind, AuditSeverity};
    use std::sync::atomic::AtomicBool;
    use uuid::Uuid;

    fn event() -> AuditEvent {
        AuditEvent::new(AuditEventKind::ToolInvoked, AuditSeverity::Medium, Uuid::new_v4())
    }

    fn handler(dir: &std::path::Path) -> ErrorHandler {
        ErrorHandler::new(ErrorHandlerConfig {
            fallback_log_dir: dir.to_path_buf(),
            enable_fallback: true,
            max_error_history: 10,
            max_fallback_file_size_mb: 100,
        })
    }

    #[tokio::test]
    async fn basic_error_increments_total_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        handler.handle_error(SinkError::Other("boom".into()), None).await;
        assert_eq!(handler.metrics().total_errors, 1);
        assert_eq!(handler.recent_errors(10).len(), 1);
    }

    #[tokio::test]
    async fn network_error_with_event_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        let event = event();
        let strategy = handler.handle_error(SinkError::Network("refused".into()), Some(&event)).await;
        assert_eq!(strategy, RecoveryStrategy::Fallback);
        assert_eq!(handler.metrics().fallback_count, 1);
    }

    #[tokio::test]
    async fn metrics_track_by_category() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        handler.handle_error(SinkError::Network("refused".into()), None).await;
        handler.handle_error(SinkError::Validation("bad".into()), None).await;
        handler.handle_error(SinkError::Other("401 unauthorized".into()), None).await;
        let metrics = handler.metrics();
        assert_eq!(metrics.total_errors, 3);
        assert_eq!(*metrics.errors_by_category.get("network").unwrap(), 1);
        assert_eq!(*metrics.errors_by_category.get("validation").unwrap(), 1);
        assert_eq!(*metrics.errors_by_category.get("authentication").unwrap(), 1);
    }

    #[tokio::test]
    async fn history_respects_max_size_but_total_keeps_counting() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        for i in 0..15 {
            handler.handle_error(SinkError::Other(format!("error {i}")), None).await;
        }
        assert_eq!(handler.recent_errors(100).len(), 10);
        assert_eq!(handler.metrics().total_errors, 15);
    }

    #[tokio::test]
    async fn fallback_disabled_never_logs_or_counts() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ErrorHandler::new(ErrorHandlerConfig {
            fallback_log_dir: dir.path().to_path_buf(),
            enable_fallback: false,
            max_error_history: 10,
            max_fallback_file_size_mb: 100,
        });
        let event = event();
        handler.handle_error(SinkError::Network("refused".into()), Some(&event)).await;
        assert!(handler.fallback.is_none());
        assert_eq!(handler.metrics().fallback_count, 0);
    }

    #[tokio::test]
    async fn alert_fires_on_matching_error() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        handler.add_alert(ErrorAlert::new(
            "any_error",
            Arc::new(|errors: &[ErrorRecord]| !errors.is_empty()),
            Arc::new(move |_| fired2.store(true, Ordering::SeqCst)),
            std::time::Duration::from_secs(60),
        ));
        handler.handle_error(SinkError::Other("boom".into()), None).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn critical_condition_alert_sees_injected_critical_record() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        let seen = Arc::new(RwLock::new(Vec::new()));
        let seen2 = seen.clone();
        handler.add_alert(ErrorAlert::new(
            "critical",
            Arc::new(critical_error_condition),
            Arc::new(move |errors: &[ErrorRecord]| {
                *seen2.write() = errors.to_vec();
            }),
            std::time::Duration::from_secs(60),
        ));
        handler.inject_for_test(ErrorRecord {
            category: ErrorCategory::Unknown,
            severity: ErrorSeverity::Critical,
            message: "critical failure".into(),
            at: Utc::now(),
        });
        handler.check_alerts();
        assert!(!seen.read().is_empty());
    }
}
