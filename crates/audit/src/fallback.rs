use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use sark_domain::AuditEvent;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FallbackStats {
    pub log_dir: PathBuf,
    pub current_file: Option<PathBuf>,
    pub events_logged: u64,
    pub current_file_size_bytes: u64,
    pub errors: u64,
}

/// Last-resort sink for events a SIEM send couldn't deliver. Writes one JSON
/// object per line, rotating to a new file once the current one crosses
/// `max_file_size_mb`. Never returns an error to the caller: a fallback
/// write failure is itself counted, not propagated, since there is no
/// further fallback behind the fallback.
pub struct FallbackLogger {
    dir: PathBuf,
    max_file_bytes: u64,
    current_path: RwLock<Option<PathBuf>>,
    current_size: AtomicU64,
    events_logged: AtomicU64,
    errors: AtomicU64,
}

impl FallbackLogger {
    pub fn new(dir: impl Into<PathBuf>, max_file_size_mb: u64) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(error = %e, dir = %dir.display(), "failed to create audit fallback directory");
        }
        Self {
            dir,
            max_file_bytes: max_file_size_mb * 1024 * 1024,
            current_path: RwLock::new(None),
            current_size: AtomicU64::new(0),
            events_logged: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn log_event(&self, event: &AuditEvent) {
        let line = match serde_json::to_string(event) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize audit event for fallback log");
                self.errors.fetch_add(1, Ordering::SeqCst);
                return;
            }
        };
        if let Err(e) = self.append_line(&line) {
            tracing::warn!(error = %e, "failed to write audit fallback log line");
            self.errors.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.events_logged.fetch_add(1, Ordering::SeqCst);
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let mut path_guard = self.current_path.write();
        let needs_new = match &*path_guard {
            None => true,
            Some(_) => self.current_size.load(Ordering::SeqCst) >= self.max_file_bytes,
        };
        if needs_new {
            let name = format!(
                "audit-fallback-{}-{}.ndjson",
                Utc::now().format("%Y%m%dT%H%M%S%.f"),
                Uuid::new_v4()
            );
            *path_guard = Some(self.dir.join(name));
            self.current_size.store(0, Ordering::SeqCst);
        }
        let path = path_guard.clone().expect("just set above");
        drop(path_guard);

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{line}")?;
        self.current_size.fetch_add(line.len() as u64 + 1, Ordering::SeqCst);
        Ok(())
    }

    pub fn current_file(&self) -> Option<PathBuf> {
        self.current_path.read().clone()
    }

    pub fn events_logged(&self) -> u64 {
        self.events_logged.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> FallbackStats {
        FallbackStats {
            log_dir: self.dir.clone(),
            current_file: self.current_file(),
            events_logged: self.events_logged(),
            current_file_size_bytes: self.current_size.load(Ordering::SeqCst),
            errors: self.error_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sark_domain::{AuditEventKind, AuditSeverity};

    fn event() -> AuditEvent {
        AuditEvent::new(AuditEventKind::ToolInvoked, AuditSeverity::Medium, Uuid::new_v4())
    }

    #[test]
    fn creates_log_file_on_first_event() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FallbackLogger::new(dir.path(), 1);
        logger.log_event(&event());
        let file = logger.current_file().unwrap();
        assert!(file.exists());
        assert_eq!(logger.events_logged(), 1);
    }

    #[test]
    fn logged_content_round_trips_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FallbackLogger::new(dir.path(), 1);
        let event = event();
        logger.log_event(&event);
        let contents = std::fs::read_to_string(logger.current_file().unwrap()).unwrap();
        let line = contents.lines().next().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["id"], event.id.to_string());
    }

    #[test]
    fn multiple_events_append_as_separate_lines() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FallbackLogger::new(dir.path(), 1);
        for _ in 0..3 {
            logger.log_event(&event());
        }
        assert_eq!(logger.events_logged(), 3);
        let contents = std::fs::read_to_string(logger.current_file().unwrap()).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn stats_report_current_file_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FallbackLogger::new(dir.path(), 1);
        logger.log_event(&event());
        let stats = logger.stats();
        assert_eq!(stats.events_logged, 1);
        assert!(stats.current_file.is_some());
        assert!(stats.current_file_size_bytes > 0);
    }

    #[test]
    fn rotates_to_new_file_once_size_threshold_crossed() {
        let dir = tempfile::tempdir().unwrap();
        // max_file_size_mb=0 forces rotation on every write.
        let logger = FallbackLogger::new(dir.path(), 0);
        logger.log_event(&event());
        let first = logger.current_file().unwrap();
        logger.log_event(&event());
        let second = logger.current_file().unwrap();
        assert_ne!(first, second);
    }
}
