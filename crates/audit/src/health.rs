use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::sink::AuditSink;

#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    pub enabled: bool,
    pub check_interval: Duration,
    pub failure_threshold: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: Duration::from_secs(30),
            failure_threshold: 3,
        }
    }
}

/// Polls a sink's `health_check` on an interval; marks it unhealthy once
/// `failure_threshold` consecutive checks fail, independent of the
/// circuit breaker (which reacts to send failures, not probe failures).
pub struct HealthMonitor {
    config: HealthMonitorConfig,
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
    last_check: RwLock<Option<DateTime<Utc>>>,
}

impl HealthMonitor {
    pub fn new(config: HealthMonitorConfig) -> Self {
        Self {
            config,
            healthy: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            last_check: RwLock::new(None),
        }
    }

    pub fn spawn(monitor: Arc<Self>, sink: Arc<dyn AuditSink>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !monitor.config.enabled {
                return;
            }
            let mut ticker = tokio::time::interval(monitor.config.check_interval);
            loop {
                ticker.tick().await;
                monitor.run_check(sink.as_ref()).await;
            }
        })
    }

    /// One round of probe + bookkeeping, factored out so tests can drive it
    /// deterministically without racing a background timer.
    async fn run_check(&self, sink: &dyn AuditSink) {
        match sink.health_check().await {
            Ok(()) => {
                if self.consecutive_failures.swap(0, Ordering::SeqCst) > 0 {
                    tracing::info!(sink = sink.name(), "sink health recovered");
                }
                self.healthy.store(true, Ordering::SeqCst);
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::warn!(sink = sink.name(), error = %e, failures, "sink health check failed");
                if failures >= self.config.failure_threshold {
                    self.healthy.store(false, Ordering::SeqCst);
                }
            }
        }
        *self.last_check.write() = Some(Utc::now());
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        *self.last_check.read()
    }
}
