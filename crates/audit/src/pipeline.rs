use std::sync::Arc;

use sark_domain::AuditEvent;
use tokio::task::JoinHandle;

use crate::batch::{spawn_batch_worker, BatchConfig, DropOldestQueue};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::handler::ErrorHandler;
use crate::health::{HealthMonitor, HealthMonitorConfig};
use crate::sink::AuditSink;

const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

struct SinkHandle {
    name: String,
    queue: Arc<DropOldestQueue>,
    worker: JoinHandle<()>,
    health: Arc<HealthMonitor>,
    health_task: JoinHandle<()>,
}

#[derive(Debug, Clone)]
pub struct SinkHealthReport {
    pub name: String,
    pub healthy: bool,
    pub queue_depth: usize,
    pub dropped_events: u64,
}

/// Fans an audit event out to every registered sink. `emit` never blocks:
/// pushing to a sink's queue is a synchronous, bounded, drop-oldest
/// operation, and the per-sink batch/circuit-breaker/fallback machinery
/// runs entirely on background tasks.
pub struct AuditPipeline {
    sinks: Vec<SinkHandle>,
    error_handler: Arc<ErrorHandler>,
}

impl AuditPipeline {
    pub fn new(error_handler: Arc<ErrorHandler>) -> Self {
        Self {
            sinks: Vec::new(),
            error_handler,
        }
    }

    pub fn add_sink(
        &mut self,
        sink: Arc<dyn AuditSink>,
        batch: BatchConfig,
        breaker: CircuitBreakerConfig,
        health: HealthMonitorConfig,
    ) {
        self.add_sink_with_capacity(sink, batch, breaker, health, DEFAULT_QUEUE_CAPACITY);
    }

    pub fn add_sink_with_capacity(
        &mut self,
        sink: Arc<dyn AuditSink>,
        batch: BatchConfig,
        breaker_config: CircuitBreakerConfig,
        health_config: HealthMonitorConfig,
        queue_capacity: usize,
    ) {
        let name = sink.name().to_string();
        let queue = Arc::new(DropOldestQueue::new(queue_capacity));
        let breaker = Arc::new(CircuitBreaker::new(name.clone(), breaker_config));
        let health = Arc::new(HealthMonitor::new(health_config));
        let health_task = HealthMonitor::spawn(health.clone(), sink.clone());
        let worker = spawn_batch_worker(sink, queue.clone(), breaker, batch, self.error_handler.clone());
        self.sinks.push(SinkHandle {
            name,
            queue,
            worker,
            health,
            health_task,
        });
    }

    /// Enqueue `event` on every sink and return immediately.
    pub fn emit(&self, event: AuditEvent) {
        for sink in &self.sinks {
            sink.queue.push(event.clone());
        }
    }

    pub fn sink_health(&self) -> Vec<SinkHealthReport> {
        self.sinks
            .iter()
            .map(|s| SinkHealthReport {
                name: s.name.clone(),
                healthy: s.health.is_healthy(),
                queue_depth: s.queue.len(),
                dropped_events: s.queue.dropped_count(),
            })
            .collect()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Stop accepting new work and drain every sink's queue before
    /// returning.
    pub async fn shutdown(self) {
        for sink in &self.sinks {
            sink.queue.close();
        }
        for sink in self.sinks {
            let _ = sink.worker.await;
            sink.health_task.abort();
        }
    }
}
