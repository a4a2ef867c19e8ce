use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sark_domain::AuditEvent;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::circuit_breaker::{CallError, CircuitBreaker};
use crate::handler::ErrorHandler;
use crate::sink::AuditSink;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub batch_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_timeout: Duration::from_secs(2),
        }
    }
}

/// Multi-producer single-consumer queue with a bounded capacity. Once full,
/// `push` drops the oldest queued item rather than blocking the producer —
/// `emit` must never wait on a sink.
pub struct DropOldestQueue {
    capacity: usize,
    buf: Mutex<VecDeque<AuditEvent>>,
    notify: Notify,
    dropped: AtomicU64,
    closing: AtomicBool,
}

impl DropOldestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buf: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closing: AtomicBool::new(false),
        }
    }

    pub fn push(&self, event: AuditEvent) {
        {
            let mut buf = self.buf.lock();
            if buf.len() >= self.capacity {
                buf.pop_front();
                self.dropped.fetch_add(1, Ordering::SeqCst);
            }
            buf.push_back(event);
        }
        self.notify.notify_one();
    }

    pub fn drain(&self, max: usize) -> Vec<AuditEvent> {
        let mut buf = self.buf.lock();
        let n = max.min(buf.len());
        buf.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

async fn flush_batch(
    sink: &Arc<dyn AuditSink>,
    breaker: &CircuitBreaker,
    error_handler: &ErrorHandler,
    batch: &[AuditEvent],
) {
    let sink_for_call = sink.clone();
    let events = batch.to_vec();
    let result = breaker.call(|| async move { sink_for_call.send_batch(&events).await }).await;
    match result {
        Ok(()) => {}
        Err(CallError::BreakerOpen) => {
            tracing::warn!(sink = sink.name(), "circuit breaker open, routing batch to fallback");
            error_handler
                .handle_batch_failure(
                    crate::error::SinkError::Other("circuit breaker open".into()),
                    batch,
                )
                .await;
        }
        Err(CallError::Inner(err)) => {
            let strategy = error_handler.handle_batch_failure(err, batch).await;
            tracing::warn!(sink = sink.name(), ?strategy, "sink batch send failed");
        }
    }
}

/// Drives one sink's lifecycle: wait for either a new event or the batch
/// timeout, drain up to `batch_size`, send, repeat. On close, keeps
/// draining until the queue is empty before returning.
pub fn spawn_batch_worker(
    sink: Arc<dyn AuditSink>,
    queue: Arc<DropOldestQueue>,
    breaker: Arc<CircuitBreaker>,
    config: BatchConfig,
    error_handler: Arc<ErrorHandler>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(config.batch_timeout) => {}
                _ = queue.notified() => {}
            }
            loop {
                let batch = queue.drain(config.batch_size);
                if batch.is_empty() {
                    break;
                }
                flush_batch(&sink, &breaker, &error_handler, &batch).await;
                if batch.len() < config.batch_size {
                    break;
                }
            }
            if queue.is_closing() && queue.is_empty() {
                break;
            }
        }
    })
}
