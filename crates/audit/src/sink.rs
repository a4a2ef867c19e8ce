use sark_domain::AuditEvent;

use crate::error::SinkError;

/// One downstream destination for audit events (a SIEM, a log aggregator).
/// Implementations are wrapped by the pipeline with batching, compression,
/// a circuit breaker, and health monitoring — they only need to know how to
/// actually deliver a batch and answer a health probe.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    fn name(&self) -> &str;
    async fn send_batch(&self, events: &[AuditEvent]) -> Result<(), SinkError>;
    async fn health_check(&self) -> Result<(), SinkError>;
}
