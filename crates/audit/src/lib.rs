//! Audit Pipeline (C10): `emit(event)` fans out to zero or more sinks, each
//! wrapped with batching, compression, a circuit breaker, health
//! monitoring, and a fallback logger. `emit` never blocks the caller.

mod alerts;
mod batch;
mod circuit_breaker;
mod compression;
mod error;
mod fallback;
mod handler;
mod health;
mod http_sink;
mod pipeline;
mod sink;

pub use alerts::{auth_failure_condition, critical_error_condition, high_error_rate_condition, ErrorAlert, ErrorRecord};
pub use batch::BatchConfig;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use compression::{compress_payload, CompressionConfig};
pub use error::{classify_error, recovery_strategy, ErrorCategory, ErrorSeverity, RecoveryStrategy, SinkError};
pub use fallback::{FallbackLogger, FallbackStats};
pub use handler::{ErrorHandler, ErrorHandlerConfig, ErrorHandlerMetrics};
pub use health::{HealthMonitor, HealthMonitorConfig};
pub use http_sink::HttpSink;
pub use pipeline::{AuditPipeline, SinkHealthReport};
pub use sink::AuditSink;
