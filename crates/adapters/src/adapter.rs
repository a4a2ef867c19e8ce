use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{AdapterError, DiscoveredCapability, DiscoveredResource, Invocation, InvocationResult};

/// Every adapter must refuse to forward a payload larger than this, per
/// "size limit" / "never block indefinitely" (§4.8).
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

/// One per downstream transport: discover what's out there, detail a
/// resource's capabilities, and invoke them.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn protocol_name(&self) -> &str;
    fn protocol_version(&self) -> &str;

    async fn discover_resources(&self, config: &Value) -> Result<Vec<DiscoveredResource>, AdapterError>;
    async fn get_capabilities(&self, resource: &DiscoveredResource) -> Result<Vec<DiscoveredCapability>, AdapterError>;

    /// Protocol-level sanity check, performed before `invoke`. Implementors
    /// should reject dangerous patterns they can detect statically (e.g. a
    /// destructive SQL statement outside an allow-list).
    fn validate_request(&self, invocation: &Invocation) -> Result<(), AdapterError>;

    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationResult, AdapterError>;
    async fn health_check(&self, resource: &DiscoveredResource) -> bool;

    /// Default: invoke sequentially. Adapters whose backend supports
    /// genuine batching (e.g. gRPC streaming) may override.
    async fn invoke_batch(&self, invocations: &[Invocation]) -> Vec<Result<InvocationResult, AdapterError>> {
        let mut results = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            results.push(self.invoke(invocation).await);
        }
        results
    }
}

/// Run `fut` under `deadline`, translating a timeout into `AdapterError::Timeout`.
pub async fn with_deadline<T>(deadline: Duration, fut: impl Future<Output = Result<T, AdapterError>>) -> Result<T, AdapterError> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| AdapterError::Timeout(deadline))?
}

/// Reject a payload over `MAX_PAYLOAD_BYTES` before it's forwarded downstream.
pub fn check_payload_size(value: &Value) -> Result<(), AdapterError> {
    let actual = serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0);
    if actual > MAX_PAYLOAD_BYTES {
        return Err(AdapterError::PayloadTooLarge {
            actual,
            limit: MAX_PAYLOAD_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn with_deadline_passes_through_fast_futures() {
        let result = with_deadline(StdDuration::from_millis(50), async { Ok::<_, AdapterError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn with_deadline_times_out_slow_futures() {
        let result = with_deadline(StdDuration::from_millis(5), async {
            tokio::time::sleep(StdDuration::from_millis(200)).await;
            Ok::<_, AdapterError>(42)
        })
        .await;
        assert!(matches!(result, Err(AdapterError::Timeout(_))));
    }

    #[test]
    fn check_payload_size_rejects_oversized_bodies() {
        let big = serde_json::json!({ "blob": "x".repeat(MAX_PAYLOAD_BYTES + 1) });
        assert!(matches!(
            check_payload_size(&big),
            Err(AdapterError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn check_payload_size_accepts_small_bodies() {
        assert!(check_payload_size(&serde_json::json!({ "ok": true })).is_ok());
    }
}
