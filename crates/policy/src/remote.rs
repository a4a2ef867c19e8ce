use std::time::Duration;

use serde::Serialize;

use crate::traits::{InputBundle, PolicyBackend, PolicyError, PolicyOutcome, PolicyQuery};

/// RPC client for a sidecar policy service. Target p95 < 15 ms — callers
/// are expected to apply their own timeout/circuit-breaking around this if
/// the sidecar degrades.
pub struct RemoteEvaluator {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct EvaluateRequest<'a> {
    policy_name: &'a str,
    bundle: &'a InputBundle,
}

impl RemoteEvaluator {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, PolicyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .map_err(|e| PolicyError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait::async_trait]
impl PolicyBackend for RemoteEvaluator {
    async fn evaluate(&self, query: &PolicyQuery, bundle: &InputBundle) -> Result<PolicyOutcome, PolicyError> {
        let body = EvaluateRequest {
            policy_name: &query.policy_name,
            bundle,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| PolicyError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PolicyError::Unavailable(format!(
                "policy sidecar returned {}",
                resp.status()
            )));
        }

        resp.json::<PolicyOutcome>()
            .await
            .map_err(|e| PolicyError::Unavailable(e.to_string()))
    }
}
