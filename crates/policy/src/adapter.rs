use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::rollout::RolloutRegistry;
use crate::traits::{InputBundle, PolicyBackend, PolicyError, PolicyOutcome, PolicyQuery};

/// Routes between two interchangeable policy back-ends by a stable hash of
/// `(feature, principal)`, hiding which one answered from the caller.
///
/// The rollout percentage lives in a shared [`RolloutRegistry`] rather than
/// a field on this struct, so admin endpoints can adjust it at runtime
/// without reconstructing the adapter.
pub struct PolicyEngineAdapter {
    feature: String,
    legacy: Arc<dyn PolicyBackend>,
    new: Arc<dyn PolicyBackend>,
    rollout: Arc<RolloutRegistry>,
}

impl PolicyEngineAdapter {
    pub fn new(
        feature: impl Into<String>,
        legacy: Arc<dyn PolicyBackend>,
        new: Arc<dyn PolicyBackend>,
        rollout_percent: u8,
    ) -> Self {
        let feature = feature.into();
        let rollout = Arc::new(RolloutRegistry::new());
        rollout.set(feature.clone(), rollout_percent);
        Self {
            feature,
            legacy,
            new,
            rollout,
        }
    }

    /// Construct with a registry shared across multiple adapters/features,
    /// as `sark-gateway` does so its admin rollout endpoints can reach every
    /// live adapter through one store.
    pub fn with_registry(
        feature: impl Into<String>,
        legacy: Arc<dyn PolicyBackend>,
        new: Arc<dyn PolicyBackend>,
        rollout: Arc<RolloutRegistry>,
    ) -> Self {
        Self {
            feature: feature.into(),
            legacy,
            new,
            rollout,
        }
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// `"new"` if the stable hash of `(feature, principal)` falls below the
    /// rollout percentage, else `"legacy"`. Pure function of its inputs for
    /// a fixed percentage, so the routing decision is stable until the
    /// rollout percentage changes.
    pub fn route_for(&self, principal_id: &str) -> &'static str {
        let mut hasher = Sha256::new();
        hasher.update(self.feature.as_bytes());
        hasher.update(b":");
        hasher.update(principal_id.as_bytes());
        let digest = hasher.finalize();
        let bucket = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % 100;
        if bucket < self.rollout.get(&self.feature) as u32 {
            "new"
        } else {
            "legacy"
        }
    }

    pub async fn evaluate(
        &self,
        principal_id: &str,
        query: &PolicyQuery,
        bundle: &InputBundle,
    ) -> Result<PolicyOutcome, PolicyError> {
        let route = self.route_for(principal_id);
        tracing::debug!(feature = %self.feature, principal_id, route, "policy engine routing decision");
        match route {
            "new" => self.new.evaluate(query, bundle).await,
            _ => self.legacy.evaluate(query, bundle).await,
        }
    }
}
