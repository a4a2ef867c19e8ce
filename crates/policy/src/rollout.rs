use std::collections::HashMap;

use parking_lot::RwLock;

/// Mutable rollout percentages keyed by feature name, shared between a
/// [`crate::PolicyEngineAdapter`] (which reads them on every `evaluate`) and
/// the admin endpoints that adjust them at runtime
/// (`/admin/rollout/{set,rollback,rollback-all,status}`). A feature absent
/// from the map defaults to 0% (always legacy).
#[derive(Default)]
pub struct RolloutRegistry {
    percentages: RwLock<HashMap<String, u8>>,
}

impl RolloutRegistry {
    pub fn new() -> Self {
        Self {
            percentages: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, feature: &str) -> u8 {
        self.percentages.read().get(feature).copied().unwrap_or(0)
    }

    pub fn set(&self, feature: impl Into<String>, percent: u8) {
        self.percentages.write().insert(feature.into(), percent.min(100));
    }

    /// Reset a single feature's rollout back to 0% (all traffic to legacy).
    pub fn rollback(&self, feature: &str) {
        self.percentages.write().insert(feature.to_string(), 0);
    }

    /// Reset every known feature back to 0%.
    pub fn rollback_all(&self) {
        for v in self.percentages.write().values_mut() {
            *v = 0;
        }
    }

    pub fn snapshot(&self) -> HashMap<String, u8> {
        self.percentages.read().clone()
    }
}
