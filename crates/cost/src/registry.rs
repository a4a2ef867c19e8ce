use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::estimators::FreeEstimator;
use crate::{CostEstimate, CostEstimator, CostRequest, UsageReport};

/// Holds all registered cost estimators, keyed by `provider`, `provider:model`,
/// or the literal key `"default"` for the global fallback row.
///
/// Lookup order for a request against `(provider, model)`:
/// 1. exact `provider:model`
/// 2. provider-default (`provider`)
/// 3. global default (`"default"`)
/// 4. built-in [`FreeEstimator`] for an unknown provider
pub struct CostRegistry {
    estimators: RwLock<HashMap<String, Arc<dyn CostEstimator>>>,
    free: Arc<dyn CostEstimator>,
}

impl CostRegistry {
    pub fn new() -> Self {
        Self {
            estimators: RwLock::new(HashMap::new()),
            free: Arc::new(FreeEstimator::new("free")),
        }
    }

    /// Register an estimator under `key` (`"openai"`, `"openai:gpt-4o"`, or
    /// `"default"`). Replaces any estimator previously registered there.
    pub fn register(&self, key: impl Into<String>, estimator: Arc<dyn CostEstimator>) {
        self.estimators.write().insert(key.into(), estimator);
    }

    fn resolve(&self, provider: &str, model: Option<&str>) -> Arc<dyn CostEstimator> {
        let table = self.estimators.read();
        if let Some(model) = model {
            let exact = format!("{provider}:{model}");
            if let Some(est) = table.get(&exact) {
                return Arc::clone(est);
            }
        }
        if let Some(est) = table.get(provider) {
            return Arc::clone(est);
        }
        if let Some(est) = table.get("default") {
            return Arc::clone(est);
        }
        Arc::clone(&self.free)
    }

    pub fn estimate(&self, request: &CostRequest, metadata: &Value) -> CostEstimate {
        let estimator = self.resolve(&request.provider, request.model.as_deref());
        let provider = request.provider.clone();
        match catch_unwind(AssertUnwindSafe(|| estimator.estimate_cost(request, metadata))) {
            Ok(estimate) => estimate,
            Err(_) => {
                tracing::warn!(provider = %provider, "cost estimator panicked, using zero-cost fallback");
                CostEstimate::zero(&provider, true)
            }
        }
    }

    pub fn record_actual(
        &self,
        request: &CostRequest,
        usage: &UsageReport,
        metadata: &Value,
    ) -> Option<CostEstimate> {
        let estimator = self.resolve(&request.provider, request.model.as_deref());
        let provider = request.provider.clone();
        match catch_unwind(AssertUnwindSafe(|| {
            estimator.record_actual_cost(request, usage, metadata)
        })) {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(provider = %provider, "cost estimator panicked recording actual cost");
                Some(CostEstimate::zero(&provider, true))
            }
        }
    }
}

impl Default for CostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::{FixedEstimator, TokenPrice, TokenPricedBuilder};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn req(provider: &str, model: Option<&str>) -> CostRequest {
        CostRequest {
            provider: provider.into(),
            model: model.map(String::from),
            estimated_input_chars: None,
        }
    }

    #[test]
    fn unknown_provider_falls_back_to_free() {
        let registry = CostRegistry::new();
        let est = registry.estimate(&req("mystery", None), &Value::Null);
        assert_eq!(est.estimated_cost, Decimal::ZERO);
        assert!(!est.fallback);
    }

    #[test]
    fn exact_provider_model_key_wins_over_provider_default() {
        let registry = CostRegistry::new();
        registry.register(
            "openai",
            Arc::new(FixedEstimator::new("openai", dec!(1.00), "USD")),
        );
        registry.register(
            "openai:gpt-4o",
            Arc::new(FixedEstimator::new("openai", dec!(5.00), "USD")),
        );
        let est = registry.estimate(&req("openai", Some("gpt-4o")), &Value::Null);
        assert_eq!(est.estimated_cost, dec!(5.00));

        let est2 = registry.estimate(&req("openai", Some("gpt-3.5")), &Value::Null);
        assert_eq!(est2.estimated_cost, dec!(1.00));
    }

    #[test]
    fn global_default_used_when_no_provider_entry() {
        let registry = CostRegistry::new();
        registry.register(
            "default",
            Arc::new(FixedEstimator::new("default", dec!(0.01), "USD")),
        );
        let est = registry.estimate(&req("unregistered", None), &Value::Null);
        assert_eq!(est.estimated_cost, dec!(0.01));
    }

    #[test]
    fn dynamic_registration_at_runtime() {
        let registry = CostRegistry::new();
        assert_eq!(
            registry.estimate(&req("acme", None), &Value::Null).estimated_cost,
            Decimal::ZERO
        );
        registry.register("acme", Arc::new(FixedEstimator::new("acme", dec!(2.50), "USD")));
        assert_eq!(
            registry.estimate(&req("acme", None), &Value::Null).estimated_cost,
            dec!(2.50)
        );
    }

    #[test]
    fn record_actual_routes_through_same_resolution() {
        let registry = CostRegistry::new();
        registry.register(
            "openai",
            Arc::new(
                TokenPricedBuilder::new(
                    "openai",
                    TokenPrice {
                        input_per_1m: dec!(1.00),
                        output_per_1m: dec!(2.00),
                    },
                )
                .build(),
            ),
        );
        let usage = UsageReport {
            input_tokens: Some(1_000_000),
            output_tokens: Some(0),
            reported_cost: None,
        };
        let est = registry
            .record_actual(&req("openai", None), &usage, &Value::Null)
            .unwrap();
        assert_eq!(est.estimated_cost, dec!(1.00));
    }
}
