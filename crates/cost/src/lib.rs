//! Cost Estimator Registry (C3) — per-provider cost-estimation plugins.

mod estimators;
mod registry;

pub use estimators::{FixedEstimator, FreeEstimator, TokenPriced, TokenPricedBuilder};
pub use registry::CostRegistry;

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value;

/// Inputs known before a downstream call is dispatched.
#[derive(Debug, Clone)]
pub struct CostRequest {
    pub provider: String,
    pub model: Option<String>,
    /// Used by heuristic token estimators when no usage report exists yet
    /// (roughly 4 chars per token).
    pub estimated_input_chars: Option<usize>,
}

/// Usage actually reported by the downstream call, when available.
#[derive(Debug, Clone, Default)]
pub struct UsageReport {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    /// A cost figure reported directly by the provider, bypassing the
    /// pricing table entirely.
    pub reported_cost: Option<Decimal>,
}

/// A cost estimate, always fixed-precision — never a binary float.
#[derive(Debug, Clone)]
pub struct CostEstimate {
    pub estimated_cost: Decimal,
    pub currency: String,
    pub provider: String,
    pub model: Option<String>,
    pub breakdown: HashMap<String, Decimal>,
    pub metadata: HashMap<String, Value>,
    /// Set when an estimator panicked and the registry substituted a
    /// zero-cost placeholder so the request isn't blocked.
    pub fallback: bool,
}

impl CostEstimate {
    pub fn zero(provider: &str, fallback: bool) -> Self {
        Self {
            estimated_cost: Decimal::ZERO,
            currency: "USD".to_string(),
            provider: provider.to_string(),
            model: None,
            breakdown: HashMap::new(),
            metadata: HashMap::new(),
            fallback,
        }
    }
}

/// Plugin contract for a single provider's cost model.
pub trait CostEstimator: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Estimate cost before the downstream call is made.
    fn estimate_cost(&self, request: &CostRequest, metadata: &Value) -> CostEstimate;

    /// Compute the actual cost after the call completes, when the estimator
    /// can do better than the pre-call estimate (e.g. from reported usage).
    /// Returns `None` when no improvement over the estimate is possible.
    fn record_actual_cost(
        &self,
        request: &CostRequest,
        usage: &UsageReport,
        metadata: &Value,
    ) -> Option<CostEstimate>;

    fn supports_actual_cost(&self) -> bool;
}
