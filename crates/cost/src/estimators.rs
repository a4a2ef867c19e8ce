use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::{CostEstimate, CostEstimator, CostRequest, UsageReport};

/// Zero-cost estimator for resources that carry no cost signal.
pub struct FreeEstimator {
    provider: String,
}

impl FreeEstimator {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

impl CostEstimator for FreeEstimator {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn estimate_cost(&self, _request: &CostRequest, _metadata: &Value) -> CostEstimate {
        CostEstimate::zero(&self.provider, false)
    }

    fn record_actual_cost(
        &self,
        _request: &CostRequest,
        _usage: &UsageReport,
        _metadata: &Value,
    ) -> Option<CostEstimate> {
        None
    }

    fn supports_actual_cost(&self) -> bool {
        false
    }
}

/// Flat per-call cost, independent of usage.
pub struct FixedEstimator {
    provider: String,
    cost_per_call: Decimal,
    currency: String,
}

impl FixedEstimator {
    pub fn new(provider: impl Into<String>, cost_per_call: Decimal, currency: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            cost_per_call,
            currency: currency.into(),
        }
    }
}

impl CostEstimator for FixedEstimator {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn estimate_cost(&self, _request: &CostRequest, _metadata: &Value) -> CostEstimate {
        CostEstimate {
            estimated_cost: self.cost_per_call,
            currency: self.currency.clone(),
            provider: self.provider.clone(),
            model: None,
            breakdown: HashMap::new(),
            metadata: HashMap::new(),
            fallback: false,
        }
    }

    fn record_actual_cost(
        &self,
        _request: &CostRequest,
        _usage: &UsageReport,
        _metadata: &Value,
    ) -> Option<CostEstimate> {
        None
    }

    fn supports_actual_cost(&self) -> bool {
        false
    }
}

/// Per-1M-token input/output pricing.
#[derive(Debug, Clone, Copy)]
pub struct TokenPrice {
    pub input_per_1m: Decimal,
    pub output_per_1m: Decimal,
}

/// Token-priced estimator: pricing table keyed by model name, with a
/// default row for models not explicitly listed.
pub struct TokenPriced {
    provider: String,
    currency: String,
    table: HashMap<String, TokenPrice>,
    default_row: TokenPrice,
}

pub struct TokenPricedBuilder {
    provider: String,
    currency: String,
    table: HashMap<String, TokenPrice>,
    default_row: TokenPrice,
}

impl TokenPricedBuilder {
    pub fn new(provider: impl Into<String>, default_row: TokenPrice) -> Self {
        Self {
            provider: provider.into(),
            currency: "USD".to_string(),
            table: HashMap::new(),
            default_row,
        }
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>, price: TokenPrice) -> Self {
        self.table.insert(model.into(), price);
        self
    }

    pub fn build(self) -> TokenPriced {
        TokenPriced {
            provider: self.provider,
            currency: self.currency,
            table: self.table,
            default_row: self.default_row,
        }
    }
}

impl TokenPriced {
    fn price_for(&self, model: Option<&str>) -> TokenPrice {
        model
            .and_then(|m| self.table.get(m))
            .copied()
            .unwrap_or(self.default_row)
    }

    fn cost(price: TokenPrice, input_tokens: u64, output_tokens: u64) -> (Decimal, HashMap<String, Decimal>) {
        let input_cost = price.input_per_1m * Decimal::from(input_tokens) / Decimal::from(1_000_000u64);
        let output_cost = price.output_per_1m * Decimal::from(output_tokens) / Decimal::from(1_000_000u64);
        let mut breakdown = HashMap::new();
        breakdown.insert("input".to_string(), input_cost);
        breakdown.insert("output".to_string(), output_cost);
        (input_cost + output_cost, breakdown)
    }

    /// 4 characters ≈ 1 token, rounded up.
    fn heuristic_tokens(chars: usize) -> u64 {
        ((chars + 3) / 4) as u64
    }
}

impl CostEstimator for TokenPriced {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn estimate_cost(&self, request: &CostRequest, _metadata: &Value) -> CostEstimate {
        let price = self.price_for(request.model.as_deref());
        let input_tokens = request
            .estimated_input_chars
            .map(Self::heuristic_tokens)
            .unwrap_or(0);
        // Pre-call, output size is unknown; estimate symmetric to input.
        let (cost, breakdown) = Self::cost(price, input_tokens, input_tokens);
        CostEstimate {
            estimated_cost: cost,
            currency: self.currency.clone(),
            provider: self.provider.clone(),
            model: request.model.clone(),
            breakdown,
            metadata: HashMap::new(),
            fallback: false,
        }
    }

    fn record_actual_cost(
        &self,
        request: &CostRequest,
        usage: &UsageReport,
        _metadata: &Value,
    ) -> Option<CostEstimate> {
        if let Some(reported) = usage.reported_cost {
            return Some(CostEstimate {
                estimated_cost: reported,
                currency: self.currency.clone(),
                provider: self.provider.clone(),
                model: request.model.clone(),
                breakdown: HashMap::new(),
                metadata: HashMap::new(),
                fallback: false,
            });
        }
        let (input_tokens, output_tokens) = (usage.input_tokens, usage.output_tokens);
        if input_tokens.is_none() && output_tokens.is_none() {
            return None;
        }
        let price = self.price_for(request.model.as_deref());
        let (cost, breakdown) = Self::cost(price, input_tokens.unwrap_or(0), output_tokens.unwrap_or(0));
        Some(CostEstimate {
            estimated_cost: cost,
            currency: self.currency.clone(),
            provider: self.provider.clone(),
            model: request.model.clone(),
            breakdown,
            metadata: HashMap::new(),
            fallback: false,
        })
    }

    fn supports_actual_cost(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn req(model: Option<&str>, chars: Option<usize>) -> CostRequest {
        CostRequest {
            provider: "openai".into(),
            model: model.map(String::from),
            estimated_input_chars: chars,
        }
    }

    #[test]
    fn free_is_always_zero() {
        let est = FreeEstimator::new("free");
        let c = est.estimate_cost(&req(None, Some(4000)), &Value::Null);
        assert_eq!(c.estimated_cost, Decimal::ZERO);
        assert!(!est.supports_actual_cost());
    }

    #[test]
    fn fixed_returns_configured_cost() {
        let est = FixedEstimator::new("webhook", dec!(0.002), "USD");
        let c = est.estimate_cost(&req(None, None), &Value::Null);
        assert_eq!(c.estimated_cost, dec!(0.002));
    }

    #[test]
    fn token_priced_falls_back_to_default_row_for_unknown_model() {
        let est = TokenPricedBuilder::new(
            "openai",
            TokenPrice {
                input_per_1m: dec!(1.00),
                output_per_1m: dec!(2.00),
            },
        )
        .model(
            "gpt-4o",
            TokenPrice {
                input_per_1m: dec!(5.00),
                output_per_1m: dec!(15.00),
            },
        )
        .build();

        let c = est.estimate_cost(&req(Some("unlisted-model"), Some(4000)), &Value::Null);
        // 4000 chars -> 1000 tokens in, 1000 tokens out (symmetric pre-call estimate)
        // at default row: 1000/1e6 * 1.00 + 1000/1e6 * 2.00 = 0.003
        assert_eq!(c.estimated_cost, dec!(0.003));
    }

    #[test]
    fn token_priced_uses_exact_model_row() {
        let est = TokenPricedBuilder::new(
            "openai",
            TokenPrice {
                input_per_1m: dec!(1.00),
                output_per_1m: dec!(2.00),
            },
        )
        .model(
            "gpt-4o",
            TokenPrice {
                input_per_1m: dec!(5.00),
                output_per_1m: dec!(15.00),
            },
        )
        .build();

        let usage = UsageReport {
            input_tokens: Some(1_000_000),
            output_tokens: Some(1_000_000),
            reported_cost: None,
        };
        let c = est
            .record_actual_cost(&req(Some("gpt-4o"), None), &usage, &Value::Null)
            .unwrap();
        assert_eq!(c.estimated_cost, dec!(20.00));
    }

    #[test]
    fn reported_cost_bypasses_pricing_table() {
        let est = TokenPricedBuilder::new(
            "openai",
            TokenPrice {
                input_per_1m: dec!(1.00),
                output_per_1m: dec!(2.00),
            },
        )
        .build();
        let usage = UsageReport {
            input_tokens: None,
            output_tokens: None,
            reported_cost: Some(dec!(9.99)),
        };
        let c = est
            .record_actual_cost(&req(None, None), &usage, &Value::Null)
            .unwrap();
        assert_eq!(c.estimated_cost, dec!(9.99));
    }

    #[test]
    fn no_usage_yields_no_actual_cost() {
        let est = TokenPricedBuilder::new(
            "openai",
            TokenPrice {
                input_per_1m: dec!(1.00),
                output_per_1m: dec!(2.00),
            },
        )
        .build();
        let usage = UsageReport::default();
        assert!(est
            .record_actual_cost(&req(None, None), &usage, &Value::Null)
            .is_none());
    }
}
