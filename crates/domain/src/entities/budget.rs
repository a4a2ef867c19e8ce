use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Append-only budget ledger record. Aggregates are derived by range query,
/// never stored redundantly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetLedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub principal_id: Uuid,
    pub resource_id: Uuid,
    pub provider: String,
    pub estimated_cost: Decimal,
    pub actual_cost: Option<Decimal>,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl BudgetLedgerEntry {
    /// The cost to count against a cap: actual if known, else the estimate.
    pub fn effective_cost(&self) -> Decimal {
        self.actual_cost.unwrap_or(self.estimated_cost)
    }
}

/// Result of `BudgetTracker::aggregate`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BudgetAggregate {
    pub spent: Decimal,
    pub by_provider: HashMap<String, Decimal>,
    pub by_model: HashMap<String, Decimal>,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn effective_cost_prefers_actual() {
        let entry = BudgetLedgerEntry {
            timestamp: Utc::now(),
            principal_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            provider: "openai".into(),
            estimated_cost: dec!(1.00),
            actual_cost: Some(dec!(0.73)),
            currency: "USD".into(),
            metadata: HashMap::new(),
        };
        assert_eq!(entry.effective_cost(), dec!(0.73));
    }

    #[test]
    fn effective_cost_falls_back_to_estimate() {
        let entry = BudgetLedgerEntry {
            timestamp: Utc::now(),
            principal_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            provider: "openai".into(),
            estimated_cost: dec!(1.00),
            actual_cost: None,
            currency: "USD".into(),
            metadata: HashMap::new(),
        };
        assert_eq!(entry.effective_cost(), dec!(1.00));
    }
}
