use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Budget Tracker configuration (C4). Defaults apply to any principal
/// without a `per_principal`/`per_device` override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub daily_cap: Decimal,
    pub monthly_cap: Decimal,
    #[serde(default = "d_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub per_principal: HashMap<String, BudgetOverride>,
    #[serde(default)]
    pub per_device: HashMap<String, BudgetOverride>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_cap: Decimal::new(1000, 2),    // 10.00
            monthly_cap: Decimal::new(20000, 2), // 200.00
            timezone: d_timezone(),
            per_principal: HashMap::new(),
            per_device: HashMap::new(),
        }
    }
}

/// Cap override for a specific principal or device. `None` leaves the
/// corresponding default cap in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetOverride {
    pub daily_cap: Option<Decimal>,
    pub monthly_cap: Option<Decimal>,
}

fn d_timezone() -> String {
    "UTC".into()
}
