//! Governance Predicates (C6) — emergency switch, allowlist, break-glass
//! override, and time rules. Each concern is its own independently lockable
//! store; `GovernanceStore` just bundles them for convenient wiring.

mod allowlist;
mod emergency;
mod override_store;
mod time_rules;

pub use allowlist::AllowlistStore;
pub use emergency::EmergencyStore;
pub use override_store::OverrideStore;
pub use time_rules::TimeRuleSet;

pub struct GovernanceStore {
    pub emergency: EmergencyStore,
    pub allowlist: AllowlistStore,
    pub overrides: OverrideStore,
    pub time_rules: TimeRuleSet,
}

impl GovernanceStore {
    pub fn new(timezone: impl Into<String>) -> Self {
        Self {
            emergency: EmergencyStore::new(),
            allowlist: AllowlistStore::new(),
            overrides: OverrideStore::new(),
            time_rules: TimeRuleSet::new(timezone),
        }
    }
}
