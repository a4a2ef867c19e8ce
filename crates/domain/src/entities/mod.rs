mod approval;
mod audit;
mod budget;
mod capability;
mod decision;
mod governance;
mod principal;
mod ratelimit;
mod server;

pub use approval::*;
pub use audit::*;
pub use budget::*;
pub use capability::*;
pub use decision::*;
pub use governance::*;
pub use principal::*;
pub use ratelimit::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Sensitivity level of a capability or resource; drives cache TTL, approval
/// requirements, and policy branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
    Critical,
}

impl Sensitivity {
    /// Decision Cache TTL for this level, per §4.1's table.
    pub fn cache_ttl(self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            Sensitivity::Critical => Duration::from_secs(60),
            Sensitivity::High => Duration::from_secs(120),
            Sensitivity::Medium => Duration::from_secs(180),
            Sensitivity::Low => Duration::from_secs(300),
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Sensitivity::Low => "low",
            Sensitivity::Medium => "medium",
            Sensitivity::High => "high",
            Sensitivity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}
