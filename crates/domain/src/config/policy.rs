use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEngineKind {
    Embedded,
    Remote,
}

impl Default for PolicyEngineKind {
    fn default() -> Self {
        PolicyEngineKind::Embedded
    }
}

/// Policy Engine Adapter configuration (C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub engine: PolicyEngineKind,
    #[serde(default = "d_policy_dir")]
    pub policy_dir: String,
    #[serde(default)]
    pub remote_url: Option<String>,
    /// Per-feature rollout percentage (0-100), feature name -> percentage
    /// of traffic routed to the "new" back-end per §4.2's feature-flag
    /// routing (stable hash of `(feature, principal)` mod 100).
    #[serde(default)]
    pub rollout_percentages: HashMap<String, u8>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            engine: PolicyEngineKind::default(),
            policy_dir: d_policy_dir(),
            remote_url: None,
            rollout_percentages: HashMap::new(),
        }
    }
}

fn d_policy_dir() -> String {
    "./policies".into()
}
