use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which predicate produced a `Decision`. Carried on every decision for
/// audit and for the cache-bypass rule (emergency/override never cached).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Emergency,
    Allowlist,
    Override,
    Time,
    Budget,
    Rate,
    Policy,
    Error,
}

impl DecisionSource {
    /// Sources that must never be served from or written to the decision
    /// cache — they are re-evaluated on every request (§4.7).
    pub fn bypasses_cache(self) -> bool {
        matches!(self, DecisionSource::Emergency | DecisionSource::Override)
    }
}

/// Output of the enforcement pipeline (C7). Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub reason: String,
    pub source: DecisionSource,
    #[serde(default)]
    pub filtered_parameters: Option<serde_json::Value>,
    #[serde(default)]
    pub audit_id: Option<Uuid>,
    pub duration_ms: u64,
    pub request_id: Uuid,
    /// Retry-after seconds, set only for `source=rate` denials.
    #[serde(default)]
    pub retry_after_secs: Option<u64>,
    #[serde(default)]
    pub cache_hit: bool,
}

impl Decision {
    pub fn allow(source: DecisionSource, reason: impl Into<String>, request_id: Uuid) -> Self {
        Self {
            allow: true,
            reason: reason.into(),
            source,
            filtered_parameters: None,
            audit_id: None,
            duration_ms: 0,
            request_id,
            retry_after_secs: None,
            cache_hit: false,
        }
    }

    pub fn deny(source: DecisionSource, reason: impl Into<String>, request_id: Uuid) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            source,
            filtered_parameters: None,
            audit_id: None,
            duration_ms: 0,
            request_id,
            retry_after_secs: None,
            cache_hit: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_and_override_bypass_cache() {
        assert!(DecisionSource::Emergency.bypasses_cache());
        assert!(DecisionSource::Override.bypasses_cache());
        assert!(!DecisionSource::Policy.bypasses_cache());
        assert!(!DecisionSource::Budget.bypasses_cache());
    }

    #[test]
    fn allow_constructor_sets_allow_true() {
        let d = Decision::allow(DecisionSource::Policy, "ok", Uuid::new_v4());
        assert!(d.allow);
        assert_eq!(d.source, DecisionSource::Policy);
    }

    #[test]
    fn deny_constructor_sets_allow_false() {
        let d = Decision::deny(DecisionSource::Budget, "over cap", Uuid::new_v4());
        assert!(!d.allow);
    }
}
