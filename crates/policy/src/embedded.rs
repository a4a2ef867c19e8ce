use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::document::PolicyDocument;
use crate::loader;
use crate::traits::{InputBundle, PolicyBackend, PolicyError, PolicyOutcome, PolicyQuery};

/// In-process evaluator over policies pre-compiled from a watched
/// directory. A compile failure never crashes the service: the failing
/// policy is marked unhealthy and whatever version previously loaded (if
/// any) keeps serving.
pub struct EmbeddedEvaluator {
    policies_root: PathBuf,
    compiled: RwLock<HashMap<String, PolicyDocument>>,
    unhealthy: RwLock<HashSet<String>>,
}

impl EmbeddedEvaluator {
    pub fn load(policies_root: &Path) -> Self {
        let (good, unhealthy) = loader::scan_policies(policies_root);
        let compiled = good.into_iter().map(|d| (d.name.clone(), d)).collect();
        tracing::info!(
            unhealthy_count = unhealthy.len(),
            root = %policies_root.display(),
            "embedded policy evaluator loaded"
        );
        Self {
            policies_root: policies_root.to_path_buf(),
            compiled: RwLock::new(compiled),
            unhealthy: RwLock::new(unhealthy),
        }
    }

    pub fn empty() -> Self {
        Self {
            policies_root: PathBuf::new(),
            compiled: RwLock::new(HashMap::new()),
            unhealthy: RwLock::new(HashSet::new()),
        }
    }

    /// Re-scan the policies directory. Names that fail to compile keep
    /// whatever version was already loaded; names that compile cleanly
    /// replace the stored version and clear their unhealthy mark.
    pub fn reload(&self) {
        let (good, newly_unhealthy) = loader::scan_policies(&self.policies_root);
        let mut compiled = self.compiled.write();
        let mut unhealthy = self.unhealthy.write();
        for doc in good {
            unhealthy.remove(&doc.name);
            compiled.insert(doc.name.clone(), doc);
        }
        for name in newly_unhealthy {
            unhealthy.insert(name);
        }
    }

    pub fn unhealthy_policies(&self) -> Vec<String> {
        self.unhealthy.read().iter().cloned().collect()
    }

    pub fn insert_for_test(&self, doc: PolicyDocument) {
        self.compiled.write().insert(doc.name.clone(), doc);
    }
}

#[async_trait::async_trait]
impl PolicyBackend for EmbeddedEvaluator {
    async fn evaluate(&self, query: &PolicyQuery, bundle: &InputBundle) -> Result<PolicyOutcome, PolicyError> {
        let compiled = self.compiled.read();
        let Some(doc) = compiled.get(&query.policy_name) else {
            tracing::warn!(policy = %query.policy_name, "policy not found, failing closed");
            return Ok(PolicyOutcome::not_found("policy not found"));
        };

        let value = bundle.as_value();
        let (allow, reason, redact) = doc.evaluate(&value);

        let filtered_parameters = if allow && !redact.is_empty() {
            bundle.tool.as_ref().map(|tool| redact_fields(tool, &redact))
        } else {
            None
        };

        Ok(PolicyOutcome {
            allow,
            reason,
            filtered_parameters,
            audit_id: None,
            not_found: false,
        })
    }
}

fn redact_fields(tool: &serde_json::Value, fields: &[String]) -> serde_json::Value {
    let mut out = tool.clone();
    if let Some(params) = out.get_mut("parameters").and_then(|p| p.as_object_mut()) {
        for field in fields {
            params.remove(field);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Effect, Rule};
    use serde_json::json;

    fn bundle() -> InputBundle {
        InputBundle {
            user: json!({"role": "admin"}),
            action: "tool:invoke".into(),
            tool: Some(json!({"parameters": {"ssn": "123-45-6789", "amount": 10}})),
            server: None,
            context: json!({}),
        }
    }

    #[tokio::test]
    async fn missing_policy_fails_closed() {
        let evaluator = EmbeddedEvaluator::empty();
        let outcome = evaluator
            .evaluate(&PolicyQuery { policy_name: "ghost".into() }, &bundle())
            .await
            .unwrap();
        assert!(!outcome.allow);
        assert!(outcome.not_found);
        assert_eq!(outcome.reason, "policy not found");
    }

    #[tokio::test]
    async fn present_policy_evaluates_rules() {
        let evaluator = EmbeddedEvaluator::empty();
        evaluator.insert_for_test(PolicyDocument {
            name: "p1".into(),
            default_effect: Effect::Deny,
            rules: vec![Rule {
                effect: Effect::Allow,
                reason: "ok".into(),
                when: vec![],
                redact_parameters: vec!["ssn".into()],
            }],
        });
        let outcome = evaluator
            .evaluate(&PolicyQuery { policy_name: "p1".into() }, &bundle())
            .await
            .unwrap();
        assert!(outcome.allow);
        assert!(!outcome.not_found);
        let filtered = outcome.filtered_parameters.unwrap();
        assert!(filtered["parameters"].get("ssn").is_none());
        assert_eq!(filtered["parameters"]["amount"], 10);
    }

    #[tokio::test]
    async fn reload_keeps_previous_version_on_compile_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("p1.json"), r#"{"name": "p1", "rules": []}"#).unwrap();
        let evaluator = EmbeddedEvaluator::load(dir.path());
        assert!(evaluator
            .evaluate(&PolicyQuery { policy_name: "p1".into() }, &bundle())
            .await
            .unwrap()
            .not_found
            == false);

        std::fs::write(dir.path().join("p1.json"), "{ broken").unwrap();
        evaluator.reload();

        assert!(evaluator.unhealthy_policies().contains(&"p1".to_string()));
        let outcome = evaluator
            .evaluate(&PolicyQuery { policy_name: "p1".into() }, &bundle())
            .await
            .unwrap();
        assert!(!outcome.not_found, "previous good version should still serve");
    }
}
