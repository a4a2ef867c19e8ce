use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A compiled policy: an ordered list of rules, first match wins. No
/// matching rule falls through to `default_effect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub name: String,
    #[serde(default = "default_deny")]
    pub default_effect: Effect,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_deny() -> Effect {
    Effect::Deny
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub effect: Effect,
    pub reason: String,
    #[serde(default)]
    pub when: Vec<Condition>,
    /// Parameter keys to strip from the input bundle's `tool.parameters`
    /// when this rule allows. `None` passes parameters through untouched.
    #[serde(default)]
    pub redact_parameters: Vec<String>,
}

/// A single predicate against a dot path into the input bundle
/// (`{user, action, tool, server, context}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(flatten)]
    pub op: ConditionOp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionOp {
    Equals { equals: Value },
    In { r#in: Vec<Value> },
    Exists { exists: bool },
}

impl Condition {
    fn matches(&self, bundle: &Value) -> bool {
        let found = lookup_path(bundle, &self.field);
        match &self.op {
            ConditionOp::Equals { equals } => found.map(|v| v == equals).unwrap_or(false),
            ConditionOp::In { r#in } => found.map(|v| r#in.contains(v)).unwrap_or(false),
            ConditionOp::Exists { exists } => found.is_some() == *exists,
        }
    }
}

fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |acc, part| acc.get(part))
}

impl Rule {
    fn matches(&self, bundle: &Value) -> bool {
        self.when.iter().all(|c| c.matches(bundle))
    }
}

impl PolicyDocument {
    /// First matching rule wins; falls through to `default_effect` with a
    /// generic reason when nothing matches.
    pub fn evaluate(&self, bundle: &Value) -> (bool, String, Vec<String>) {
        for rule in &self.rules {
            if rule.matches(bundle) {
                return (rule.effect == Effect::Allow, rule.reason.clone(), rule.redact_parameters.clone());
            }
        }
        (
            self.default_effect == Effect::Allow,
            format!("no rule matched in policy \"{}\", default effect applied", self.name),
            Vec::new(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle() -> Value {
        json!({
            "user": {"role": "admin"},
            "action": "tool:invoke",
            "tool": {"sensitivity": "high"},
            "context": {}
        })
    }

    #[test]
    fn first_matching_rule_decides() {
        let doc = PolicyDocument {
            name: "p1".into(),
            default_effect: Effect::Deny,
            rules: vec![Rule {
                effect: Effect::Allow,
                reason: "admin allowed".into(),
                when: vec![Condition {
                    field: "user.role".into(),
                    op: ConditionOp::Equals { equals: json!("admin") },
                }],
                redact_parameters: vec![],
            }],
        };
        let (allow, reason, _) = doc.evaluate(&bundle());
        assert!(allow);
        assert_eq!(reason, "admin allowed");
    }

    #[test]
    fn no_match_falls_through_to_default() {
        let doc = PolicyDocument {
            name: "p1".into(),
            default_effect: Effect::Deny,
            rules: vec![Rule {
                effect: Effect::Allow,
                reason: "never".into(),
                when: vec![Condition {
                    field: "user.role".into(),
                    op: ConditionOp::Equals { equals: json!("superuser") },
                }],
                redact_parameters: vec![],
            }],
        };
        let (allow, _, _) = doc.evaluate(&bundle());
        assert!(!allow);
    }

    #[test]
    fn in_operator_matches_any_listed_value() {
        let doc = PolicyDocument {
            name: "p1".into(),
            default_effect: Effect::Deny,
            rules: vec![Rule {
                effect: Effect::Allow,
                reason: "sensitivity ok".into(),
                when: vec![Condition {
                    field: "tool.sensitivity".into(),
                    op: ConditionOp::In {
                        r#in: vec![json!("low"), json!("medium"), json!("high")],
                    },
                }],
                redact_parameters: vec![],
            }],
        };
        let (allow, _, _) = doc.evaluate(&bundle());
        assert!(allow);
    }

    #[test]
    fn exists_false_matches_missing_field() {
        let doc = PolicyDocument {
            name: "p1".into(),
            default_effect: Effect::Deny,
            rules: vec![Rule {
                effect: Effect::Allow,
                reason: "no server field".into(),
                when: vec![Condition {
                    field: "server".into(),
                    op: ConditionOp::Exists { exists: false },
                }],
                redact_parameters: vec![],
            }],
        };
        let (allow, _, _) = doc.evaluate(&bundle());
        assert!(allow);
    }
}
