use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use sark_domain::entities::{TimeRule, TimeRuleAction};

/// Ordered list of time rules. The first rule matching both the principal's
/// tags and the current wall clock wins.
pub struct TimeRuleSet {
    rules: RwLock<Vec<TimeRule>>,
    timezone: RwLock<String>,
}

impl TimeRuleSet {
    pub fn new(timezone: impl Into<String>) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            timezone: RwLock::new(timezone.into()),
        }
    }

    pub fn set_rules(&self, rules: Vec<TimeRule>) {
        *self.rules.write() = rules;
    }

    pub fn set_timezone(&self, timezone: impl Into<String>) {
        *self.timezone.write() = timezone.into();
    }

    /// First `(rule_name, action)` whose tags and time window match `now`,
    /// evaluated at `now_utc` converted into the configured timezone.
    pub fn evaluate(&self, tags: &[String], now_utc: DateTime<Utc>) -> Option<(String, TimeRuleAction)> {
        let tz: chrono_tz::Tz = self.timezone.read().parse().unwrap_or(chrono_tz::UTC);
        let now = now_utc.with_timezone(&tz);
        self.rules
            .read()
            .iter()
            .find(|r| r.applies_to(tags) && r.matches_time(now))
            .map(|r| (r.name.clone(), r.action))
    }
}
