use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Process-wide all-allow flag, settable by an admin only (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencySwitch {
    pub active: bool,
    pub last_set_at: DateTime<Utc>,
    pub reason: String,
    pub set_by_principal_id: Uuid,
}

impl EmergencySwitch {
    pub fn inactive() -> Self {
        Self {
            active: false,
            last_set_at: Utc::now(),
            reason: String::new(),
            set_by_principal_id: Uuid::nil(),
        }
    }
}

/// One identifier allowed to bypass the enforcement pipeline directly.
/// `identifier` is either a principal id string or a CIDR/IP literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowlistEntry {
    pub identifier: String,
    pub reason: String,
    pub added_at: DateTime<Utc>,
}

/// Action a matching time rule dictates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRuleAction {
    Allow,
    Block,
    Alert,
}

/// `(start_time, end_time, days_of_week, applies_to_tags, action)`,
/// evaluated against the wall clock in the configured timezone. A window
/// that wraps midnight (`start > end`) is treated as spanning to the next
/// day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRule {
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub days_of_week: Vec<Weekday>,
    pub applies_to_tags: Vec<String>,
    pub action: TimeRuleAction,
}

impl TimeRule {
    /// Whether `now` (already converted to the rule's configured timezone)
    /// falls inside this rule's window on its day.
    pub fn matches_time(&self, now: DateTime<chrono_tz::Tz>) -> bool {
        if !self.days_of_week.contains(&now.weekday()) {
            return false;
        }
        let t = now.time();
        if self.start_time <= self.end_time {
            t >= self.start_time && t < self.end_time
        } else {
            t >= self.start_time || t < self.end_time
        }
    }

    /// Whether this rule applies to a principal carrying any of `tags`.
    pub fn applies_to(&self, tags: &[String]) -> bool {
        self.applies_to_tags.is_empty()
            || tags
                .iter()
                .any(|t| self.applies_to_tags.iter().any(|rt| rt.eq_ignore_ascii_case(t)))
    }
}

/// `(request_id, pin_hash, expires_at, one_shot)`. Consumed at most once
/// within its expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakGlassOverride {
    pub request_id: String,
    pub pin_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub one_shot: bool,
    #[serde(default)]
    pub consumed: bool,
}
