//! Tool Sensitivity Classifier (C9) — deterministic, no I/O.

use sark_domain::entities::Sensitivity;

const CRITICAL_KEYWORDS: &[&str] = &[
    "payment",
    "transaction",
    "credit_card",
    "password",
    "secret",
    "key",
    "token",
    "credential",
    "auth",
    "permission",
    "access_control",
    "encrypt",
    "decrypt",
];

const HIGH_KEYWORDS: &[&str] = &[
    "delete", "drop", "exec", "admin", "root", "sudo", "kill", "destroy", "remove", "purge",
    "truncate",
];

const MEDIUM_KEYWORDS: &[&str] = &[
    "write", "update", "modify", "create", "insert", "save", "upload", "put", "post", "patch",
];

const LOW_KEYWORDS: &[&str] = &["read", "get", "list", "fetch", "view", "show", "query", "search", "find"];

/// Detect the sensitivity of a tool from its name/description/parameters.
/// First matching keyword tier wins; defaults to `Medium` when nothing
/// matches. Deterministic and idempotent over the same input (§8 invariant
/// 8).
pub fn detect(name: &str, description: Option<&str>, parameters: Option<&serde_json::Value>) -> Sensitivity {
    let mut text = name.to_ascii_lowercase();
    if let Some(d) = description {
        text.push(' ');
        text.push_str(&d.to_ascii_lowercase());
    }
    if let Some(p) = parameters {
        text.push(' ');
        text.push_str(&p.to_string().to_ascii_lowercase());
    }
    let words = tokenize(&text);

    if any_keyword_matches(&words, CRITICAL_KEYWORDS) {
        return Sensitivity::Critical;
    }
    if any_keyword_matches(&words, HIGH_KEYWORDS) {
        return Sensitivity::High;
    }
    if any_keyword_matches(&words, MEDIUM_KEYWORDS) {
        return Sensitivity::Medium;
    }
    if any_keyword_matches(&words, LOW_KEYWORDS) {
        return Sensitivity::Low;
    }
    Sensitivity::Medium
}

/// Split on anything that isn't alphanumeric — underscores and spaces are
/// both word boundaries, not part of a word.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// A keyword may itself be multi-word (`credit_card`, `access_control`);
/// it matches when its own words appear as a contiguous run in `words`.
fn any_keyword_matches(words: &[String], keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| {
        let kw_words = tokenize(kw);
        if kw_words.is_empty() {
            return false;
        }
        words
            .windows(kw_words.len())
            .any(|window| window == kw_words.as_slice())
    })
}

/// `(previous_level, new_level)` pair plus reviewer metadata used by
/// `Capability::set_sensitivity` — the classifier itself stays a pure
/// function; the override record lives on the `Capability` entity.
pub use sark_domain::entities::SensitivityOverride;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_beats_everything() {
        assert_eq!(detect("rotate_credential", None, None), Sensitivity::Critical);
        assert_eq!(detect("get_password", None, None), Sensitivity::Critical);
    }

    #[test]
    fn high_keywords_detected() {
        assert_eq!(detect("delete_user", None, None), Sensitivity::High);
        assert_eq!(detect("sudo_exec", None, None), Sensitivity::High);
    }

    #[test]
    fn medium_keywords_detected() {
        assert_eq!(detect("create_invoice", None, None), Sensitivity::Medium);
    }

    #[test]
    fn low_keywords_detected() {
        assert_eq!(detect("list_files", None, None), Sensitivity::Low);
        assert_eq!(detect("get_status", None, None), Sensitivity::Low);
    }

    #[test]
    fn default_is_medium() {
        assert_eq!(detect("frobnicate", None, None), Sensitivity::Medium);
    }

    #[test]
    fn word_boundary_respected() {
        // "keyring" contains "key" as a substring but not as a whole word.
        assert_eq!(detect("keyring_lookup", None, None), Sensitivity::Medium);
    }

    #[test]
    fn underscore_and_space_equivalent() {
        assert_eq!(detect("credit card charge", None, None), Sensitivity::Critical);
        assert_eq!(detect("credit_card_charge", None, None), Sensitivity::Critical);
    }

    #[test]
    fn description_contributes_to_detection() {
        assert_eq!(
            detect("op1", Some("permanently drop the table"), None),
            Sensitivity::High
        );
    }

    #[test]
    fn is_deterministic_and_idempotent() {
        let a = detect("delete_account", Some("removes a user"), None);
        let b = detect("delete_account", Some("removes a user"), None);
        assert_eq!(a, b);
    }
}
