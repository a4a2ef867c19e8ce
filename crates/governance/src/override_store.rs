use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use sark_domain::entities::BreakGlassOverride;

const SALT_LEN: usize = 16;

fn salted_hash(salt: &[u8], pin: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(pin.as_bytes());
    hasher.finalize().to_vec()
}

/// Break-glass override store. A reviewer mints a `(pin, expires_at,
/// one_shot)` bound to a request id; the client later presents the pin to
/// obtain a one-time bypass.
///
/// `peek` validates without marking consumed so the enforcement pipeline can
/// check the override mid-evaluation; `commit` marks it consumed, and must
/// only be called once the pipeline's final verdict is allow — a later-stage
/// deny must not burn the override.
pub struct OverrideStore(RwLock<HashMap<String, Entry>>);

struct Entry {
    salt: [u8; SALT_LEN],
    record: BreakGlassOverride,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self(RwLock::new(HashMap::new()))
    }

    pub fn grant(&self, request_id: String, pin: &str, expires_at: DateTime<Utc>, one_shot: bool) {
        let salt_uuid = Uuid::new_v4();
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(salt_uuid.as_bytes());
        let pin_hash = salted_hash(&salt, pin);

        let record = BreakGlassOverride {
            request_id: request_id.clone(),
            pin_hash,
            expires_at,
            one_shot,
            consumed: false,
        };
        self.0.write().insert(request_id, Entry { salt, record });
    }

    /// `true` iff an unconsumed, unexpired override exists for `request_id`
    /// whose pin matches, checked in constant time.
    pub fn peek(&self, request_id: &str, pin: &str) -> bool {
        let guard = self.0.read();
        let Some(entry) = guard.get(request_id) else {
            return false;
        };
        if entry.record.consumed || entry.record.expires_at < Utc::now() {
            return false;
        }
        let candidate = salted_hash(&entry.salt, pin);
        candidate.ct_eq(&entry.record.pin_hash).into()
    }

    /// Mark the override consumed. No-op if it isn't `one_shot`, doesn't
    /// exist, or is already consumed.
    pub fn commit(&self, request_id: &str) {
        let mut guard = self.0.write();
        if let Some(entry) = guard.get_mut(request_id) {
            if entry.record.one_shot {
                entry.record.consumed = true;
            }
        }
    }
}

impl Default for OverrideStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn peek_succeeds_for_correct_pin() {
        let store = OverrideStore::new();
        store.grant("req-1".into(), "1234", Utc::now() + Duration::minutes(5), true);
        assert!(store.peek("req-1", "1234"));
    }

    #[test]
    fn peek_fails_for_wrong_pin() {
        let store = OverrideStore::new();
        store.grant("req-1".into(), "1234", Utc::now() + Duration::minutes(5), true);
        assert!(!store.peek("req-1", "0000"));
    }

    #[test]
    fn peek_does_not_consume() {
        let store = OverrideStore::new();
        store.grant("req-1".into(), "1234", Utc::now() + Duration::minutes(5), true);
        assert!(store.peek("req-1", "1234"));
        assert!(store.peek("req-1", "1234"));
    }

    #[test]
    fn commit_then_peek_fails() {
        let store = OverrideStore::new();
        store.grant("req-1".into(), "1234", Utc::now() + Duration::minutes(5), true);
        store.commit("req-1");
        assert!(!store.peek("req-1", "1234"));
    }

    #[test]
    fn expired_override_fails_peek() {
        let store = OverrideStore::new();
        store.grant("req-1".into(), "1234", Utc::now() - Duration::seconds(1), true);
        assert!(!store.peek("req-1", "1234"));
    }

    #[test]
    fn unknown_request_id_fails_peek() {
        let store = OverrideStore::new();
        assert!(!store.peek("missing", "1234"));
    }

    #[test]
    fn non_one_shot_commit_is_noop_but_peek_still_valid() {
        let store = OverrideStore::new();
        store.grant("req-1".into(), "1234", Utc::now() + Duration::minutes(5), false);
        store.commit("req-1");
        assert!(store.peek("req-1", "1234"));
    }
}
