//! Opaque bearer-token store backing `/api/v1/auth/*`.
//!
//! Identity providers are opaque collaborators (see
//! `sark_domain::config::IdentityConfig`'s doc comment) — they hand back a
//! verified `Principal`, never a reusable credential of their own. This
//! store mints SARK's own access/refresh tokens for that principal, hashed
//! the same way `sark-governance`'s break-glass pins are: random salt,
//! SHA-256, constant-time compare on lookup.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use sark_domain::entities::Principal;
use sha2::{Digest, Sha256};
use uuid::Uuid;

struct IssuedToken {
    principal: Principal,
    expires_at: DateTime<Utc>,
}

fn mint_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

#[derive(Default)]
pub struct PrincipalStore {
    access: RwLock<HashMap<Vec<u8>, IssuedToken>>,
    refresh: RwLock<HashMap<Vec<u8>, IssuedToken>>,
}

pub struct IssuedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub principal: Principal,
}

impl PrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh access/refresh pair for a just-authenticated principal.
    pub fn issue(&self, principal: Principal, access_ttl: Duration, refresh_ttl: Duration) -> IssuedSession {
        let now = Utc::now();
        let access_token = mint_token();
        let refresh_token = mint_token();

        self.access.write().insert(
            hash_token(&access_token),
            IssuedToken {
                principal: principal.clone(),
                expires_at: now + access_ttl,
            },
        );
        self.refresh.write().insert(
            hash_token(&refresh_token),
            IssuedToken {
                principal: principal.clone(),
                expires_at: now + refresh_ttl,
            },
        );

        IssuedSession {
            access_token,
            refresh_token,
            principal,
        }
    }

    /// Resolve a bearer token to its principal, `None` if unknown or expired.
    pub fn authenticate(&self, token: &str) -> Option<Principal> {
        let key = hash_token(token);
        let mut guard = self.access.write();
        match guard.get(&key) {
            Some(issued) if issued.expires_at > Utc::now() => Some(issued.principal.clone()),
            Some(_) => {
                guard.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Exchange a refresh token for a new access token, leaving the refresh
    /// token itself valid until its own expiry.
    pub fn refresh(&self, refresh_token: &str, access_ttl: Duration) -> Option<IssuedSession> {
        let key = hash_token(refresh_token);
        let principal = {
            let mut guard = self.refresh.write();
            match guard.get(&key) {
                Some(issued) if issued.expires_at > Utc::now() => issued.principal.clone(),
                Some(_) => {
                    guard.remove(&key);
                    return None;
                }
                None => return None,
            }
        };

        let access_token = mint_token();
        self.access.write().insert(
            hash_token(&access_token),
            IssuedToken {
                principal: principal.clone(),
                expires_at: Utc::now() + access_ttl,
            },
        );

        Some(IssuedSession {
            access_token,
            refresh_token: refresh_token.to_string(),
            principal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            roles: vec![],
            groups: vec![],
            mfa_verified: true,
            source_provider: "oidc".into(),
        }
    }

    #[test]
    fn issued_access_token_authenticates() {
        let store = PrincipalStore::new();
        let session = store.issue(principal(), Duration::minutes(15), Duration::days(7));
        let resolved = store.authenticate(&session.access_token).unwrap();
        assert_eq!(resolved.id, session.principal.id);
    }

    #[test]
    fn unknown_token_does_not_authenticate() {
        let store = PrincipalStore::new();
        assert!(store.authenticate("not-a-real-token").is_none());
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let store = PrincipalStore::new();
        let session = store.issue(principal(), Duration::seconds(-1), Duration::days(7));
        assert!(store.authenticate(&session.access_token).is_none());
    }

    #[test]
    fn refresh_issues_a_new_working_access_token() {
        let store = PrincipalStore::new();
        let session = store.issue(principal(), Duration::minutes(15), Duration::days(7));
        let refreshed = store.refresh(&session.refresh_token, Duration::minutes(15)).unwrap();
        assert!(store.authenticate(&refreshed.access_token).is_some());
    }

    #[test]
    fn refresh_with_unknown_token_fails() {
        let store = PrincipalStore::new();
        assert!(store.refresh("bogus", Duration::minutes(15)).is_none());
    }
}
