use sha2::{Digest, Sha256};

/// Everything the limiter needs to resolve an identifier, in precedence order.
#[derive(Debug, Clone, Default)]
pub struct IdentityHints<'a> {
    pub api_key: Option<&'a str>,
    pub principal_id: Option<&'a str>,
    pub bearer_token: Option<&'a str>,
    pub forwarded_for: Option<&'a str>,
    pub real_ip: Option<&'a str>,
    pub peer_addr: &'a str,
}

/// The resolved identifier kind, carrying its own limit column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    ApiKey(String),
    User(String),
    TokenHash(String),
    Ip(String),
}

impl Identifier {
    /// `api_key:<key>` → `user:<id>` → `token:<hash>` → `ip:<addr>`, first match wins.
    pub fn resolve(hints: &IdentityHints) -> Self {
        if let Some(key) = hints.api_key {
            return Identifier::ApiKey(key.to_string());
        }
        if let Some(principal_id) = hints.principal_id {
            return Identifier::User(principal_id.to_string());
        }
        if let Some(bearer) = hints.bearer_token {
            return Identifier::TokenHash(hash_token(bearer));
        }
        let ip = hints
            .forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or(hints.real_ip)
            .unwrap_or(hints.peer_addr);
        Identifier::Ip(ip.to_string())
    }

    /// Cache/store key: `"kind:value"`.
    pub fn as_key(&self) -> String {
        match self {
            Identifier::ApiKey(v) => format!("api_key:{v}"),
            Identifier::User(v) => format!("user:{v}"),
            Identifier::TokenHash(v) => format!("token:{v}"),
            Identifier::Ip(v) => format!("ip:{v}"),
        }
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_takes_precedence_over_everything() {
        let hints = IdentityHints {
            api_key: Some("k1"),
            principal_id: Some("p1"),
            bearer_token: Some("b1"),
            forwarded_for: Some("1.2.3.4"),
            real_ip: None,
            peer_addr: "5.6.7.8",
        };
        assert_eq!(Identifier::resolve(&hints), Identifier::ApiKey("k1".into()));
    }

    #[test]
    fn user_wins_over_bearer_and_ip() {
        let hints = IdentityHints {
            api_key: None,
            principal_id: Some("p1"),
            bearer_token: Some("b1"),
            forwarded_for: Some("1.2.3.4"),
            real_ip: None,
            peer_addr: "5.6.7.8",
        };
        assert_eq!(Identifier::resolve(&hints), Identifier::User("p1".into()));
    }

    #[test]
    fn bearer_hash_used_when_no_principal_id() {
        let hints = IdentityHints {
            api_key: None,
            principal_id: None,
            bearer_token: Some("secret-token"),
            forwarded_for: None,
            real_ip: None,
            peer_addr: "5.6.7.8",
        };
        match Identifier::resolve(&hints) {
            Identifier::TokenHash(h) => assert_eq!(h.len(), 64),
            other => panic!("expected TokenHash, got {other:?}"),
        }
    }

    #[test]
    fn forwarded_for_first_entry_used_over_real_ip() {
        let hints = IdentityHints {
            api_key: None,
            principal_id: None,
            bearer_token: None,
            forwarded_for: Some("1.1.1.1, 2.2.2.2"),
            real_ip: Some("3.3.3.3"),
            peer_addr: "5.6.7.8",
        };
        assert_eq!(Identifier::resolve(&hints), Identifier::Ip("1.1.1.1".into()));
    }

    #[test]
    fn falls_back_to_peer_addr() {
        let hints = IdentityHints {
            api_key: None,
            principal_id: None,
            bearer_token: None,
            forwarded_for: None,
            real_ip: None,
            peer_addr: "5.6.7.8",
        };
        assert_eq!(Identifier::resolve(&hints), Identifier::Ip("5.6.7.8".into()));
    }
}
