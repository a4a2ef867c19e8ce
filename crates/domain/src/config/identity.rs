use serde::{Deserialize, Serialize};

/// SARK treats identity providers as opaque collaborators: they produce a
/// verified `Principal` upstream of the enforcement pipeline. This section
/// only records enough to route a login and locate credentials by
/// environment variable — never a literal secret in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProviderKind {
    Ldap,
    Saml,
    Oidc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
    pub id: String,
    pub kind: IdentityProviderKind,
    pub endpoint: String,
    /// Environment variable holding the provider's client secret/bind
    /// password, never the credential itself.
    pub credential_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentityConfig {
    #[serde(default)]
    pub providers: Vec<IdentityProviderConfig>,
}
