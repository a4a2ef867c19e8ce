mod adapters;
mod audit;
mod budget;
mod cache;
mod identity;
mod policy;
mod ratelimit;
mod server;

pub use adapters::*;
pub use audit::*;
pub use budget::*;
pub use cache::*;
pub use identity::*;
pub use policy::*;
pub use ratelimit::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    pub budget: BudgetConfig,
    #[serde(default)]
    pub adapters: AdaptersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            admin: AdminConfig::default(),
            identity: IdentityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            policy: PolicyConfig::default(),
            audit: AuditConfig::default(),
            budget: BudgetConfig::default(),
            adapters: AdaptersConfig::default(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means everything looks good; any `Error`-severity issue must
    /// abort startup (warnings are logged and startup proceeds).
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if self.rate_limit.enabled {
            if self.rate_limit.per_api_key_limit == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "rate_limit.per_api_key_limit".into(),
                    message: "must be greater than 0 when rate limiting is enabled".into(),
                });
            }
            if self.rate_limit.window_seconds == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "rate_limit.window_seconds".into(),
                    message: "must be greater than 0".into(),
                });
            }
            if let RateLimitStore::Redis { url } = &self.rate_limit.store {
                if url.is_empty() {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: "rate_limit.store.url".into(),
                        message: "redis url must not be empty".into(),
                    });
                }
            }
        }

        if self.cache.max_size == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "cache.max_size".into(),
                message: "must be greater than 0".into(),
            });
        }

        match self.policy.engine {
            PolicyEngineKind::Embedded if self.policy.policy_dir.is_empty() => {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "policy.policy_dir".into(),
                    message: "embedded engine requires a non-empty policy_dir".into(),
                });
            }
            PolicyEngineKind::Remote
                if self.policy.remote_url.as_deref().unwrap_or("").is_empty() =>
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "policy.remote_url".into(),
                    message: "remote engine requires remote_url".into(),
                });
            }
            _ => {}
        }
        for (feature, pct) in &self.policy.rollout_percentages {
            if *pct > 100 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("policy.rollout_percentages.{feature}"),
                    message: format!("percentage {pct} exceeds 100"),
                });
            }
        }

        if self.audit.sinks.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "audit.sinks".into(),
                message: "no audit sinks configured — events will only reach the fallback log"
                    .into(),
            });
        }
        let mut seen_endpoints: HashSet<&str> = HashSet::new();
        for (i, sink) in self.audit.sinks.iter().enumerate() {
            if sink.endpoint.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("audit.sinks[{i}].endpoint"),
                    message: "endpoint must not be empty".into(),
                });
            } else if !seen_endpoints.insert(&sink.endpoint) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("audit.sinks[{i}].endpoint"),
                    message: "duplicate sink endpoint".into(),
                });
            }
            if sink.batch_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("audit.sinks[{i}].batch_size"),
                    message: "must be greater than 0".into(),
                });
            }
        }

        if self.budget.daily_cap.is_sign_negative() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "budget.daily_cap".into(),
                message: "must not be negative".into(),
            });
        }
        if self.budget.monthly_cap.is_sign_negative() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "budget.monthly_cap".into(),
                message: "must not be negative".into(),
            });
        }
        if self.budget.monthly_cap < self.budget.daily_cap {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "budget.monthly_cap".into(),
                message: "monthly_cap is less than daily_cap".into(),
            });
        }
        if self.budget.timezone.parse::<chrono_tz::Tz>().is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "budget.timezone".into(),
                message: format!("unrecognized timezone \"{}\"", self.budget.timezone),
            });
        }

        let mut seen_identity_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.identity.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("identity.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            } else if !seen_identity_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("identity.providers[{i}].id"),
                    message: format!("duplicate identity provider id \"{}\"", provider.id),
                });
            }
            if provider.endpoint.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("identity.providers[{i}].endpoint"),
                    message: "endpoint must not be empty".into(),
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.budget = BudgetConfig {
            daily_cap: dec!(10.00),
            monthly_cap: dec!(200.00),
            timezone: "UTC".into(),
            per_principal: Default::default(),
            per_device: Default::default(),
        };
        cfg.audit.sinks.push(AuditSinkConfig {
            kind: SinkKind::Hec,
            endpoint: "https://hec.example.com/services/collector".into(),
            token_env: "SARK_HEC_TOKEN".into(),
            index: Some("sark".into()),
            verify_ssl: true,
            timeout_seconds: 10,
            batch_size: 50,
            batch_timeout_seconds: 2,
            compression_min_size_bytes: 1024,
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_recovery_timeout_seconds: 30,
            fallback_dir: "./audit-fallback".into(),
            health_check_interval_seconds: 30,
        });
        cfg
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "server.port" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn negative_budget_cap_is_error() {
        let mut cfg = valid_config();
        cfg.budget.daily_cap = dec!(-1.00);
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "budget.daily_cap" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn monthly_less_than_daily_is_warning() {
        let mut cfg = valid_config();
        cfg.budget.monthly_cap = dec!(1.00);
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "budget.monthly_cap")
            .expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn invalid_timezone_is_error() {
        let mut cfg = valid_config();
        cfg.budget.timezone = "Mars/Phobos".into();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "budget.timezone" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn no_sinks_is_warning() {
        let mut cfg = valid_config();
        cfg.audit.sinks.clear();
        let issues = cfg.validate();
        let issue = issues.iter().find(|e| e.field == "audit.sinks").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn duplicate_sink_endpoint_is_warning() {
        let mut cfg = valid_config();
        let dup = cfg.audit.sinks[0].clone();
        cfg.audit.sinks.push(dup);
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.message.contains("duplicate sink endpoint")));
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "server.cors.allowed_origins")
            .unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn rollout_percentage_over_100_is_error() {
        let mut cfg = valid_config();
        cfg.policy.rollout_percentages.insert("new_engine".into(), 150);
        let issues = cfg.validate();
        assert!(issues.iter().any(|e| {
            e.field.starts_with("policy.rollout_percentages") && e.severity == ConfigSeverity::Error
        }));
    }

    #[test]
    fn remote_engine_without_url_is_error() {
        let mut cfg = valid_config();
        cfg.policy.engine = PolicyEngineKind::Remote;
        cfg.policy.remote_url = None;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "policy.remote_url" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] server.port: port must be greater than 0"
        );
    }
}
