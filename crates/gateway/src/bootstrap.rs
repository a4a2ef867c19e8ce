//! AppState construction and background-task spawning extracted from `main.rs`.
//!
//! `build_app_state` is the one place every subsystem gets wired together;
//! `spawn_background_tasks` starts the sweepers that keep running once the
//! HTTP listener is up.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use sark_audit::{AuditPipeline, BatchConfig, CircuitBreakerConfig, ErrorHandler, ErrorHandlerConfig, HealthMonitorConfig, HttpSink};
use sark_budget::BudgetTracker;
use sark_cache::DecisionCache;
use sark_cost::CostRegistry;
use sark_domain::config::{ConfigSeverity, PolicyEngineKind, RateLimitStore};
use sark_enforcement::EnforcementPipeline;
use sark_governance::GovernanceStore;
use sark_mcp::McpManager;
use sark_policy::{EmbeddedEvaluator, PolicyEngineAdapter, RemoteEvaluator, RolloutRegistry};
use sark_ratelimit::{MemoryBackend, RateLimiter};
use sark_registry::{CapabilityStore, ServerRegistry};

use crate::adapter_registry::AdapterRegistry;
use crate::config::GatewayConfig;
use crate::principal_store::PrincipalStore;
use crate::state::AppState;

const POLICY_ROLLOUT_FEATURE: &str = "policy-engine";

/// Validate config, initialize every subsystem, and return a fully-wired
/// [`AppState`]. Shared by `serve` and `doctor`/`config show`.
pub async fn build_app_state(config: Arc<GatewayConfig>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.core.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Cache (C1) ───────────────────────────────────────────────────
    let cache = Arc::new(DecisionCache::new(config.core.cache.max_size));
    tracing::info!(max_size = config.core.cache.max_size, "decision cache ready");

    // ── Governance (C6) ──────────────────────────────────────────────
    let governance = Arc::new(GovernanceStore::new(config.core.budget.timezone.clone()));
    tracing::info!(timezone = %config.core.budget.timezone, "governance store ready");

    // ── Budget (C4) ──────────────────────────────────────────────────
    let budget = Arc::new(BudgetTracker::new(config.core.budget.clone()));
    tracing::info!("budget tracker ready");

    // ── Rate limiter (C5) ────────────────────────────────────────────
    let rate_limiter = Arc::new(match &config.core.rate_limit.store {
        RateLimitStore::Memory => RateLimiter::in_memory(config.core.rate_limit.clone()),
        RateLimitStore::Redis { url } => {
            #[cfg(feature = "redis-backend")]
            {
                let backend = sark_ratelimit::RedisBackend::connect(url)
                    .await
                    .context("connecting to rate limit Redis backend")?;
                RateLimiter::new(config.core.rate_limit.clone(), Arc::new(backend))
            }
            #[cfg(not(feature = "redis-backend"))]
            {
                tracing::warn!("redis rate limit store configured but redis-backend feature is disabled; falling back to memory");
                RateLimiter::new(config.core.rate_limit.clone(), Arc::new(MemoryBackend::new()))
            }
        }
    });
    tracing::info!(enabled = config.core.rate_limit.enabled, "rate limiter ready");

    // ── Policy (C2) ──────────────────────────────────────────────────
    // `PolicyConfig` names a single active engine; the adapter's legacy/new
    // split exists for live migration between backends, so embedded is
    // always "legacy" and remote is always "new" here, seeded at 0% or
    // 100% by `engine` and then left to `/admin/rollout/*` to move.
    let rollout = Arc::new(RolloutRegistry::new());
    let legacy = Arc::new(EmbeddedEvaluator::load(std::path::Path::new(&config.core.policy.policy_dir)));
    let new: Arc<dyn sark_policy::PolicyBackend> = match &config.core.policy.remote_url {
        Some(url) => Arc::new(RemoteEvaluator::new(url.clone()).context("constructing remote policy evaluator")?),
        None => Arc::new(EmbeddedEvaluator::empty()),
    };
    let seeded_pct = config
        .core
        .policy
        .rollout_percentages
        .get(POLICY_ROLLOUT_FEATURE)
        .copied()
        .unwrap_or(match config.core.policy.engine {
            PolicyEngineKind::Embedded => 0,
            PolicyEngineKind::Remote => 100,
        });
    rollout.set(POLICY_ROLLOUT_FEATURE.to_string(), seeded_pct);
    let policy = Arc::new(PolicyEngineAdapter::with_registry(
        POLICY_ROLLOUT_FEATURE,
        legacy,
        new,
        rollout.clone(),
    ));
    tracing::info!(engine = ?config.core.policy.engine, rollout_pct = seeded_pct, "policy engine adapter ready");

    // ── Cost (C3) ────────────────────────────────────────────────────
    let cost = Arc::new(CostRegistry::new());
    tracing::info!("cost registry ready");

    // ── Audit pipeline (C10) ─────────────────────────────────────────
    let error_handler = Arc::new(ErrorHandler::new(ErrorHandlerConfig {
        fallback_log_dir: std::path::PathBuf::from(&config.core.audit.fallback_dir),
        ..ErrorHandlerConfig::default()
    }));
    let mut pipeline = AuditPipeline::new(error_handler);
    for sink_config in &config.core.audit.sinks {
        let token = std::env::var(&sink_config.token_env).unwrap_or_default();
        if token.is_empty() {
            tracing::warn!(sink = %sink_config.endpoint, env = %sink_config.token_env, "audit sink token env var is unset or empty");
        }
        let sink = Arc::new(
            HttpSink::new(sink_config.endpoint.clone(), sink_config, token)
                .with_context(|| format!("constructing audit sink for {}", sink_config.endpoint))?,
        );
        pipeline.add_sink(
            sink,
            BatchConfig {
                batch_size: sink_config.batch_size,
                batch_timeout: std::time::Duration::from_secs(sink_config.batch_timeout_seconds),
            },
            CircuitBreakerConfig {
                failure_threshold: sink_config.circuit_breaker_failure_threshold,
                recovery_timeout: std::time::Duration::from_secs(sink_config.circuit_breaker_recovery_timeout_seconds),
            },
            HealthMonitorConfig {
                enabled: true,
                check_interval: std::time::Duration::from_secs(sink_config.health_check_interval_seconds),
                ..HealthMonitorConfig::default()
            },
        );
    }
    let audit = Arc::new(pipeline);
    tracing::info!(sinks = config.core.audit.sinks.len(), "audit pipeline ready");

    // ── Approvals (C12) ──────────────────────────────────────────────
    let approvals = Arc::new(sark_approval::ApprovalStore::new());
    tracing::info!("approval store ready");

    // ── Enforcement pipeline ─────────────────────────────────────────
    let enforcement = Arc::new(EnforcementPipeline::new(
        cache.clone(),
        governance.clone(),
        budget.clone(),
        rate_limiter.clone(),
        policy.clone(),
        cost.clone(),
        audit.clone(),
        approvals.clone(),
    ));
    tracing::info!("enforcement pipeline ready");

    // ── Registries (C9, C11) ─────────────────────────────────────────
    let servers = Arc::new(ServerRegistry::new());
    let capabilities = Arc::new(CapabilityStore::new());
    tracing::info!("server and capability registries ready");

    // ── MCP servers (C8) ─────────────────────────────────────────────
    let mcp = if config.mcp.servers.is_empty() {
        tracing::info!("no MCP servers configured");
        Arc::new(McpManager::empty())
    } else {
        tracing::info!(count = config.mcp.servers.len(), "initializing MCP servers");
        Arc::new(McpManager::from_config(&config.mcp).await)
    };
    if mcp.tool_count() > 0 {
        tracing::info!(servers = mcp.server_count(), tools = mcp.tool_count(), "MCP tools discovered");
    }

    // ── Adapter registry (C8) ────────────────────────────────────────
    let adapters = Arc::new(AdapterRegistry::new(mcp.clone()));
    tracing::info!("adapter registry ready");

    // ── Principal store ──────────────────────────────────────────────
    let principals = Arc::new(PrincipalStore::new());

    // ── API token (env var only; no config-literal fallback) ────────
    let api_token_hash = {
        let env_var = &config.core.admin.api_token_env;
        match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
            Some(t) => {
                tracing::info!(env = %env_var, "API bearer-token auth enabled");
                Some(Sha256::digest(t.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!(env = %env_var, "API bearer-token auth DISABLED — set this env var to enable");
                None
            }
        }
    };

    // ── Admin token (env var only) ────────────────────────────────────
    let admin_token_hash = {
        let env_var = &config.core.admin.admin_token_env;
        match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
            Some(t) => {
                tracing::info!(env = %env_var, "admin bearer-token auth enabled");
                Some(Sha256::digest(t.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!(env = %env_var, "admin bearer-token auth DISABLED — set this env var to enable");
                None
            }
        }
    };

    Ok(AppState {
        config,
        cache,
        governance,
        budget,
        rate_limiter,
        policy,
        rollout,
        cost,
        audit,
        approvals,
        enforcement,
        servers,
        capabilities,
        mcp,
        adapters,
        principals,
        api_token_hash,
        admin_token_hash,
    })
}

/// Spawn the long-running background tokio tasks. Call after
/// [`build_app_state`] when running the HTTP server; one-shot CLI commands
/// (`doctor`, `config show`) skip this.
pub fn spawn_background_tasks(state: &AppState) {
    let interval = std::time::Duration::from_secs(state.config.core.cache.sweep_interval_seconds);
    state.cache.spawn_sweeper(interval);
    tracing::info!(interval_secs = interval.as_secs(), "background tasks spawned");
}
