use std::sync::Arc;

use sark_audit::AuditPipeline;
use sark_budget::BudgetTracker;
use sark_cache::DecisionCache;
use sark_cost::CostRegistry;
use sark_enforcement::EnforcementPipeline;
use sark_governance::GovernanceStore;
use sark_mcp::McpManager;
use sark_policy::{PolicyEngineAdapter, RolloutRegistry};
use sark_ratelimit::RateLimiter;
use sark_registry::{CapabilityStore, ServerRegistry};

use crate::adapter_registry::AdapterRegistry;
use crate::config::GatewayConfig;
use crate::principal_store::PrincipalStore;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core** — resolved config
/// - **Enforcement stack** — every component `EnforcementPipeline` composes,
///   plus the pipeline itself
/// - **Registries** — downstream servers and their capabilities
/// - **Downstream** — adapters and MCP connections
/// - **Identity** — principal sessions
/// - **Security** — startup-computed bearer-token hashes
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<GatewayConfig>,

    // ── Enforcement stack ─────────────────────────────────────────────
    pub cache: Arc<DecisionCache>,
    pub governance: Arc<GovernanceStore>,
    pub budget: Arc<BudgetTracker>,
    pub rate_limiter: Arc<RateLimiter>,
    pub policy: Arc<PolicyEngineAdapter>,
    pub rollout: Arc<RolloutRegistry>,
    pub cost: Arc<CostRegistry>,
    pub audit: Arc<AuditPipeline>,
    pub approvals: Arc<sark_approval::ApprovalStore>,
    pub enforcement: Arc<EnforcementPipeline>,

    // ── Registries ────────────────────────────────────────────────────
    pub servers: Arc<ServerRegistry>,
    pub capabilities: Arc<CapabilityStore>,

    // ── Downstream ────────────────────────────────────────────────────
    pub mcp: Arc<McpManager>,
    pub adapters: Arc<AdapterRegistry>,

    // ── Identity ──────────────────────────────────────────────────────
    pub principals: Arc<PrincipalStore>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
    /// SHA-256 hash of the admin bearer token (read once at startup).
    /// `None` = dev mode (admin endpoints accessible without auth).
    pub admin_token_hash: Option<Vec<u8>>,
}
