use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use sark_audit::AuditPipeline;
use sark_budget::BudgetTracker;
use sark_cache::DecisionCache;
use sark_cost::{CostEstimate, CostRegistry, CostRequest, UsageReport};
use sark_domain::entities::{AuditEvent, AuditEventKind, AuditSeverity, Decision, DecisionSource, TimeRuleAction};
use sark_governance::GovernanceStore;
use sark_policy::{InputBundle, PolicyEngineAdapter, PolicyQuery};
use sark_ratelimit::{Identifier, IdentityHints, RateLimiter};

use crate::request::EnforcementRequest;
use sark_approval::ApprovalStore;

/// Ordered composition of C1 (cache), C2 (policy), C3 (cost), C4 (budget),
/// C5 (rate limit), C6 (governance), and C10 (audit) — one `Decision` per
/// request, per §4.7's authoritative 8-step evaluation order. The target
/// capability's sensitivity (C9's output) arrives pre-classified on the
/// request; this pipeline only consumes it for the cache TTL.
#[derive(Clone)]
pub struct EnforcementPipeline {
    cache: Arc<DecisionCache>,
    governance: Arc<GovernanceStore>,
    budget: Arc<BudgetTracker>,
    rate_limiter: Arc<RateLimiter>,
    policy: Arc<PolicyEngineAdapter>,
    cost: Arc<CostRegistry>,
    audit: Arc<AuditPipeline>,
    approvals: Arc<ApprovalStore>,
}

impl EnforcementPipeline {
    pub fn new(
        cache: Arc<DecisionCache>,
        governance: Arc<GovernanceStore>,
        budget: Arc<BudgetTracker>,
        rate_limiter: Arc<RateLimiter>,
        policy: Arc<PolicyEngineAdapter>,
        cost: Arc<CostRegistry>,
        audit: Arc<AuditPipeline>,
        approvals: Arc<ApprovalStore>,
    ) -> Self {
        Self {
            cache,
            governance,
            budget,
            rate_limiter,
            policy,
            cost,
            audit,
            approvals,
        }
    }

    /// Evaluate one request. Never panics outward: a panic anywhere in the
    /// evaluation sequence is caught and converted into a `source=error`
    /// deny carrying only the failure class (§4.7's fail-closed contract).
    pub async fn evaluate(&self, request: EnforcementRequest) -> Decision {
        let started = Instant::now();

        let principal_key = request.principal_id.to_string();
        let ctx_hash = DecisionCache::context_hash(&request.context);
        let cache_key = DecisionCache::build_key(&principal_key, &request.action, &request.resource_name, &ctx_hash);

        if let Some(mut cached) = self.cache.get(&cache_key) {
            cached.cache_hit = true;
            cached.duration_ms = started.elapsed().as_millis() as u64;
            self.emit_audit(&cached, &request);
            return cached;
        }

        let pipeline = self.clone();
        let task_request = request.clone();
        let cache_key_for_task = cache_key.clone();
        let outcome = tokio::spawn(async move { pipeline.evaluate_uncached(task_request, cache_key_for_task).await }).await;

        match outcome {
            Ok(decision) => decision,
            Err(join_err) => {
                let class = if join_err.is_panic() { "panic" } else { "cancelled" };
                let mut decision = Decision::deny(
                    DecisionSource::Error,
                    format!("enforcement pipeline failure: {class}"),
                    request.request_id,
                );
                decision.duration_ms = started.elapsed().as_millis() as u64;
                // The spawned task may have died after step 5 reserved budget
                // but before reaching `finish`/`finish_severity`; release any
                // such reservation so a panic doesn't permanently shrink the
                // principal's cap.
                self.budget.release_reservation(request.request_id);
                self.emit_audit(&decision, &request);
                decision
            }
        }
    }

    async fn evaluate_uncached(&self, request: EnforcementRequest, cache_key: String) -> Decision {
        let started = Instant::now();
        let principal_key = request.principal_id.to_string();

        // Step 1: emergency switch is absolute — never cached, never
        // subject to budget/rate checks.
        if self.governance.emergency.is_active() {
            let decision = Decision::allow(DecisionSource::Emergency, "emergency switch active", request.request_id);
            return self.finish(decision, started, &request, &cache_key, false);
        }

        // Step 2: allowlist, by principal id or resolved client ip.
        let ip = self.resolve_ip(&request);
        if self.governance.allowlist.contains(&principal_key) || self.governance.allowlist.contains(&ip) {
            let decision = Decision::allow(DecisionSource::Allowlist, "identifier in allowlist", request.request_id);
            return self.finish(decision, started, &request, &cache_key, true);
        }

        // Step 3: break-glass override. Peek only — commit is deferred
        // until the overall verdict is known to be allow, so a later-stage
        // deny never burns the pin.
        if let Some(pin) = &request.override_pin {
            let override_key = request.request_id.to_string();
            if self.governance.overrides.peek(&override_key, pin) {
                self.governance.overrides.commit(&override_key);
                let decision = Decision::allow(DecisionSource::Override, "break-glass override consumed", request.request_id);
                return self.finish(decision, started, &request, &cache_key, false);
            }
        }

        // Step 4: time rules. Only `block` is terminal here; `alert` raises
        // the audit severity of whatever the pipeline ultimately decides
        // but still lets budget/rate/policy run; `allow` is likewise
        // non-terminal — steps 5-6 are still consulted per §4.7.
        let mut elevate_severity = false;
        if let Some((rule_name, action)) = self.governance.time_rules.evaluate(&request.principal_tags, Utc::now()) {
            match action {
                TimeRuleAction::Block => {
                    let decision = Decision::deny(
                        DecisionSource::Time,
                        format!("time rule '{rule_name}' blocks this request"),
                        request.request_id,
                    );
                    return self.finish(decision, started, &request, &cache_key, true);
                }
                TimeRuleAction::Alert => elevate_severity = true,
                TimeRuleAction::Allow => {}
            }
        }

        // Step 5: budget. `check_and_reserve` holds a per-principal mutex
        // across the check and the provisional ledger write so two
        // concurrent requests for the same principal can't both pass before
        // either records; `record_invocation_cost`/`release_invocation_cost`
        // resolve the reservation once the downstream call returns.
        let cost_request = self.cost_request(&request);
        let estimate = self.cost.estimate(&cost_request, &json!({"action": request.action}));
        let reservation = sark_domain::entities::BudgetLedgerEntry {
            timestamp: Utc::now(),
            principal_id: request.principal_id,
            resource_id: request.resource_id,
            provider: request.provider.clone(),
            estimated_cost: estimate.estimated_cost,
            actual_cost: None,
            currency: estimate.currency.clone(),
            metadata: Default::default(),
        };
        let (budget_ok, budget_reason) =
            self.budget
                .check_and_reserve(request.request_id, reservation, request.device.as_deref());
        if !budget_ok {
            let decision = Decision::deny(
                DecisionSource::Budget,
                budget_reason.unwrap_or_else(|| "budget check failed".to_string()),
                request.request_id,
            );
            return self.finish_severity(decision, started, &request, &cache_key, true, elevate_severity);
        }

        // Step 6: rate limit.
        let hints = IdentityHints {
            api_key: request.api_key.as_deref(),
            principal_id: Some(principal_key.as_str()),
            bearer_token: request.bearer_token.as_deref(),
            forwarded_for: request.forwarded_for.as_deref(),
            real_ip: request.real_ip.as_deref(),
            peer_addr: request.peer_addr.as_str(),
        };
        let rate_info = self.rate_limiter.check(&request.path, request.is_admin, &hints).await;
        if !rate_info.allowed {
            let mut decision = Decision::deny(DecisionSource::Rate, "rate limit exceeded", request.request_id);
            decision.retry_after_secs = rate_info.retry_after;
            return self.finish_severity(decision, started, &request, &cache_key, true, elevate_severity);
        }

        // Steps 7-8: policy. A capability requiring human approval folds
        // its grant state into the input bundle's context rather than
        // becoming a ninth pipeline step — the embedded/remote policy
        // decides what to do with `approval_granted`.
        let mut context = request.context.clone();
        if request.requires_approval {
            let approved = request
                .approval_id
                .map(|id| self.consume_approval(id, &request))
                .unwrap_or(false);
            if let Value::Object(ref mut map) = context {
                map.insert("approval_granted".to_string(), json!(approved));
            } else {
                context = json!({"approval_granted": approved});
            }
        }

        let bundle = InputBundle {
            user: request.user.clone(),
            action: request.action.clone(),
            tool: request.tool.clone(),
            server: request.server.clone(),
            context,
        };
        let query = PolicyQuery {
            policy_name: request.policy_name.clone(),
        };

        let outcome = match self.policy.evaluate(&principal_key, &query, &bundle).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let decision = Decision::deny(DecisionSource::Error, "policy backend unavailable", request.request_id);
                return self.finish_severity(decision, started, &request, &cache_key, true, elevate_severity);
            }
        };

        let mut decision = if outcome.allow {
            Decision::allow(DecisionSource::Policy, outcome.reason, request.request_id)
        } else {
            Decision::deny(DecisionSource::Policy, outcome.reason, request.request_id)
        };
        decision.filtered_parameters = outcome.filtered_parameters;
        decision.audit_id = outcome.audit_id.as_deref().and_then(|s| Uuid::parse_str(s).ok());

        self.finish_severity(decision, started, &request, &cache_key, true, elevate_severity || outcome.not_found)
    }

    fn finish(&self, decision: Decision, started: Instant, request: &EnforcementRequest, cache_key: &str, cacheable: bool) -> Decision {
        self.finish_severity(decision, started, request, cache_key, cacheable, false)
    }

    fn finish_severity(
        &self,
        mut decision: Decision,
        started: Instant,
        request: &EnforcementRequest,
        cache_key: &str,
        cacheable: bool,
        elevate_severity: bool,
    ) -> Decision {
        decision.duration_ms = started.elapsed().as_millis() as u64;

        // A deny reached after step 5 leaves behind the budget reservation
        // that step took out; release it here so a rate-limit or policy
        // deny doesn't strand an un-finalized ledger entry (no-op if step 5
        // never ran, or denied before reserving anything).
        if !decision.allow {
            self.budget.release_reservation(request.request_id);
        }

        if cacheable && !decision.source.bypasses_cache() {
            self.cache.set(cache_key.to_string(), decision.clone(), request.sensitivity.cache_ttl());
        }

        self.emit_audit_with_elevation(&decision, request, elevate_severity);
        decision
    }

    fn emit_audit(&self, decision: &Decision, request: &EnforcementRequest) {
        self.emit_audit_with_elevation(decision, request, false);
    }

    fn emit_audit_with_elevation(&self, decision: &Decision, request: &EnforcementRequest, elevate: bool) {
        let event_type = if decision.allow {
            AuditEventKind::AuthorizationAllowed
        } else {
            AuditEventKind::AuthorizationDenied
        };
        let severity = audit_severity(decision.source, decision.allow, elevate);

        let event = AuditEvent {
            resource_id: Some(request.resource_id),
            tool_name: Some(request.action.clone()),
            policy_id: Some(request.policy_name.clone()),
            client_ip: Some(self.resolve_ip(request)),
            ..AuditEvent::new(event_type, severity, request.request_id)
        }
        .with_decision(if decision.allow { "allow" } else { "deny" })
        .with_detail("source", json!(decision.source))
        .with_detail("reason", json!(decision.reason))
        .with_detail("duration_ms", json!(decision.duration_ms))
        .with_detail("cache_hit", json!(decision.cache_hit));

        self.audit.emit(event);
    }

    /// Consumes `approval_id` only if it was granted to this same principal
    /// for this same tool — an approval id alone isn't proof of
    /// authorization for whoever happens to present it.
    fn consume_approval(&self, approval_id: Uuid, request: &EnforcementRequest) -> bool {
        let approval = match self.approvals.get(approval_id) {
            Ok(approval) => approval,
            Err(_) => return false,
        };
        if approval.requester_principal_id != request.principal_id || approval.target_tool_id != request.resource_id {
            return false;
        }
        self.approvals.use_approval(approval_id).unwrap_or(false)
    }

    fn resolve_ip(&self, request: &EnforcementRequest) -> String {
        let hints = IdentityHints {
            api_key: None,
            principal_id: None,
            bearer_token: None,
            forwarded_for: request.forwarded_for.as_deref(),
            real_ip: request.real_ip.as_deref(),
            peer_addr: request.peer_addr.as_str(),
        };
        match Identifier::resolve(&hints) {
            Identifier::Ip(ip) => ip,
            other => other.as_key(),
        }
    }

    fn cost_request(&self, request: &EnforcementRequest) -> CostRequest {
        CostRequest {
            provider: request.provider.clone(),
            model: request.model.clone(),
            estimated_input_chars: request.estimated_input_chars,
        }
    }

    /// Prospective cost for a request, exposed so the caller can record the
    /// same figure as the estimate half of the eventual ledger entry.
    pub fn estimate_cost(&self, request: &EnforcementRequest) -> CostEstimate {
        self.cost.estimate(&self.cost_request(request), &json!({"action": request.action}))
    }

    /// Finalize the budget reservation taken in step 5 with the invocation's
    /// actual cost. Call only on a successful, non-cancelled invocation —
    /// one budget ledger entry per invocation iff it completed (testable
    /// property 2); emergency-sourced allows still spend budget (see Open
    /// Question decisions) and fall back to `record_cost` since they never
    /// went through `check_and_reserve`.
    pub fn record_invocation_cost(&self, request: &EnforcementRequest, estimate: &CostEstimate, usage: Option<&UsageReport>) {
        let actual = usage.and_then(|u| self.cost.record_actual(&self.cost_request(request), u, &Value::Null));
        let entry = sark_domain::entities::BudgetLedgerEntry {
            timestamp: Utc::now(),
            principal_id: request.principal_id,
            resource_id: request.resource_id,
            provider: request.provider.clone(),
            estimated_cost: estimate.estimated_cost,
            actual_cost: actual.map(|a| a.estimated_cost),
            currency: estimate.currency.clone(),
            metadata: Default::default(),
        };
        self.budget.finalize_cost(request.request_id, entry);
    }

    /// Release the budget reservation taken in step 5 without charging for
    /// it — the downstream call failed or was cancelled. Leaves no ledger
    /// entry with nonzero cost behind.
    pub fn release_invocation_cost(&self, request: &EnforcementRequest) {
        self.budget.release_reservation(request.request_id);
    }
}

fn audit_severity(source: DecisionSource, allow: bool, elevate: bool) -> AuditSeverity {
    match source {
        DecisionSource::Error => AuditSeverity::Critical,
        DecisionSource::Emergency | DecisionSource::Override => AuditSeverity::High,
        _ if elevate => AuditSeverity::High,
        _ if !allow => AuditSeverity::Medium,
        _ => AuditSeverity::Low,
    }
}
