//! Liveness/readiness/metrics endpoints. Unauthenticated and exempt from
//! rate limiting — `sark-ratelimit`'s `BYPASS_PATHS` names exactly these
//! three paths so uptime probes are never throttled.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness: also reports whether the audit pipeline's sinks are healthy
/// and whether the budget tracker considers itself available.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sinks = state.audit.sink_health();
    let degraded = sinks.iter().any(|s| !s.healthy);
    Json(json!({
        "status": if degraded { "degraded" } else { "ok" },
        "audit_sinks": sinks.iter().map(|s| json!({
            "name": s.name,
            "healthy": s.healthy,
            "queue_depth": s.queue_depth,
            "dropped_events": s.dropped_events,
        })).collect::<Vec<_>>(),
        "mcp_servers": state.mcp.server_count(),
        "mcp_tools": state.mcp.tool_count(),
    }))
}

/// Minimal text-exposition metrics. Not a full Prometheus registry (no
/// `prometheus`/`metrics` crate in the dependency set) — just the numbers
/// operators actually page on, in the same key=value shape the rest of the
/// pack's health endpoints use.
pub async fn metrics(State(state): State<AppState>) -> String {
    let sinks = state.audit.sink_health();
    let mut out = String::new();
    out.push_str(&format!("sark_mcp_servers {}\n", state.mcp.server_count()));
    out.push_str(&format!("sark_mcp_tools {}\n", state.mcp.tool_count()));
    for sink in &sinks {
        out.push_str(&format!("sark_audit_sink_healthy{{name=\"{}\"}} {}\n", sink.name, sink.healthy as u8));
        out.push_str(&format!("sark_audit_sink_queue_depth{{name=\"{}\"}} {}\n", sink.name, sink.queue_depth));
        out.push_str(&format!("sark_audit_sink_dropped_events{{name=\"{}\"}} {}\n", sink.name, sink.dropped_events));
    }
    out
}
