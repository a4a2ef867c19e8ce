//! Enforcement Pipeline (C7) — the ordered composition of cache, policy,
//! cost, budget, rate limit, and governance predicates that produces one
//! `Decision` per request. See `EnforcementPipeline::evaluate` for the
//! authoritative evaluation order.

mod pipeline;
mod request;

pub use pipeline::EnforcementPipeline;
pub use request::EnforcementRequest;
