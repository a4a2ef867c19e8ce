//! Policy Engine Adapter (C2) — embedded and remote evaluators behind one
//! routing adapter.

mod adapter;
mod document;
mod embedded;
mod loader;
mod remote;
mod rollout;
mod traits;

pub use adapter::PolicyEngineAdapter;
pub use document::{Condition, ConditionOp, Effect, PolicyDocument, Rule};
pub use embedded::EmbeddedEvaluator;
pub use remote::RemoteEvaluator;
pub use rollout::RolloutRegistry;
pub use traits::{InputBundle, PolicyBackend, PolicyError, PolicyOutcome, PolicyQuery};
