//! Rate Limiter (C5) — sliding-window counter over a pluggable backend.

mod backend;
mod identifier;
mod limiter;
#[cfg(feature = "redis-backend")]
mod redis_backend;

pub use backend::{BackendError, MemoryBackend, RateLimitBackend};
pub use identifier::{Identifier, IdentityHints};
pub use limiter::RateLimiter;
#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisBackend;
