use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BreakerState {
    Closed,
    Open(Instant),
    HalfOpen,
}

pub enum CallError<E> {
    BreakerOpen,
    Inner(E),
}

/// `closed -> open -> half-open -> closed`. Opens after `failure_threshold`
/// consecutive failures, admits exactly one probe per half-open window.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
    consecutive_failures: AtomicU32,
    probing: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(BreakerState::Closed),
            consecutive_failures: AtomicU32::new(0),
            probing: AtomicBool::new(false),
        }
    }

    pub fn state_name(&self) -> &'static str {
        match *self.state.read() {
            BreakerState::Closed => "closed",
            BreakerState::Open(_) => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }

    fn can_proceed(&self) -> bool {
        let mut state = self.state.write();
        match *state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => !self.probing.swap(true, Ordering::SeqCst),
            BreakerState::Open(opened_at) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    *state = BreakerState::HalfOpen;
                    !self.probing.swap(true, Ordering::SeqCst)
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.probing.store(false, Ordering::SeqCst);
        *self.state.write() = BreakerState::Closed;
    }

    fn record_failure(&self) {
        self.probing.store(false, Ordering::SeqCst);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write();
        match *state {
            BreakerState::HalfOpen => {
                tracing::warn!(sink = %self.name, "probe failed, reopening circuit breaker");
                *state = BreakerState::Open(Instant::now());
            }
            BreakerState::Closed if failures >= self.config.failure_threshold => {
                tracing::warn!(sink = %self.name, failures, "circuit breaker opening");
                *state = BreakerState::Open(Instant::now());
            }
            _ => {}
        }
    }

    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.can_proceed() {
            return Err(CallError::BreakerOpen);
        }
        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CallError::Inner(err))
            }
        }
    }
}
