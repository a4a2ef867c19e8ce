//! Decision Cache (C1) — LRU+TTL store of authorization decisions.
//!
//! Backed by `lru::LruCache` guarded by a `parking_lot::RwLock`, mirroring
//! the gateway's `RwLock<HashMap<_>>` store idiom elsewhere in this
//! workspace. TTL is tracked per-entry and checked lazily on `get`; a
//! background sweeper removes expired entries periodically.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use sark_domain::entities::Decision;

struct Entry {
    decision: Decision,
    expires_at: Instant,
}

/// Snapshot of sweeper activity, per §4.1's health contract.
#[derive(Debug, Default)]
pub struct SweepStats {
    pub cleanups_run: AtomicU64,
    pub total_entries_removed: AtomicU64,
    pub last_duration_ms: AtomicU64,
    pub errors: AtomicU64,
}

/// In-memory decision cache. All operations are best-effort: a cache fault
/// never denies a request — callers that see a miss simply fall through to
/// full evaluation.
pub struct DecisionCache {
    store: RwLock<LruCache<String, Entry>>,
    stats: Arc<SweepStats>,
    running: Arc<AtomicBool>,
}

impl DecisionCache {
    pub fn new(max_size: usize) -> Self {
        let cap = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            store: RwLock::new(LruCache::new(cap)),
            stats: Arc::new(SweepStats::default()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build the canonical cache key: `policy:decision:{principal}:{action}:{resource}:{ctx-hash}`.
    pub fn build_key(principal: &str, action: &str, resource: &str, ctx_hash: &str) -> String {
        let sanitized_resource = resource.replace(':', "_");
        format!("policy:decision:{principal}:{action}:{sanitized_resource}:{ctx_hash}")
    }

    /// Deterministically hash a context bundle: serialize with sorted keys,
    /// SHA-256, first 16 hex chars.
    pub fn context_hash(ctx: &serde_json::Value) -> String {
        let canonical = canonicalize(ctx);
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)[..16].to_string()
    }

    pub fn get(&self, key: &str) -> Option<Decision> {
        let mut guard = self.store.write();
        match guard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.decision.clone()),
            Some(_) => {
                guard.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: String, decision: Decision, ttl: Duration) {
        let mut guard = self.store.write();
        guard.put(
            key,
            Entry {
                decision,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove every entry whose key starts with `prefix`.
    pub fn invalidate(&self, prefix: &str) -> usize {
        let mut guard = self.store.write();
        let stale: Vec<String> = guard
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        let n = stale.len();
        for k in stale {
            guard.pop(&k);
        }
        n
    }

    pub fn size(&self) -> usize {
        self.store.read().len()
    }

    /// Remove all expired entries and return the count removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.store.write();
        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        let n = expired.len();
        for k in &expired {
            guard.pop(k);
        }
        n
    }

    /// Spawn the background sweeper. Returns a handle that, when dropped
    /// after calling `stop`, lets the task exit cleanly.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let cache = Arc::clone(self);
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                let start = Instant::now();
                let removed = cache.cleanup_expired();
                cache.stats.cleanups_run.fetch_add(1, Ordering::Relaxed);
                cache
                    .stats
                    .total_entries_removed
                    .fetch_add(removed as u64, Ordering::Relaxed);
                cache
                    .stats
                    .last_duration_ms
                    .store(start.elapsed().as_millis() as u64, Ordering::Relaxed);
            }
        })
    }

    pub fn stop_sweeper(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// `healthy ⇔ running ∧ no repeated failures`. The in-process sweep
    /// body cannot raise (no fallible I/O), so `errors` stays at zero; the
    /// counter exists so a future sink-backed cache can report through the
    /// same contract.
    pub fn healthy(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.stats.errors.load(Ordering::Relaxed) == 0
    }

    pub fn stats(&self) -> &SweepStats {
        &self.stats
    }
}

/// Serialize a JSON value with object keys sorted recursively, so two
/// semantically-equal context bundles hash identically regardless of
/// field order.
fn canonicalize(value: &serde_json::Value) -> String {
    fn go(value: &serde_json::Value, out: &mut String) {
        match value {
            serde_json::Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(k).unwrap());
                    out.push(':');
                    go(&map[*k], out);
                }
                out.push('}');
            }
            serde_json::Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    go(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }
    let mut out = String::new();
    go(value, &mut out);
    out
}
