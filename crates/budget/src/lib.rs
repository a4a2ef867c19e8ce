//! Budget Tracker (C4) — per-principal daily/monthly spend caps.
//!
//! Generalizes a single daily counter into an append-only ledger with
//! derived, short-lived cached aggregates, keyed by `(principal, period)`
//! and invalidated whenever a new entry lands for that principal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use uuid::Uuid;

use sark_domain::config::BudgetConfig;
use sark_domain::entities::{BudgetAggregate, BudgetLedgerEntry};
use sark_domain::error::BudgetPeriod;

const AGGREGATE_CACHE_TTL: Duration = Duration::from_secs(2);

struct CachedAggregate {
    aggregate: BudgetAggregate,
    computed_at: Instant,
}

/// In-memory budget tracker. `unavailable` lets a future persistent-ledger
/// backend report an outage through the same fail-closed path without
/// changing the `check_budget` signature.
///
/// `principal_locks` shards a serialization point per principal, the way
/// `tool_defs_cache`/`user_facts_cache` shard their entries instead of one
/// giant lock: `check_and_reserve` holds a given principal's mutex only
/// across the check-then-append of a provisional ledger entry, never across
/// the downstream call that follows. `reservations` remembers where that
/// provisional entry landed so `finalize_cost`/`release_reservation` can
/// update it in place later without re-acquiring the mutex — safe because
/// the ledger is append-only and a `Vec` index never moves once pushed.
pub struct BudgetTracker {
    config: BudgetConfig,
    ledger: RwLock<HashMap<Uuid, Vec<BudgetLedgerEntry>>>,
    agg_cache: RwLock<HashMap<(Uuid, BudgetPeriod), CachedAggregate>>,
    unavailable: AtomicBool,
    principal_locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
    reservations: RwLock<HashMap<Uuid, (Uuid, usize)>>,
}

impl BudgetTracker {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            ledger: RwLock::new(HashMap::new()),
            agg_cache: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            principal_locks: RwLock::new(HashMap::new()),
            reservations: RwLock::new(HashMap::new()),
        }
    }

    fn principal_lock(&self, principal_id: Uuid) -> Arc<Mutex<()>> {
        if let Some(lock) = self.principal_locks.read().get(&principal_id) {
            return lock.clone();
        }
        self.principal_locks
            .write()
            .entry(principal_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Mark the ledger backend down. Subsequent `check_budget` calls fail
    /// closed until `mark_available` is called.
    pub fn mark_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn mark_available(&self) {
        self.unavailable.store(false, Ordering::SeqCst);
    }

    fn resolve_caps(&self, principal_id: Uuid, device: Option<&str>) -> (Decimal, Decimal) {
        let mut daily = self.config.daily_cap;
        let mut monthly = self.config.monthly_cap;

        if let Some(over) = self.config.per_principal.get(&principal_id.to_string()) {
            if let Some(d) = over.daily_cap {
                daily = d;
            }
            if let Some(m) = over.monthly_cap {
                monthly = m;
            }
        }

        if let Some(device) = device {
            if let Some(over) = self.config.per_device.get(device) {
                if let Some(d) = over.daily_cap {
                    daily = d;
                }
                if let Some(m) = over.monthly_cap {
                    monthly = m;
                }
            }
        }

        (daily, monthly)
    }

    fn period_start(&self, now: DateTime<Utc>, period: BudgetPeriod) -> DateTime<Utc> {
        let tz: chrono_tz::Tz = self.config.timezone.parse().unwrap_or(chrono_tz::UTC);
        let local = now.with_timezone(&tz);
        let start_local = match period {
            BudgetPeriod::Daily => tz
                .with_ymd_and_hms(local.year(), local.month(), local.day(), 0, 0, 0)
                .single(),
            BudgetPeriod::Monthly => tz.with_ymd_and_hms(local.year(), local.month(), 1, 0, 0, 0).single(),
        };
        start_local
            .unwrap_or(local)
            .with_timezone(&Utc)
    }

    /// Recompute (or return the still-fresh cached) aggregate for a principal
    /// and period.
    pub fn aggregate(&self, principal_id: Uuid, period: BudgetPeriod) -> BudgetAggregate {
        {
            let cache = self.agg_cache.read();
            if let Some(cached) = cache.get(&(principal_id, period)) {
                if cached.computed_at.elapsed() < AGGREGATE_CACHE_TTL {
                    return cached.aggregate.clone();
                }
            }
        }

        let now = Utc::now();
        let start = self.period_start(now, period);
        let ledger = self.ledger.read();
        let entries = ledger.get(&principal_id).map(Vec::as_slice).unwrap_or(&[]);

        let mut aggregate = BudgetAggregate::default();
        for entry in entries.iter().filter(|e| e.timestamp >= start) {
            let cost = entry.effective_cost();
            aggregate.spent += cost;
            *aggregate.by_provider.entry(entry.provider.clone()).or_insert(Decimal::ZERO) += cost;
            let model = entry
                .metadata
                .get("model")
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            *aggregate.by_model.entry(model).or_insert(Decimal::ZERO) += cost;
            aggregate.count += 1;
        }
        drop(ledger);

        self.agg_cache.write().insert(
            (principal_id, period),
            CachedAggregate {
                aggregate: aggregate.clone(),
                computed_at: Instant::now(),
            },
        );
        aggregate
    }

    /// `true` iff `current_daily_spend + cost ≤ daily_cap ∧ current_monthly_spend + cost ≤ monthly_cap`.
    pub fn check_budget(
        &self,
        principal_id: Uuid,
        device: Option<&str>,
        prospective_cost: Decimal,
    ) -> (bool, Option<String>) {
        if self.unavailable.load(Ordering::SeqCst) {
            return (false, Some("budget service unavailable".to_string()));
        }

        let (daily_cap, monthly_cap) = self.resolve_caps(principal_id, device);
        let daily_spent = self.aggregate(principal_id, BudgetPeriod::Daily).spent;
        let monthly_spent = self.aggregate(principal_id, BudgetPeriod::Monthly).spent;

        if daily_spent + prospective_cost > daily_cap {
            return (false, Some(format!("daily budget cap of {daily_cap} would be exceeded")));
        }
        if monthly_spent + prospective_cost > monthly_cap {
            return (
                false,
                Some(format!("monthly budget cap of {monthly_cap} would be exceeded")),
            );
        }
        (true, None)
    }

    /// Append a ledger entry and invalidate cached aggregates for its principal.
    pub fn record_cost(&self, entry: BudgetLedgerEntry) {
        let principal_id = entry.principal_id;
        let mut ledger = self.ledger.write();
        let entries = ledger.entry(principal_id).or_default();
        entries.push(entry);
        drop(ledger);
        let mut cache = self.agg_cache.write();
        cache.remove(&(principal_id, BudgetPeriod::Daily));
        cache.remove(&(principal_id, BudgetPeriod::Monthly));
    }

    /// Check the cap and, if it passes, provisionally append `entry` to the
    /// ledger — both under the same per-principal mutex, closing the window
    /// where two concurrent requests for one principal could each pass the
    /// check before either records. `entry.actual_cost` should be `None`;
    /// the reservation counts `entry.estimated_cost` against the cap until
    /// `finalize_cost` or `release_reservation` resolves it.
    pub fn check_and_reserve(
        &self,
        request_id: Uuid,
        entry: BudgetLedgerEntry,
        device: Option<&str>,
    ) -> (bool, Option<String>) {
        let principal_id = entry.principal_id;
        let lock = self.principal_lock(principal_id);
        let _guard = lock.lock();

        let (allowed, reason) = self.check_budget(principal_id, device, entry.estimated_cost);
        if !allowed {
            return (allowed, reason);
        }

        let mut ledger = self.ledger.write();
        let entries = ledger.entry(principal_id).or_default();
        let index = entries.len();
        entries.push(entry);
        drop(ledger);

        let mut cache = self.agg_cache.write();
        cache.remove(&(principal_id, BudgetPeriod::Daily));
        cache.remove(&(principal_id, BudgetPeriod::Monthly));
        drop(cache);

        self.reservations.write().insert(request_id, (principal_id, index));
        (true, None)
    }

    /// Resolve a reservation made by `check_and_reserve` with the invocation's
    /// real cost. Falls back to a plain `record_cost` when no reservation
    /// exists (emergency/allowlist/override paths that bypass the budget
    /// check entirely but still want spend accounted for).
    pub fn finalize_cost(&self, request_id: Uuid, entry: BudgetLedgerEntry) {
        if let Some((principal_id, index)) = self.reservations.write().remove(&request_id) {
            let mut ledger = self.ledger.write();
            if let Some(slot) = ledger.get_mut(&principal_id).and_then(|e| e.get_mut(index)) {
                *slot = entry;
            }
            drop(ledger);
            let mut cache = self.agg_cache.write();
            cache.remove(&(principal_id, BudgetPeriod::Daily));
            cache.remove(&(principal_id, BudgetPeriod::Monthly));
            return;
        }
        self.record_cost(entry);
    }

    /// Release a reservation without charging for it — the downstream call
    /// failed or was cancelled after passing the budget check. Zeroes the
    /// reserved entry's cost rather than removing it, so the ledger stays
    /// append-only and indices already handed out elsewhere stay valid.
    pub fn release_reservation(&self, request_id: Uuid) {
        if let Some((principal_id, index)) = self.reservations.write().remove(&request_id) {
            let mut ledger = self.ledger.write();
            if let Some(slot) = ledger.get_mut(&principal_id).and_then(|e| e.get_mut(index)) {
                slot.estimated_cost = Decimal::ZERO;
                slot.actual_cost = Some(Decimal::ZERO);
            }
            drop(ledger);
            let mut cache = self.agg_cache.write();
            cache.remove(&(principal_id, BudgetPeriod::Daily));
            cache.remove(&(principal_id, BudgetPeriod::Monthly));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sark_domain::config::BudgetOverride;
    use std::collections::HashMap as StdHashMap;

    fn config() -> BudgetConfig {
        BudgetConfig {
            daily_cap: dec!(10.00),
            monthly_cap: dec!(200.00),
            timezone: "UTC".into(),
            per_principal: StdHashMap::new(),
            per_device: StdHashMap::new(),
        }
    }

    fn entry(principal_id: Uuid, cost: Decimal) -> BudgetLedgerEntry {
        BudgetLedgerEntry {
            timestamp: Utc::now(),
            principal_id,
            resource_id: Uuid::new_v4(),
            provider: "openai".into(),
            estimated_cost: cost,
            actual_cost: None,
            currency: "USD".into(),
            metadata: StdHashMap::new(),
        }
    }

    #[test]
    fn fresh_principal_passes_check() {
        let tracker = BudgetTracker::new(config());
        let (allowed, reason) = tracker.check_budget(Uuid::new_v4(), None, dec!(1.00));
        assert!(allowed);
        assert!(reason.is_none());
    }

    #[test]
    fn daily_cap_enforced() {
        let tracker = BudgetTracker::new(config());
        let p = Uuid::new_v4();
        tracker.record_cost(entry(p, dec!(9.99)));
        let (allowed, reason) = tracker.check_budget(p, None, dec!(0.02));
        assert!(!allowed);
        assert!(reason.unwrap().contains("daily"));
    }

    #[test]
    fn exact_cap_boundary_is_allowed() {
        let tracker = BudgetTracker::new(config());
        let p = Uuid::new_v4();
        tracker.record_cost(entry(p, dec!(9.00)));
        let (allowed, _) = tracker.check_budget(p, None, dec!(1.00));
        assert!(allowed);
    }

    #[test]
    fn per_principal_override_raises_cap() {
        let mut cfg = config();
        let p = Uuid::new_v4();
        cfg.per_principal.insert(
            p.to_string(),
            BudgetOverride {
                daily_cap: Some(dec!(100.00)),
                monthly_cap: None,
            },
        );
        let tracker = BudgetTracker::new(cfg);
        tracker.record_cost(entry(p, dec!(50.00)));
        let (allowed, _) = tracker.check_budget(p, None, dec!(10.00));
        assert!(allowed);
    }

    #[test]
    fn per_device_override_takes_precedence_over_principal() {
        let mut cfg = config();
        let p = Uuid::new_v4();
        cfg.per_principal.insert(
            p.to_string(),
            BudgetOverride {
                daily_cap: Some(dec!(5.00)),
                monthly_cap: None,
            },
        );
        cfg.per_device.insert(
            "device-1".to_string(),
            BudgetOverride {
                daily_cap: Some(dec!(50.00)),
                monthly_cap: None,
            },
        );
        let tracker = BudgetTracker::new(cfg);
        tracker.record_cost(entry(p, dec!(20.00)));
        let (allowed, _) = tracker.check_budget(p, Some("device-1"), dec!(10.00));
        assert!(allowed);
    }

    #[test]
    fn record_cost_invalidates_cached_aggregate() {
        let tracker = BudgetTracker::new(config());
        let p = Uuid::new_v4();
        assert_eq!(tracker.aggregate(p, BudgetPeriod::Daily).spent, Decimal::ZERO);
        tracker.record_cost(entry(p, dec!(3.00)));
        assert_eq!(tracker.aggregate(p, BudgetPeriod::Daily).spent, dec!(3.00));
    }

    #[test]
    fn aggregate_groups_by_provider() {
        let tracker = BudgetTracker::new(config());
        let p = Uuid::new_v4();
        tracker.record_cost(entry(p, dec!(1.00)));
        let mut e2 = entry(p, dec!(2.00));
        e2.provider = "anthropic".into();
        tracker.record_cost(e2);
        let agg = tracker.aggregate(p, BudgetPeriod::Daily);
        assert_eq!(agg.spent, dec!(3.00));
        assert_eq!(agg.by_provider.get("openai"), Some(&dec!(1.00)));
        assert_eq!(agg.by_provider.get("anthropic"), Some(&dec!(2.00)));
        assert_eq!(agg.count, 2);
    }

    #[test]
    fn unavailable_flag_fails_closed() {
        let tracker = BudgetTracker::new(config());
        tracker.mark_unavailable();
        let (allowed, reason) = tracker.check_budget(Uuid::new_v4(), None, dec!(0.01));
        assert!(!allowed);
        assert_eq!(reason.unwrap(), "budget service unavailable");
        tracker.mark_available();
        let (allowed, _) = tracker.check_budget(Uuid::new_v4(), None, dec!(0.01));
        assert!(allowed);
    }

    #[test]
    fn actual_cost_overrides_estimate_in_aggregate() {
        let tracker = BudgetTracker::new(config());
        let p = Uuid::new_v4();
        let mut e = entry(p, dec!(5.00));
        e.actual_cost = Some(dec!(1.00));
        tracker.record_cost(e);
        assert_eq!(tracker.aggregate(p, BudgetPeriod::Daily).spent, dec!(1.00));
    }

    #[test]
    fn reservation_counts_against_cap_before_finalize() {
        let tracker = BudgetTracker::new(config());
        let p = Uuid::new_v4();
        let r1 = Uuid::new_v4();
        let (allowed, _) = tracker.check_and_reserve(r1, entry(p, dec!(9.99)), None);
        assert!(allowed);
        let (allowed, reason) = tracker.check_budget(p, None, dec!(0.02));
        assert!(!allowed);
        assert!(reason.unwrap().contains("daily"));
    }

    #[test]
    fn second_concurrent_reservation_is_denied_until_first_resolves() {
        let tracker = BudgetTracker::new(config());
        let p = Uuid::new_v4();
        let r1 = Uuid::new_v4();
        let r2 = Uuid::new_v4();
        let (first, _) = tracker.check_and_reserve(r1, entry(p, dec!(6.00)), None);
        assert!(first);
        let (second, _) = tracker.check_and_reserve(r2, entry(p, dec!(6.00)), None);
        assert!(!second, "second reservation must see the first's spend already accounted");
    }

    #[test]
    fn finalize_cost_updates_reserved_entry_in_place() {
        let tracker = BudgetTracker::new(config());
        let p = Uuid::new_v4();
        let r1 = Uuid::new_v4();
        tracker.check_and_reserve(r1, entry(p, dec!(5.00)), None);
        let mut actual = entry(p, dec!(5.00));
        actual.actual_cost = Some(dec!(2.00));
        tracker.finalize_cost(r1, actual);
        assert_eq!(tracker.aggregate(p, BudgetPeriod::Daily).spent, dec!(2.00));
    }

    #[test]
    fn release_reservation_zeroes_reserved_spend() {
        let tracker = BudgetTracker::new(config());
        let p = Uuid::new_v4();
        let r1 = Uuid::new_v4();
        tracker.check_and_reserve(r1, entry(p, dec!(5.00)), None);
        tracker.release_reservation(r1);
        assert_eq!(tracker.aggregate(p, BudgetPeriod::Daily).spent, Decimal::ZERO);
        let (allowed, _) = tracker.check_budget(p, None, dec!(9.99));
        assert!(allowed);
    }

    #[test]
    fn finalize_without_reservation_falls_back_to_record_cost() {
        let tracker = BudgetTracker::new(config());
        let p = Uuid::new_v4();
        tracker.finalize_cost(Uuid::new_v4(), entry(p, dec!(3.00)));
        assert_eq!(tracker.aggregate(p, BudgetPeriod::Daily).spent, dec!(3.00));
    }
}
