//! Proactive eviction of expired entries
//!
//! Lazy expiry only reclaims keys that are read again. A sweep visits
//! every entry of every registered store and drops the ones whose window
//! or TTL has passed, so write-once keys do not accumulate.

use super::cache::RealtimeCache;
use super::rate_limiter::RateLimiter;
use super::store::{CacheStore, CounterStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;

/// A store that can drop its expired entries on demand
pub trait Sweep: Send + Sync {
    /// Label used in logs and metrics
    fn sweep_name(&self) -> &str;

    /// Remove every entry expired at `now`, returning how many were removed
    fn sweep_expired(&self, now: SystemTime) -> usize;

    /// Entries currently held, expired or not
    fn tracked(&self) -> usize;
}

impl<S: CounterStore + Send + Sync> Sweep for RateLimiter<S> {
    fn sweep_name(&self) -> &str {
        self.policy().name()
    }

    fn sweep_expired(&self, now: SystemTime) -> usize {
        self.store().remove_expired(now)
    }

    fn tracked(&self) -> usize {
        self.store().len()
    }
}

impl<S: CacheStore<Value> + Send + Sync> Sweep for RealtimeCache<S> {
    fn sweep_name(&self) -> &str {
        "cache"
    }

    fn sweep_expired(&self, now: SystemTime) -> usize {
        self.remove_expired(now)
    }

    fn tracked(&self) -> usize {
        self.len()
    }
}

/// Per-target outcome of one sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    pub name: String,
    pub removed: usize,
    pub remaining: usize,
}

/// Outcome of a sweep across all targets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub outcomes: Vec<SweepOutcome>,
}

impl SweepReport {
    pub fn total_removed(&self) -> usize {
        self.outcomes.iter().map(|o| o.removed).sum()
    }

    pub fn total_remaining(&self) -> usize {
        self.outcomes.iter().map(|o| o.remaining).sum()
    }
}

/// Sweep every target once at `now`
pub fn sweep_all(targets: &[Arc<dyn Sweep>], now: SystemTime) -> SweepReport {
    let outcomes = targets
        .iter()
        .map(|target| {
            let removed = target.sweep_expired(now);
            SweepOutcome {
                name: target.sweep_name().to_string(),
                removed,
                remaining: target.tracked(),
            }
        })
        .collect();

    SweepReport { outcomes }
}
