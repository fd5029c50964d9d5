//! Storage backends for rate limit counters and cached values
//!
//! Both stores are process-local. Limits and cached values are not shared
//! across horizontally scaled instances; a distributed backend can be
//! plugged in by implementing [`CounterStore`] or [`CacheStore`] without
//! touching any caller.

use std::time::{Duration, SystemTime};

mod counter;
mod ttl;

pub use counter::MemoryCounterStore;
pub use ttl::MemoryCacheStore;

#[cfg(test)]
mod tests;

#[cfg(feature = "ahash")]
pub(crate) type KeyHasher = ahash::RandomState;
#[cfg(not(feature = "ahash"))]
pub(crate) type KeyHasher = std::collections::hash_map::RandomState;

// Pre-allocate with overhead to avoid rehashing
pub(crate) const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;
pub(crate) const DEFAULT_CAPACITY: usize = 1000;

/// Snapshot of one caller's window after a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Requests observed in the current window, including this one
    pub count: u64,
    /// Absolute end of the current window
    pub reset_at: SystemTime,
}

/// Counter storage for fixed-window rate limiting
///
/// [`hit`](CounterStore::hit) is the whole check-then-increment step and
/// must be atomic per key: two concurrent hits on the same key never both
/// observe the same count.
pub trait CounterStore {
    /// Count one request for `key`, opening a fresh window when none is active
    fn hit(&self, key: &str, window: Duration, now: SystemTime) -> Result<WindowCount, String>;

    /// Read the active window without counting
    fn peek(&self, key: &str, now: SystemTime) -> Result<Option<WindowCount>, String>;

    /// Forget `key`, returning whether it was tracked
    fn remove(&self, key: &str) -> Result<bool, String>;

    /// Drop every window that ended at or before `now`, returning how many were removed
    fn remove_expired(&self, now: SystemTime) -> usize;

    /// Number of tracked keys, expired or not
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Key/value storage with optional per-entry expiry
///
/// A read must never return an entry whose expiry has passed, whether or
/// not it has been physically removed yet.
pub trait CacheStore<V> {
    /// Read a live value, deleting it as a side effect if it has expired
    fn get(&self, key: &str, now: SystemTime) -> Result<Option<V>, String>;

    /// Store `value`; `None` or a zero `ttl` means it never expires
    fn set(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
        now: SystemTime,
    ) -> Result<(), String>;

    /// Delete `key`, returning whether it was present
    fn del(&self, key: &str) -> Result<bool, String>;

    /// Delete every entry
    fn flush_all(&self) -> Result<(), String>;

    /// Drop every entry that expired at or before `now`, returning how many were removed
    fn remove_expired(&self, now: SystemTime) -> usize;

    /// Number of stored entries, expired or not
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
