//! Ephemeral caching for real-time data
//!
//! [`EphemeralCache`] guards a [`CacheStore`] with an explicit lifecycle and
//! absorbs every backend failure. [`RealtimeCache`] is the only surface
//! downstream code sees: fixed key prefixes and default TTLs for driver
//! locations, nearby-driver candidates, sessions and statistics.

use super::store::{CacheStore, MemoryCacheStore};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

pub const DRIVER_LOCATION_PREFIX: &str = "driver:location:";
pub const NEARBY_DRIVERS_PREFIX: &str = "nearby:drivers:";
pub const SESSION_PREFIX: &str = "session:";
pub const STATS_PREFIX: &str = "stats:";

pub const DRIVER_LOCATION_TTL: Duration = Duration::from_secs(60);
pub const NEARBY_DRIVERS_TTL: Duration = Duration::from_secs(30);
pub const SESSION_TTL: Duration = Duration::from_secs(3600);
pub const STATS_TTL: Duration = Duration::from_secs(300);

/// TTL cache that is a safe no-op until initialised
///
/// Before [`init`](EphemeralCache::init) and after
/// [`shutdown`](EphemeralCache::shutdown), reads miss and writes are
/// dropped. Store errors are logged and turned into the same defaults,
/// so callers never see a cache failure.
pub struct EphemeralCache<S = MemoryCacheStore<Value>> {
    store: S,
    ready: AtomicBool,
    // Serialises init and shutdown
    lifecycle: Mutex<()>,
}

impl EphemeralCache<MemoryCacheStore<Value>> {
    /// Create an uninitialised cache over an in-memory store
    pub fn new() -> Self {
        Self::with_store(MemoryCacheStore::new())
    }
}

impl Default for EphemeralCache<MemoryCacheStore<Value>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CacheStore<Value>> EphemeralCache<S> {
    /// Create an uninitialised cache over `store`
    pub fn with_store(store: S) -> Self {
        EphemeralCache {
            store,
            ready: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    /// Start serving reads and writes from an empty store
    ///
    /// Writes that raced a previous [`shutdown`](EphemeralCache::shutdown)
    /// are dropped here, before the first read is served.
    pub fn init(&self) {
        let _guard = self.lifecycle.lock();
        if self.is_ready() {
            return;
        }
        if let Err(e) = self.store.flush_all() {
            tracing::warn!("cache flush on init failed: {}", e);
        }
        self.ready.store(true, Ordering::Release);
        tracing::info!("ephemeral cache initialised");
    }

    /// Stop serving and drop every entry
    pub fn shutdown(&self) {
        let _guard = self.lifecycle.lock();
        if self.ready.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.store.flush_all() {
                tracing::warn!("cache flush on shutdown failed: {}", e);
            }
            tracing::info!("ephemeral cache shut down");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn get(&self, key: &str, now: SystemTime) -> Option<Value> {
        if !self.is_ready() {
            return None;
        }
        match self.store.get(key, now) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key, "cache read failed: {}", e);
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>, now: SystemTime) {
        if !self.is_ready() {
            return;
        }
        if let Err(e) = self.store.set(key, value, ttl, now) {
            tracing::error!(key, "cache write failed: {}", e);
        }
    }

    pub fn del(&self, key: &str) {
        if !self.is_ready() {
            return;
        }
        if let Err(e) = self.store.del(key) {
            tracing::error!(key, "cache delete failed: {}", e);
        }
    }

    pub fn flush_all(&self) {
        if !self.is_ready() {
            return;
        }
        if let Err(e) = self.store.flush_all() {
            tracing::error!("cache flush failed: {}", e);
        }
    }

    /// Drop expired entries; runs even when not ready so memory is still reclaimed
    pub fn remove_expired(&self, now: SystemTime) -> usize {
        self.store.remove_expired(now)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Last reported position of a driver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Domain-keyed cache for real-time features
///
/// # Example
///
/// ```
/// use fleetgate::{DriverLocation, RealtimeCache};
/// use std::time::{Duration, SystemTime};
///
/// let cache = RealtimeCache::new();
/// cache.init();
///
/// let now = SystemTime::now();
/// cache.cache_driver_location("d1", 12.9, 77.6, now);
/// assert_eq!(
///     cache.get_driver_location("d1", now + Duration::from_secs(30)),
///     Some(DriverLocation { latitude: 12.9, longitude: 77.6 })
/// );
/// assert_eq!(cache.get_driver_location("d1", now + Duration::from_secs(60)), None);
/// ```
pub struct RealtimeCache<S = MemoryCacheStore<Value>> {
    inner: EphemeralCache<S>,
}

impl RealtimeCache<MemoryCacheStore<Value>> {
    pub fn new() -> Self {
        Self::with_store(MemoryCacheStore::new())
    }

    /// Create a cache backed by an in-memory store sized for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_store(MemoryCacheStore::with_capacity(capacity))
    }
}

impl Default for RealtimeCache<MemoryCacheStore<Value>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CacheStore<Value>> RealtimeCache<S> {
    pub fn with_store(store: S) -> Self {
        RealtimeCache {
            inner: EphemeralCache::with_store(store),
        }
    }

    pub fn init(&self) {
        self.inner.init();
    }

    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    pub fn remove_expired(&self, now: SystemTime) -> usize {
        self.inner.remove_expired(now)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    // Driver location

    pub fn cache_driver_location(
        &self,
        driver_id: &str,
        latitude: f64,
        longitude: f64,
        now: SystemTime,
    ) {
        let location = DriverLocation {
            latitude,
            longitude,
        };
        self.put(
            &format!("{DRIVER_LOCATION_PREFIX}{driver_id}"),
            &location,
            DRIVER_LOCATION_TTL,
            now,
        );
    }

    pub fn get_driver_location(&self, driver_id: &str, now: SystemTime) -> Option<DriverLocation> {
        self.fetch(&format!("{DRIVER_LOCATION_PREFIX}{driver_id}"), now)
    }

    pub fn invalidate_driver_location(&self, driver_id: &str) {
        self.inner.del(&format!("{DRIVER_LOCATION_PREFIX}{driver_id}"));
    }

    // Nearby drivers

    /// Cache the candidate list computed for one nearby-driver query
    pub fn cache_nearby_drivers<T: Serialize>(
        &self,
        fingerprint: &str,
        candidates: &T,
        now: SystemTime,
    ) {
        self.put(
            &format!("{NEARBY_DRIVERS_PREFIX}{fingerprint}"),
            candidates,
            NEARBY_DRIVERS_TTL,
            now,
        );
    }

    pub fn get_nearby_drivers<T: DeserializeOwned>(
        &self,
        fingerprint: &str,
        now: SystemTime,
    ) -> Option<T> {
        self.fetch(&format!("{NEARBY_DRIVERS_PREFIX}{fingerprint}"), now)
    }

    // Sessions

    pub fn cache_session<T: Serialize>(&self, user_id: &str, session: &T, now: SystemTime) {
        self.put(
            &format!("{SESSION_PREFIX}{user_id}"),
            session,
            SESSION_TTL,
            now,
        );
    }

    pub fn get_session<T: DeserializeOwned>(&self, user_id: &str, now: SystemTime) -> Option<T> {
        self.fetch(&format!("{SESSION_PREFIX}{user_id}"), now)
    }

    pub fn invalidate_session(&self, user_id: &str) {
        self.inner.del(&format!("{SESSION_PREFIX}{user_id}"));
    }

    // Statistics

    /// Cache a statistic for `ttl`, or five minutes when `ttl` is `None`
    pub fn cache_stats<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        now: SystemTime,
    ) {
        self.put(
            &format!("{STATS_PREFIX}{key}"),
            value,
            ttl.unwrap_or(STATS_TTL),
            now,
        );
    }

    pub fn get_stats<T: DeserializeOwned>(&self, key: &str, now: SystemTime) -> Option<T> {
        self.fetch(&format!("{STATS_PREFIX}{key}"), now)
    }

    fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration, now: SystemTime) {
        match serde_json::to_value(value) {
            Ok(value) => self.inner.set(key, value, Some(ttl), now),
            Err(e) => tracing::warn!(key, "cache value could not be encoded: {}", e),
        }
    }

    fn fetch<T: DeserializeOwned>(&self, key: &str, now: SystemTime) -> Option<T> {
        let value = self.inner.get(key, now)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(key, "cached value has unexpected shape: {}", e);
                None
            }
        }
    }
}
