use super::{CAPACITY_OVERHEAD_FACTOR, CacheStore, DEFAULT_CAPACITY, KeyHasher};
use dashmap::DashMap;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    // None never expires via TTL; only del/flush_all remove it
    expires_at: Option<SystemTime>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: SystemTime) -> bool {
        match self.expires_at {
            Some(expiry) => expiry > now,
            None => true,
        }
    }
}

/// In-memory TTL cache store with lazy expiry on read
///
/// # Example
///
/// ```
/// use fleetgate::{CacheStore, MemoryCacheStore};
/// use std::time::{Duration, SystemTime};
///
/// let store = MemoryCacheStore::new();
/// let now = SystemTime::now();
/// store.set("stats:trips", 42u64, Some(Duration::from_secs(300)), now).unwrap();
/// assert_eq!(store.get("stats:trips", now).unwrap(), Some(42));
/// assert_eq!(store.get("stats:trips", now + Duration::from_secs(300)).unwrap(), None);
/// ```
#[derive(Debug)]
pub struct MemoryCacheStore<V> {
    data: DashMap<String, CacheEntry<V>, KeyHasher>,
}

impl<V: Clone> MemoryCacheStore<V> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a store sized for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryCacheStore {
            data: DashMap::with_capacity_and_hasher(
                (capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize,
                KeyHasher::default(),
            ),
        }
    }
}

impl<V: Clone> Default for MemoryCacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> CacheStore<V> for MemoryCacheStore<V> {
    fn get(&self, key: &str, now: SystemTime) -> Result<Option<V>, String> {
        // The shard guard is released before any removal below
        let lookup = self.data.get(key).map(|entry| {
            if entry.is_live(now) {
                Some(entry.value.clone())
            } else {
                None
            }
        });

        match lookup {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                // Re-check under the write lock: a concurrent set may have
                // refreshed the entry since it was read.
                self.data.remove_if(key, |_, entry| !entry.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
        now: SystemTime,
    ) -> Result<(), String> {
        let expires_at = match ttl {
            Some(ttl) if !ttl.is_zero() => Some(
                now.checked_add(ttl)
                    .ok_or_else(|| format!("ttl of {}s overflows the clock", ttl.as_secs()))?,
            ),
            _ => None,
        };

        self.data
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    fn del(&self, key: &str) -> Result<bool, String> {
        Ok(self.data.remove(key).is_some())
    }

    fn flush_all(&self) -> Result<(), String> {
        self.data.clear();
        Ok(())
    }

    fn remove_expired(&self, now: SystemTime) -> usize {
        let mut removed = 0;
        self.data.retain(|_, entry| {
            let keep = entry.is_live(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
