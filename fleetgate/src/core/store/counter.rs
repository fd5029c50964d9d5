use super::{CAPACITY_OVERHEAD_FACTOR, CounterStore, DEFAULT_CAPACITY, KeyHasher, WindowCount};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    count: u64,
    reset_at: SystemTime,
}

impl CounterEntry {
    fn fresh(window: Duration, now: SystemTime) -> Result<Self, String> {
        let reset_at = now
            .checked_add(window)
            .ok_or_else(|| format!("window of {}s overflows the clock", window.as_secs()))?;
        Ok(CounterEntry { count: 1, reset_at })
    }

    fn is_active(&self, now: SystemTime) -> bool {
        self.reset_at > now
    }

    fn snapshot(&self) -> WindowCount {
        WindowCount {
            count: self.count,
            reset_at: self.reset_at,
        }
    }
}

/// In-memory fixed-window counter store
///
/// Keys are spread over lock-sharded maps. A hit holds the shard's write
/// lock for the whole read-compare-increment step, so concurrent callers
/// on one key are serialised while unrelated keys mostly proceed in
/// parallel.
///
/// # Example
///
/// ```
/// use fleetgate::{CounterStore, MemoryCounterStore};
/// use std::time::{Duration, SystemTime};
///
/// let store = MemoryCounterStore::new();
/// let now = SystemTime::now();
/// let first = store.hit("10.0.0.1", Duration::from_secs(60), now).unwrap();
/// assert_eq!(first.count, 1);
/// ```
#[derive(Debug)]
pub struct MemoryCounterStore {
    data: DashMap<String, CounterEntry, KeyHasher>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a store sized for `capacity` distinct callers
    ///
    /// The store will allocate 30% more space to reduce hash collisions.
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryCounterStore {
            data: DashMap::with_capacity_and_hasher(
                (capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize,
                KeyHasher::default(),
            ),
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for MemoryCounterStore {
    fn hit(&self, key: &str, window: Duration, now: SystemTime) -> Result<WindowCount, String> {
        // Fast path: the key is already tracked, no allocation needed
        if let Some(mut entry) = self.data.get_mut(key) {
            if entry.is_active(now) {
                entry.count = entry.count.saturating_add(1);
            } else {
                *entry = CounterEntry::fresh(window, now)?;
            }
            return Ok(entry.snapshot());
        }

        // Another caller may insert between the lookup above and here;
        // the entry API settles that under the shard lock.
        let snapshot = match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_active(now) {
                    entry.count = entry.count.saturating_add(1);
                } else {
                    *entry = CounterEntry::fresh(window, now)?;
                }
                entry.snapshot()
            }
            Entry::Vacant(vacant) => vacant.insert(CounterEntry::fresh(window, now)?).snapshot(),
        };

        Ok(snapshot)
    }

    fn peek(&self, key: &str, now: SystemTime) -> Result<Option<WindowCount>, String> {
        Ok(self
            .data
            .get(key)
            .filter(|entry| entry.is_active(now))
            .map(|entry| entry.snapshot()))
    }

    fn remove(&self, key: &str) -> Result<bool, String> {
        Ok(self.data.remove(key).is_some())
    }

    fn remove_expired(&self, now: SystemTime) -> usize {
        let mut removed = 0;
        self.data.retain(|_, entry| {
            let keep = entry.is_active(now);
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
