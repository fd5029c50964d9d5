use super::{CacheStore, CounterStore, MemoryCacheStore, MemoryCounterStore};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn at_ms(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_millis(ms)
}

#[test]
fn test_counter_first_hit_opens_window() {
    let store = MemoryCounterStore::new();
    let window = Duration::from_secs(1);

    let first = store.hit("k", window, at_ms(0)).unwrap();
    assert_eq!(first.count, 1);
    assert_eq!(first.reset_at, at_ms(1000));

    let second = store.hit("k", window, at_ms(400)).unwrap();
    assert_eq!(second.count, 2);
    assert_eq!(second.reset_at, at_ms(1000));
}

#[test]
fn test_counter_window_rolls_over() {
    let store = MemoryCounterStore::new();
    let window = Duration::from_secs(1);

    store.hit("k", window, at_ms(0)).unwrap();
    store.hit("k", window, at_ms(10)).unwrap();

    // The window is half-open: at reset_at it has already ended
    let rolled = store.hit("k", window, at_ms(1000)).unwrap();
    assert_eq!(rolled.count, 1);
    assert_eq!(rolled.reset_at, at_ms(2000));
}

#[test]
fn test_counter_rejects_window_past_clock_range() {
    let store = MemoryCounterStore::new();

    let err = store.hit("k", Duration::MAX, at_ms(0)).unwrap_err();
    assert!(err.contains("overflows"));
    assert!(store.is_empty());

    // An expired entry is left alone when its replacement cannot be built
    store.hit("k", Duration::from_secs(1), at_ms(0)).unwrap();
    assert!(store.hit("k", Duration::MAX, at_ms(5000)).is_err());
    assert_eq!(store.len(), 1);
    assert_eq!(store.peek("k", at_ms(5000)).unwrap(), None);
}

#[test]
fn test_counter_peek_does_not_count() {
    let store = MemoryCounterStore::new();
    let window = Duration::from_secs(10);

    assert_eq!(store.peek("k", at_ms(0)).unwrap(), None);
    store.hit("k", window, at_ms(0)).unwrap();

    let peeked = store.peek("k", at_ms(5)).unwrap().unwrap();
    assert_eq!(peeked.count, 1);
    assert_eq!(store.peek("k", at_ms(5)).unwrap().unwrap().count, 1);

    // Expired windows are invisible to peek
    assert_eq!(store.peek("k", at_ms(10_000)).unwrap(), None);
}

#[test]
fn test_counter_remove() {
    let store = MemoryCounterStore::new();
    store.hit("k", Duration::from_secs(10), at_ms(0)).unwrap();

    assert!(store.remove("k").unwrap());
    assert!(!store.remove("k").unwrap());
    assert!(store.is_empty());
}

#[test]
fn test_counter_remove_expired_keeps_active() {
    let store = MemoryCounterStore::new();
    for i in 0..10 {
        store
            .hit(&format!("short_{i}"), Duration::from_secs(1), at_ms(0))
            .unwrap();
        store
            .hit(&format!("long_{i}"), Duration::from_secs(3600), at_ms(0))
            .unwrap();
    }
    assert_eq!(store.len(), 20);

    let removed = store.remove_expired(at_ms(61_000));
    assert_eq!(removed, 10);
    assert_eq!(store.len(), 10);
    assert!(store.peek("long_3", at_ms(61_000)).unwrap().is_some());
}

#[test]
fn test_counter_concurrent_hits_are_not_lost() {
    let store = Arc::new(MemoryCounterStore::new());
    let now = at_ms(0);
    let window = Duration::from_secs(60);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..1000 {
                    store.hit("shared", window, now).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.peek("shared", now).unwrap().unwrap().count, 8000);
}

#[test]
fn test_counter_concurrent_rollover_resets_once() {
    let store = Arc::new(MemoryCounterStore::new());
    let window = Duration::from_secs(1);
    store.hit("edge", window, at_ms(0)).unwrap();

    // Every caller arrives exactly at the end of the first window
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.hit("edge", window, at_ms(1000)).unwrap().count)
        })
        .collect();

    let mut counts: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    counts.sort_unstable();

    // Exactly one caller opened the new window; the rest counted into it
    assert_eq!(counts, (1..=16).collect::<Vec<_>>());
}

#[test]
fn test_cache_set_get() {
    let store = MemoryCacheStore::new();
    store
        .set("a", "alpha".to_string(), Some(Duration::from_secs(5)), at_ms(0))
        .unwrap();

    assert_eq!(store.get("a", at_ms(4999)).unwrap(), Some("alpha".to_string()));
    assert_eq!(store.get("missing", at_ms(0)).unwrap(), None);
}

#[test]
fn test_cache_expired_read_deletes_entry() {
    let store = MemoryCacheStore::new();
    store.set("a", 1, Some(Duration::from_secs(5)), at_ms(0)).unwrap();
    assert_eq!(store.len(), 1);

    assert_eq!(store.get("a", at_ms(5000)).unwrap(), None);
    assert_eq!(store.len(), 0);
}

#[test]
fn test_cache_no_ttl_never_expires() {
    let store = MemoryCacheStore::new();
    store.set("forever", 7, None, at_ms(0)).unwrap();
    store.set("zero", 8, Some(Duration::ZERO), at_ms(0)).unwrap();

    let much_later = at_ms(0) + Duration::from_secs(10 * 365 * 24 * 3600);
    assert_eq!(store.get("forever", much_later).unwrap(), Some(7));
    assert_eq!(store.get("zero", much_later).unwrap(), Some(8));

    assert!(store.del("forever").unwrap());
    assert_eq!(store.get("forever", much_later).unwrap(), None);

    store.flush_all().unwrap();
    assert_eq!(store.get("zero", much_later).unwrap(), None);
    assert!(store.is_empty());
}

#[test]
fn test_cache_overwrite_refreshes_expiry() {
    let store = MemoryCacheStore::new();
    store.set("k", 1, Some(Duration::from_secs(1)), at_ms(0)).unwrap();
    store.set("k", 2, Some(Duration::from_secs(1)), at_ms(900)).unwrap();

    assert_eq!(store.get("k", at_ms(1500)).unwrap(), Some(2));
    assert_eq!(store.get("k", at_ms(1900)).unwrap(), None);
}

#[test]
fn test_cache_remove_expired_leaves_live_entries() {
    let store = MemoryCacheStore::new();
    for i in 0..5 {
        store
            .set(&format!("stale_{i}"), i, Some(Duration::from_secs(1)), at_ms(0))
            .unwrap();
    }
    store.set("fresh", 100, Some(Duration::from_secs(600)), at_ms(0)).unwrap();
    store.set("pinned", 200, None, at_ms(0)).unwrap();

    assert_eq!(store.remove_expired(at_ms(2000)), 5);
    assert_eq!(store.len(), 2);
    assert_eq!(store.get("fresh", at_ms(2000)).unwrap(), Some(100));
    assert_eq!(store.get("pinned", at_ms(2000)).unwrap(), Some(200));
}

#[test]
fn test_cache_distinct_keys_do_not_interfere() {
    let store = Arc::new(MemoryCacheStore::new());
    let now = at_ms(0);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..500u64 {
                    let key = format!("t{t}:{i}");
                    store.set(&key, t * 10_000 + i, None, now).unwrap();
                    assert_eq!(store.get(&key, now).unwrap(), Some(t * 10_000 + i));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.len(), 4000);
}
