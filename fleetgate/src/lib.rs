//! # fleetgate
//!
//! Request throttling and ephemeral caching for the real-time side of a
//! transport platform: live driver locations, dispatch candidate lookups,
//! map reads, sessions and statistics.
//!
//! ## Overview
//!
//! - **Fixed-window rate limiting**: each caller key gets a counter that
//!   resets entirely at the end of its window
//! - **TTL caching**: values expire at an absolute time and are never
//!   served after it, whether or not they have been evicted yet
//! - **Sweeping**: one call reclaims every expired counter and cache entry
//! - **Failure absorption**: store errors never reach the caller
//!
//! Every time-sensitive operation takes `now: SystemTime`, so callers (and
//! tests) control the clock.
//!
//! ## Quick Start
//!
//! ```
//! use fleetgate::{Decision, Policy, RateLimiter};
//! use std::time::SystemTime;
//!
//! // 100 requests per 15 minutes per caller
//! let limiter = RateLimiter::new(Policy::standard());
//!
//! match limiter.check("203.0.113.9", SystemTime::now()) {
//!     Decision::Allowed(result) => {
//!         println!("Request allowed! Remaining: {}", result.remaining);
//!     }
//!     Decision::Denied { retry_after_secs, .. } => {
//!         println!("Rate limited! Retry after: {} seconds", retry_after_secs);
//!     }
//! }
//! ```
//!
//! ## Policies
//!
//! | Preset | Use | Limit |
//! |---|---|---|
//! | [`Policy::strict`] | authentication | 5 / 15 min |
//! | [`Policy::standard`] | general API | 100 / 15 min |
//! | [`Policy::lenient`] | public endpoints | 200 / 15 min |
//!
//! ## Caching
//!
//! [`RealtimeCache`] is inert until [`init`](RealtimeCache::init) is called,
//! so components may touch it during startup or after shutdown without
//! special-casing.
//!
//! ```
//! use fleetgate::RealtimeCache;
//! use std::time::SystemTime;
//!
//! let cache = RealtimeCache::new();
//! let now = SystemTime::now();
//!
//! cache.cache_session("u1", &"token", now);
//! assert_eq!(cache.get_session::<String>("u1", now), None);
//!
//! cache.init();
//! cache.cache_session("u1", &"token", now);
//! assert_eq!(cache.get_session::<String>("u1", now).as_deref(), Some("token"));
//! ```
//!
//! | Wrapper | Key | TTL |
//! |---|---|---|
//! | driver location | `driver:location:<id>` | 60s |
//! | nearby drivers | `nearby:drivers:<fingerprint>` | 30s |
//! | session | `session:<user>` | 1h |
//! | statistics | `stats:<key>` | 5 min, overridable |
//!
//! ## Thread Safety
//!
//! Limiters and caches are `Send + Sync`; share them through an `Arc`.
//! The in-memory stores keep state in this process only, so limits are
//! per instance when the service is scaled horizontally. Implement
//! [`CounterStore`] or [`CacheStore`] over a shared backend to lift that.
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster hashing

pub mod core;

pub use crate::core::{
    CacheStore, CounterStore, Decision, DriverLocation, EphemeralCache, GateError,
    MemoryCacheStore, MemoryCounterStore, Policy, RateLimitResult, RateLimiter, RealtimeCache,
    Sweep, SweepOutcome, SweepReport, WindowCount, sweep_all,
};

pub use crate::core::cache;
pub use crate::core::store;
