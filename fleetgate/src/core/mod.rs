//! Core components of the fleetgate library
//!
//! This module contains the fundamental building blocks:
//! - [`policy`]: Window length, request budget and rejection message
//! - [`rate_limiter`]: The fixed-window rate limiter
//! - [`cache`]: Lifecycle-guarded TTL cache and its semantic wrappers
//! - [`store`]: Storage backends for counters and cached values
//! - [`sweep`]: One-shot eviction pass over every registered store

pub mod cache;
pub mod policy;
pub mod rate_limiter;
pub mod store;
pub mod sweep;

pub use cache::{DriverLocation, EphemeralCache, RealtimeCache};
pub use policy::Policy;
pub use rate_limiter::{Decision, RateLimitResult, RateLimiter};
pub use store::{CacheStore, CounterStore, MemoryCacheStore, MemoryCounterStore, WindowCount};
pub use sweep::{Sweep, SweepOutcome, SweepReport, sweep_all};

use std::error::Error;
use std::fmt;

/// Errors raised while configuring the rate limiting and caching layer
///
/// None of these are produced on the request path. Limiter and cache
/// operations absorb backend failures and return a safe default instead.
///
/// # Example
///
/// ```
/// use fleetgate::{GateError, Policy};
/// use std::time::Duration;
///
/// match Policy::new("broken", 10, Duration::ZERO) {
///     Err(GateError::InvalidWindow) => {}
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The window length was zero
    InvalidWindow,
    /// Policy parameters are invalid for another reason
    InvalidPolicy(String),
    /// An internal error occurred
    Internal(String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::InvalidWindow => write!(f, "rate limit window must be greater than zero"),
            GateError::InvalidPolicy(msg) => write!(f, "invalid rate limit policy: {msg}"),
            GateError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl Error for GateError {}
