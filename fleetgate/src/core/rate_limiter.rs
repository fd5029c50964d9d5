//! Fixed-window rate limiter implementation
//!
//! This module provides the main [`RateLimiter`] struct. Each caller key gets
//! a counter that starts at 1 when a window opens and is reset entirely at
//! the window boundary, rather than aging out events continuously.

use super::Policy;
use super::store::{CounterStore, MemoryCounterStore, WindowCount};
use std::time::{Duration, SystemTime};

/// Rate limit metadata attached to every decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Maximum number of requests allowed per window
    pub limit: u64,
    /// Requests left in the current window after this one
    pub remaining: u64,
    /// Requests counted in the current window, including this one
    pub count: u64,
    /// Wall-clock end of the current window
    pub reset_at: SystemTime,
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed
    Allowed(RateLimitResult),
    /// The request exceeded the policy and should be rejected
    Denied {
        /// Whole seconds until the window resets, rounded up
        retry_after_secs: u64,
        result: RateLimitResult,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }

    pub fn result(&self) -> &RateLimitResult {
        match self {
            Decision::Allowed(result) => result,
            Decision::Denied { result, .. } => result,
        }
    }

    /// Seconds to wait before retrying, `None` when allowed
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Decision::Allowed(_) => None,
            Decision::Denied {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
        }
    }
}

/// Fixed-window rate limiter
///
/// The limiter is `Sync` when its store is; share it behind an `Arc` and
/// call [`check`](RateLimiter::check) from any number of request handlers.
/// Atomicity of the per-key read-compare-increment step is delegated to
/// [`CounterStore::hit`].
///
/// # Example
///
/// ```
/// use fleetgate::{Policy, RateLimiter};
/// use std::time::{Duration, SystemTime};
///
/// let policy = Policy::from_millis("login", 2, 1000).unwrap();
/// let limiter = RateLimiter::new(policy);
/// let now = SystemTime::now();
///
/// assert!(limiter.check("10.0.0.7", now).is_allowed());
/// assert!(limiter.check("10.0.0.7", now + Duration::from_millis(100)).is_allowed());
/// assert!(!limiter.check("10.0.0.7", now + Duration::from_millis(200)).is_allowed());
/// ```
pub struct RateLimiter<S: CounterStore = MemoryCounterStore> {
    store: S,
    policy: Policy,
}

impl RateLimiter<MemoryCounterStore> {
    /// Create a limiter backed by a fresh in-memory store
    pub fn new(policy: Policy) -> Self {
        Self::with_store(policy, MemoryCounterStore::new())
    }
}

impl<S: CounterStore> RateLimiter<S> {
    /// Create a limiter over an existing store
    pub fn with_store(policy: Policy, store: S) -> Self {
        RateLimiter { store, policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Count one request for `key` and decide whether it may proceed
    ///
    /// Never fails: if the store reports an error the request is allowed
    /// with a full budget and the error is logged.
    pub fn check(&self, key: &str, now: SystemTime) -> Decision {
        let window = match self.store.hit(key, self.policy.window(), now) {
            Ok(window) => window,
            Err(e) => {
                tracing::error!(
                    policy = self.policy.name(),
                    key,
                    "rate limit store failed, allowing request: {}",
                    e
                );
                return Decision::Allowed(RateLimitResult {
                    limit: self.policy.max(),
                    remaining: self.policy.max(),
                    count: 0,
                    reset_at: now.checked_add(self.policy.window()).unwrap_or(now),
                });
            }
        };

        let result = self.result_for(window);
        if window.count <= self.policy.max() {
            return Decision::Allowed(result);
        }

        let retry_after_secs = retry_after_secs(window.reset_at, now);
        tracing::warn!(
            policy = self.policy.name(),
            key,
            count = window.count,
            retry_after_secs,
            "rate limit exceeded"
        );

        Decision::Denied {
            retry_after_secs,
            result,
        }
    }

    /// Current window for `key` without counting a request
    pub fn peek(&self, key: &str, now: SystemTime) -> Option<RateLimitResult> {
        match self.store.peek(key, now) {
            Ok(window) => window.map(|w| self.result_for(w)),
            Err(e) => {
                tracing::error!(
                    policy = self.policy.name(),
                    key,
                    "rate limit peek failed: {}",
                    e
                );
                None
            }
        }
    }

    /// Forget `key` so its next request opens a fresh window
    pub fn reset(&self, key: &str) -> bool {
        match self.store.remove(key) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(
                    policy = self.policy.name(),
                    key,
                    "rate limit reset failed: {}",
                    e
                );
                false
            }
        }
    }

    fn result_for(&self, window: WindowCount) -> RateLimitResult {
        RateLimitResult {
            limit: self.policy.max(),
            remaining: self.policy.max().saturating_sub(window.count),
            count: window.count,
            reset_at: window.reset_at,
        }
    }
}

/// `ceil((reset_at - now) / 1s)`, clamped at zero
fn retry_after_secs(reset_at: SystemTime, now: SystemTime) -> u64 {
    let remaining = reset_at.duration_since(now).unwrap_or(Duration::ZERO);
    (remaining.as_millis().div_ceil(1000)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(retry_after_secs(now + Duration::from_millis(800), now), 1);
        assert_eq!(retry_after_secs(now + Duration::from_millis(1000), now), 1);
        assert_eq!(retry_after_secs(now + Duration::from_millis(1001), now), 2);
        assert_eq!(retry_after_secs(now, now), 0);
    }

    #[test]
    fn test_retry_after_never_negative() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(retry_after_secs(now - Duration::from_secs(5), now), 0);
    }
}
