//! Service container
//!
//! Everything with shared mutable state lives in one [`GateService`],
//! built once at startup and handed to consumers by `Arc`. Tests build a
//! fresh instance each, so no state leaks between them.

use crate::config::{Config, Policies};
use crate::metrics::{Metrics, PolicyKind};
use crate::sweeper::{Sweeper, SweeperHandle};
use anyhow::Result;
use fleetgate::{MemoryCounterStore, RateLimiter, RealtimeCache, Sweep, SweepReport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// How callers are keyed when no address can be derived
#[derive(Debug, Clone)]
pub struct KeyPolicy {
    pub fallback_key: String,
    pub trust_forwarded_for: bool,
}

/// Rate limiters, cache, metrics and the sweeper that maintains them
pub struct GateService {
    strict: Arc<RateLimiter>,
    standard: Arc<RateLimiter>,
    lenient: Arc<RateLimiter>,
    cache: Arc<RealtimeCache>,
    metrics: Arc<Metrics>,
    keys: KeyPolicy,
    sweep_interval: Duration,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl GateService {
    /// Build the service from validated configuration
    ///
    /// The cache starts uninitialised and the sweeper stopped; call
    /// [`start`](GateService::start) to bring both up.
    pub fn from_config(config: &Config) -> Result<Self> {
        let policies = config.policies()?;
        Ok(Self::new(
            policies,
            KeyPolicy {
                fallback_key: config.keys.fallback_key.clone(),
                trust_forwarded_for: config.keys.trust_forwarded_for,
            },
            config.store.counter_capacity,
            config.store.cache_capacity,
            config.sweep_interval(),
        ))
    }

    pub fn new(
        policies: Policies,
        keys: KeyPolicy,
        counter_capacity: usize,
        cache_capacity: usize,
        sweep_interval: Duration,
    ) -> Self {
        let limiter = |policy| {
            Arc::new(RateLimiter::with_store(
                policy,
                MemoryCounterStore::with_capacity(counter_capacity),
            ))
        };

        GateService {
            strict: limiter(policies.strict),
            standard: limiter(policies.standard),
            lenient: limiter(policies.lenient),
            cache: Arc::new(RealtimeCache::with_capacity(cache_capacity)),
            metrics: Arc::new(Metrics::new()),
            keys,
            sweep_interval,
            sweeper: Mutex::new(None),
        }
    }

    /// Initialise the cache and start the sweeper; idempotent
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        self.cache.init();

        let mut sweeper = self.sweeper.lock();
        if sweeper.is_none() {
            *sweeper = Some(self.build_sweeper().spawn());
        }
    }

    /// Stop the sweeper and shut the cache down
    pub async fn shutdown(&self) {
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        self.cache.shutdown();
        tracing::info!("gate service stopped");
    }

    /// Run one sweep immediately, outside the schedule
    pub fn sweep_now(&self) -> SweepReport {
        self.build_sweeper().sweep_now()
    }

    pub fn limiter(&self, kind: PolicyKind) -> &Arc<RateLimiter> {
        match kind {
            PolicyKind::Strict => &self.strict,
            PolicyKind::Standard => &self.standard,
            PolicyKind::Lenient => &self.lenient,
        }
    }

    pub fn cache(&self) -> &Arc<RealtimeCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn keys(&self) -> &KeyPolicy {
        &self.keys
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(SweeperHandle::is_running)
    }

    fn build_sweeper(&self) -> Sweeper {
        let targets: Vec<Arc<dyn Sweep>> = vec![
            self.strict.clone() as Arc<dyn Sweep>,
            self.standard.clone() as Arc<dyn Sweep>,
            self.lenient.clone() as Arc<dyn Sweep>,
            self.cache.clone() as Arc<dyn Sweep>,
        ];
        Sweeper::new(targets, self.sweep_interval, self.metrics.clone())
    }
}
