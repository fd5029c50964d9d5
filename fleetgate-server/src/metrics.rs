//! Simple metrics collection for observability
//!
//! Lock-free atomic counters, exported in Prometheus text format at
//! `GET /metrics`.

use fleetgate::{SweepOutcome, SweepReport};
use parking_lot::Mutex;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Rate limit policy a request was checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Strict,
    Standard,
    Lenient,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [
        PolicyKind::Strict,
        PolicyKind::Standard,
        PolicyKind::Lenient,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Strict => "strict",
            PolicyKind::Standard => "standard",
            PolicyKind::Lenient => "lenient",
        }
    }

    fn index(&self) -> usize {
        match self {
            PolicyKind::Strict => 0,
            PolicyKind::Standard => 1,
            PolicyKind::Lenient => 2,
        }
    }
}

/// Core metrics collected by the server
pub struct Metrics {
    /// Server start time
    start_time: Instant,

    /// Rate limiting decisions, indexed by policy
    allowed: [AtomicU64; 3],
    denied: [AtomicU64; 3],
    /// Requests bucketed under the fallback key
    pub fallback_keys: AtomicU64,

    /// Cache reads
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,

    /// Sweeper activity
    pub sweep_runs: AtomicU64,
    pub sweep_evictions: AtomicU64,
    pub last_sweep_evictions: AtomicUsize,
    /// Entries held across all stores after the last sweep
    pub tracked_entries: AtomicUsize,
    /// Per-store breakdown of the last sweep
    last_sweep: Mutex<Vec<SweepOutcome>>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            allowed: Default::default(),
            denied: Default::default(),
            fallback_keys: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            sweep_runs: AtomicU64::new(0),
            sweep_evictions: AtomicU64::new(0),
            last_sweep_evictions: AtomicUsize::new(0),
            tracked_entries: AtomicUsize::new(0),
            last_sweep: Mutex::new(Vec::new()),
        }
    }

    /// Record one rate limit decision
    pub fn record_decision(&self, policy: PolicyKind, allowed: bool) {
        let counters = if allowed { &self.allowed } else { &self.denied };
        counters[policy.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_key(&self) {
        self.fallback_keys.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache read
    pub fn record_cache_read(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record the outcome of one sweep
    pub fn record_sweep(&self, report: &SweepReport) {
        let removed = report.total_removed();
        self.sweep_runs.fetch_add(1, Ordering::Relaxed);
        self.sweep_evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        self.last_sweep_evictions.store(removed, Ordering::Relaxed);
        self.tracked_entries
            .store(report.total_remaining(), Ordering::Relaxed);
        *self.last_sweep.lock() = report.outcomes.clone();
    }

    pub fn allowed(&self, policy: PolicyKind) -> u64 {
        self.allowed[policy.index()].load(Ordering::Relaxed)
    }

    pub fn denied(&self, policy: PolicyKind) -> u64 {
        self.denied[policy.index()].load(Ordering::Relaxed)
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(1500);

        // Writing to a String cannot fail
        let _ = self.write_prometheus(&mut output);
        output
    }

    fn write_prometheus(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "# HELP fleetgate_uptime_seconds Time since server start in seconds")?;
        writeln!(out, "# TYPE fleetgate_uptime_seconds gauge")?;
        writeln!(out, "fleetgate_uptime_seconds {}\n", self.uptime_seconds())?;

        writeln!(out, "# HELP fleetgate_requests_allowed Requests allowed by policy")?;
        writeln!(out, "# TYPE fleetgate_requests_allowed counter")?;
        for policy in PolicyKind::ALL {
            writeln!(
                out,
                "fleetgate_requests_allowed{{policy=\"{}\"}} {}",
                policy.as_str(),
                self.allowed(policy)
            )?;
        }
        writeln!(out)?;

        writeln!(out, "# HELP fleetgate_requests_denied Requests rejected with 429 by policy")?;
        writeln!(out, "# TYPE fleetgate_requests_denied counter")?;
        for policy in PolicyKind::ALL {
            writeln!(
                out,
                "fleetgate_requests_denied{{policy=\"{}\"}} {}",
                policy.as_str(),
                self.denied(policy)
            )?;
        }
        writeln!(out)?;

        writeln!(out, "# HELP fleetgate_fallback_keys Requests counted under the fallback key")?;
        writeln!(out, "# TYPE fleetgate_fallback_keys counter")?;
        writeln!(
            out,
            "fleetgate_fallback_keys {}\n",
            self.fallback_keys.load(Ordering::Relaxed)
        )?;

        writeln!(out, "# HELP fleetgate_cache_reads Cache reads by outcome")?;
        writeln!(out, "# TYPE fleetgate_cache_reads counter")?;
        writeln!(
            out,
            "fleetgate_cache_reads{{outcome=\"hit\"}} {}",
            self.cache_hits.load(Ordering::Relaxed)
        )?;
        writeln!(
            out,
            "fleetgate_cache_reads{{outcome=\"miss\"}} {}\n",
            self.cache_misses.load(Ordering::Relaxed)
        )?;

        writeln!(out, "# HELP fleetgate_sweep_runs Completed sweeps")?;
        writeln!(out, "# TYPE fleetgate_sweep_runs counter")?;
        writeln!(out, "fleetgate_sweep_runs {}\n", self.sweep_runs.load(Ordering::Relaxed))?;

        writeln!(out, "# HELP fleetgate_sweep_evictions Expired entries removed by sweeps")?;
        writeln!(out, "# TYPE fleetgate_sweep_evictions counter")?;
        writeln!(
            out,
            "fleetgate_sweep_evictions {}\n",
            self.sweep_evictions.load(Ordering::Relaxed)
        )?;

        writeln!(out, "# HELP fleetgate_last_sweep_evictions Entries removed by the last sweep")?;
        writeln!(out, "# TYPE fleetgate_last_sweep_evictions gauge")?;
        writeln!(
            out,
            "fleetgate_last_sweep_evictions {}\n",
            self.last_sweep_evictions.load(Ordering::Relaxed)
        )?;

        writeln!(out, "# HELP fleetgate_tracked_entries Entries held across all stores")?;
        writeln!(out, "# TYPE fleetgate_tracked_entries gauge")?;
        writeln!(
            out,
            "fleetgate_tracked_entries {}\n",
            self.tracked_entries.load(Ordering::Relaxed)
        )?;

        writeln!(
            out,
            "# HELP fleetgate_store_entries Entries held per store after the last sweep"
        )?;
        writeln!(out, "# TYPE fleetgate_store_entries gauge")?;
        for outcome in self.last_sweep.lock().iter() {
            writeln!(
                out,
                "fleetgate_store_entries{{store=\"{}\"}} {}",
                outcome.name, outcome.remaining
            )?;
        }

        Ok(())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
