//! Prometheus metrics
//!
//! Lock-free counters, gauges and histograms rendered in the Prometheus
//! text exposition format.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

/// Monotonically increasing counter
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        header(&mut out, self.name, self.help, "counter");
        let _ = writeln!(out, "{} {}", self.name, self.get());
        out
    }
}

/// Value that can go up and down
pub struct Gauge {
    name: &'static str,
    help: &'static str,
    value: AtomicI64,
}

impl Gauge {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicI64::new(0),
        }
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        header(&mut out, self.name, self.help, "gauge");
        let _ = writeln!(out, "{} {}", self.name, self.get());
        out
    }
}

/// Latency histogram with cumulative buckets, in seconds
pub struct Histogram {
    name: &'static str,
    help: &'static str,
    bounds: &'static [f64],
    buckets: Vec<AtomicU64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

const DEFAULT_BOUNDS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0];

impl Histogram {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self::with_bounds(name, help, DEFAULT_BOUNDS)
    }

    pub fn with_bounds(name: &'static str, help: &'static str, bounds: &'static [f64]) -> Self {
        Self {
            name,
            help,
            bounds,
            buckets: bounds.iter().map(|_| AtomicU64::new(0)).collect(),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, seconds: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add((seconds * 1_000_000.0) as u64, Ordering::Relaxed);
        for (bound, bucket) in self.bounds.iter().zip(&self.buckets) {
            if seconds <= *bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(elapsed.as_secs_f64());
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        header(&mut out, self.name, self.help, "histogram");
        for (bound, bucket) in self.bounds.iter().zip(&self.buckets) {
            let _ = writeln!(
                out,
                "{}_bucket{{le=\"{}\"}} {}",
                self.name,
                bound,
                bucket.load(Ordering::Relaxed)
            );
        }
        let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", self.name, self.count());
        let sum = self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(out, "{}_sum {}", self.name, sum);
        let _ = writeln!(out, "{}_count {}", self.name, self.count());
        out
    }
}

/// Standard lease metrics
pub mod standard {
    use super::*;
    use std::sync::LazyLock;

    pub static BATCHES_ISSUED: Counter =
        Counter::new("lease_batches_issued_total", "Total batches issued, including empty ones");

    pub static TOKENS_ISSUED: Counter =
        Counter::new("lease_tokens_issued_total", "Total tokens handed out");

    pub static BATCHES_CONFIRMED: Counter =
        Counter::new("lease_batches_confirmed_total", "Total batches confirmed done");

    pub static UNKNOWN_KEYS: Counter =
        Counter::new("lease_unknown_key_total", "Done calls rejected for an unknown key");

    pub static ACTIVE_JOBS: Gauge = Gauge::new("lease_active_jobs", "Jobs with a live ledger");

    pub static OUTSTANDING_BATCHES: Gauge =
        Gauge::new("lease_outstanding_batches", "Batches issued but not yet confirmed");

    pub static POOL_SIZE: Gauge = Gauge::new("lease_pool_size", "Tokens in the coordinator pool");

    pub static BATCH_PROCESS_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
        Histogram::new(
            "lease_batch_process_duration_seconds",
            "Worker time spent processing one batch",
        )
    });
}

/// Render all standard metrics
pub fn gather_system_metrics() -> String {
    let mut output = String::new();

    output.push_str(&standard::BATCHES_ISSUED.to_prometheus());
    output.push_str(&standard::TOKENS_ISSUED.to_prometheus());
    output.push_str(&standard::BATCHES_CONFIRMED.to_prometheus());
    output.push_str(&standard::UNKNOWN_KEYS.to_prometheus());

    output.push_str(&standard::ACTIVE_JOBS.to_prometheus());
    output.push_str(&standard::OUTSTANDING_BATCHES.to_prometheus());
    output.push_str(&standard::POOL_SIZE.to_prometheus());

    output.push_str(&standard::BATCH_PROCESS_DURATION.to_prometheus());

    output
}
