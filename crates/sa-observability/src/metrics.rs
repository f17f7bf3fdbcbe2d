//! Fetch-cycle metrics.
//!
//! Counters go to whatever recorder the host installs through the `metrics`
//! facade. [`FetchMetrics`] also keeps its own totals so the CLI can report
//! them without a recorder.

use metrics::{counter, describe_counter};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

static REGISTER: Once = Once::new();

/// Totals since the collector was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStats {
    pub cycles: u64,
    pub incidents_emitted: u64,
    pub records_rejected: u64,
    pub failures: u64,
}

/// Records the outcome of fetch cycles.
#[derive(Debug, Default)]
pub struct FetchMetrics {
    cycles: AtomicU64,
    incidents_emitted: AtomicU64,
    records_rejected: AtomicU64,
    failures: AtomicU64,
}

impl FetchMetrics {
    pub fn new() -> Self {
        REGISTER.call_once(Self::register_metrics);
        Self::default()
    }

    fn register_metrics() {
        describe_counter!("sa_fetch_cycles_total", "Total number of completed fetch cycles");
        describe_counter!(
            "sa_incidents_emitted_total",
            "Total number of incidents emitted by fetch cycles"
        );
        describe_counter!(
            "sa_records_rejected_total",
            "Total number of vendor records that could not be normalized"
        );
        describe_counter!(
            "sa_fetch_failures_total",
            "Total number of fetch cycles aborted by a transport error"
        );
    }

    /// Records a completed cycle.
    pub fn record_cycle(&self, source: &str, emitted: usize, rejected: usize) {
        let emitted = emitted as u64;
        let rejected = rejected as u64;

        counter!("sa_fetch_cycles_total", "source" => source.to_string()).increment(1);
        counter!("sa_incidents_emitted_total", "source" => source.to_string()).increment(emitted);
        if rejected > 0 {
            counter!("sa_records_rejected_total", "source" => source.to_string())
                .increment(rejected);
        }

        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.incidents_emitted.fetch_add(emitted, Ordering::Relaxed);
        self.records_rejected.fetch_add(rejected, Ordering::Relaxed);
    }

    /// Records a cycle aborted before any record was processed.
    pub fn record_failure(&self, source: &str) {
        counter!("sa_fetch_failures_total", "source" => source.to_string()).increment(1);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FetchStats {
        FetchStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            incidents_emitted: self.incidents_emitted.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
