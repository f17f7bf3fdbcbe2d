//! Watermark polling.
//!
//! A poll cycle takes the last-run state by value and returns the next one
//! together with the incidents it covers. The host persists `next_run`
//! before handing the incidents on; nothing here keeps state between cycles.
//!
//! Only records created strictly after the lower bound are emitted, and the
//! next watermark is the newest emitted creation time. A record that fails
//! to normalize is collected in `rejected` and never stops the cycle. A
//! failing fetch aborts the cycle and returns no watermark at all.

use crate::incident::{NormalizedIncident, RecordError};
use crate::time::FirstFetch;
use crate::watermark::{LastRun, Watermark};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

/// A vendor API that yields records for incident creation.
#[async_trait]
pub trait IncidentSource: Send + Sync {
    /// Transport error raised by the fetch.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name used in logs and metrics.
    fn source_name(&self) -> &str;

    /// Returns every record created at or after `lower_bound`, in server order.
    ///
    /// The bound is a hint for the server; records older than it may still
    /// be returned and are filtered by the poller.
    async fn fetch_since(
        &self,
        lower_bound: DateTime<Utc>,
    ) -> Result<Vec<serde_json::Value>, Self::Error>;

    /// Reads the creation time of a record.
    ///
    /// Called before [`normalize`](Self::normalize) so that records at or
    /// before the watermark are skipped without being mapped.
    fn created_at(&self, record: &serde_json::Value) -> Result<DateTime<Utc>, RecordError>;

    /// Turns one record into an incident.
    fn normalize(&self, record: &serde_json::Value) -> Result<NormalizedIncident, RecordError>;
}

/// A poll cycle that failed before any record was processed.
#[derive(Error, Debug)]
#[error("fetch from {source_name} failed: {source}")]
pub struct PollError<E: std::error::Error + 'static> {
    pub source_name: String,
    #[source]
    pub source: E,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchCycle {
    /// State to persist before the incidents are processed.
    pub next_run: LastRun,
    /// New incidents, in server order.
    pub incidents: Vec<NormalizedIncident>,
    /// Records that could not be normalized.
    pub rejected: Vec<RecordError>,
    /// Records at or before the lower bound.
    pub already_seen: usize,
}

impl FetchCycle {
    pub fn next_watermark(&self) -> Option<Watermark> {
        self.next_run.last_fetch
    }
}

/// Runs poll cycles against any [`IncidentSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Poller {
    first_fetch: FirstFetch,
}

impl Poller {
    pub fn new(first_fetch: FirstFetch) -> Self {
        Self { first_fetch }
    }

    /// Resolves the lower bound for a cycle starting at `now`.
    pub fn lower_bound(&self, last_run: &LastRun, now: DateTime<Utc>) -> Watermark {
        match last_run.last_fetch {
            Some(watermark) => watermark,
            None => Watermark::from_datetime(&self.first_fetch.lower_bound(now)),
        }
    }

    /// Runs one poll cycle.
    pub async fn poll<S>(
        &self,
        source: &S,
        last_run: LastRun,
        now: DateTime<Utc>,
    ) -> Result<FetchCycle, PollError<S::Error>>
    where
        S: IncidentSource + ?Sized,
    {
        let lower = self.lower_bound(&last_run, now);
        info!(
            source = source.source_name(),
            lower_bound = %lower,
            first_run = last_run.is_first_run(),
            "Starting fetch cycle"
        );

        let records = source
            .fetch_since(lower.to_datetime())
            .await
            .map_err(|e| PollError {
                source_name: source.source_name().to_string(),
                source: e,
            })?;

        let cycle = process_records(
            lower,
            &records,
            |record| source.created_at(record),
            |record| source.normalize(record),
        );

        info!(
            source = source.source_name(),
            fetched = records.len(),
            emitted = cycle.incidents.len(),
            rejected = cycle.rejected.len(),
            already_seen = cycle.already_seen,
            next_watermark = ?cycle.next_watermark(),
            "Fetch cycle complete"
        );

        Ok(cycle)
    }
}

/// Filters and normalizes fetched records against a lower bound.
///
/// The creation time is checked against `lower` first; only newer records
/// reach `normalize`.
pub fn process_records<C, F>(
    lower: Watermark,
    records: &[serde_json::Value],
    created_at: C,
    normalize: F,
) -> FetchCycle
where
    C: Fn(&serde_json::Value) -> Result<DateTime<Utc>, RecordError>,
    F: Fn(&serde_json::Value) -> Result<NormalizedIncident, RecordError>,
{
    let mut incidents = Vec::new();
    let mut rejected = Vec::new();
    let mut already_seen = 0;
    let mut next = lower;

    for record in records {
        let incident = match created_at(record) {
            Ok(at) if Watermark::from_datetime(&at) <= lower => {
                debug!(created = %at, lower_bound = %lower, "Skipping already ingested record");
                already_seen += 1;
                continue;
            }
            Ok(_) => normalize(record),
            Err(e) => Err(e),
        };
        let incident = match incident {
            Ok(incident) => incident,
            Err(e) => {
                warn!(record_id = e.record_id(), error = %e, "Skipping malformed record");
                rejected.push(e);
                continue;
            }
        };

        let created = Watermark::from_datetime(&incident.created_at);

        next = next.max(created);
        incidents.push(incident);
    }

    FetchCycle {
        next_run: LastRun::at(next),
        incidents,
        rejected,
        already_seen,
    }
}
