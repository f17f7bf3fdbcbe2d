//! Last-run state carried between poll cycles.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Creation time of the newest ingested event, in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(i64);

impl Watermark {
    pub fn from_epoch_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Truncates to whole seconds.
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn epoch_secs(&self) -> i64 {
        self.0
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State persisted by the host between cycles.
///
/// An empty `last_fetch` means no cycle has completed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRun {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetch: Option<Watermark>,
}

impl LastRun {
    /// State before the first cycle.
    pub fn first_run() -> Self {
        Self { last_fetch: None }
    }

    pub fn at(watermark: Watermark) -> Self {
        Self {
            last_fetch: Some(watermark),
        }
    }

    pub fn is_first_run(&self) -> bool {
        self.last_fetch.is_none()
    }
}
