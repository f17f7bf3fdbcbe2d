//! # sa-core
//!
//! Shared domain for the SOAR adapters: last-run watermarks, the poll cycle
//! that turns vendor records into normalized incidents, severity mapping,
//! date argument handling, and command results.

pub mod args;
pub mod command;
pub mod incident;
pub mod poller;
pub mod severity;
pub mod time;
pub mod watermark;

pub use args::ArgError;
pub use command::{CommandResult, MarkdownTable};
pub use incident::{NormalizedIncident, RecordError};
pub use poller::{FetchCycle, IncidentSource, PollError, Poller};
pub use severity::{FallbackSeverity, Severity, SeverityPolicy, UnknownSeverity};
pub use time::{parse_date, parse_timestamp, to_wire_format, FirstFetch, WIRE_DATE_FORMAT};
pub use watermark::{LastRun, Watermark};
