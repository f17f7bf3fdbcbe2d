//! # sa-observability
//!
//! Logging setup and fetch-cycle metrics for the SOAR adapters.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::{FetchMetrics, FetchStats};
