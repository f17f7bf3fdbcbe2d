//! Structured logging for the adapters, built on `tracing-subscriber`.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crates whose events pass the default filter.
const CRATES: &[&str] = &["sa_core", "sa_connectors", "sa_observability", "sa_cli"];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// Emit one JSON object per event instead of text.
    pub json_format: bool,
    /// Log span open/close, which shows the duration of connector calls.
    pub include_spans: bool,
    pub include_location: bool,
    pub include_thread_ids: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: false,
            include_location: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose text output, selected by `--verbose`.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json_format: false,
            include_spans: true,
            include_location: true,
            include_thread_ids: true,
            include_target: true,
        }
    }

    /// JSON output for log shippers.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            include_spans: false,
            include_location: false,
            include_thread_ids: false,
            include_target: true,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset.
    pub fn default_directives(&self) -> String {
        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initializes logging with the default configuration.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::default());
}

/// Initializes logging with the given configuration.
///
/// Events are written to stderr so that command output on stdout stays
/// machine-readable.
pub fn init_logging_with_config(config: LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }
}

/// Creates a span covering one fetch cycle of an adapter.
#[macro_export]
macro_rules! fetch_span {
    ($source:expr) => {
        tracing::info_span!("fetch", source = %$source)
    };
    ($source:expr, $($field:tt)*) => {
        tracing::info_span!("fetch", source = %$source, $($field)*)
    };
}

/// Creates a span for one adapter command.
#[macro_export]
macro_rules! command_span {
    ($adapter:expr, $command:expr) => {
        tracing::info_span!("command", adapter = %$adapter, command = %$command)
    };
}
