//! Fetch cycles against a configured adapter.

use super::OutputFormat;
use crate::state::StateStore;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use sa_connectors::ConnectorError;
use sa_core::{FetchCycle, IncidentSource, Poller, Severity};
use sa_observability::{fetch_span, FetchMetrics};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Instrument};

/// Arguments shared by the `fetch` subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// State file holding the last-run watermark
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Keep fetching every N seconds until interrupted
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<u64>,
}

impl FetchArgs {
    pub fn store(&self, state_dir: Option<&std::path::Path>, adapter: &str) -> StateStore {
        match &self.state {
            Some(path) => StateStore::new(path.clone()),
            None => StateStore::for_adapter(state_dir, adapter),
        }
    }
}

/// Runs one cycle: load state, poll, persist the next state, then print the
/// incidents.
pub async fn run_cycle<S>(
    source: &S,
    poller: &Poller,
    store: &StateStore,
    metrics: &FetchMetrics,
) -> Result<FetchCycle>
where
    S: IncidentSource<Error = ConnectorError>,
{
    let last_run = store.load()?;
    let cycle = match poller.poll(source, last_run, Utc::now()).await {
        Ok(cycle) => cycle,
        Err(e) => {
            metrics.record_failure(source.source_name());
            return Err(e).context("Fetch cycle failed");
        }
    };

    metrics.record_cycle(
        source.source_name(),
        cycle.incidents.len(),
        cycle.rejected.len(),
    );
    store.save(&cycle.next_run)?;
    Ok(cycle)
}

/// Runs `fetch`, once or every `--interval` seconds.
///
/// Ticks are serial. In interval mode a failed cycle is logged and the next
/// tick retries from the same watermark.
pub async fn run<S>(
    source: &S,
    poller: Poller,
    store: StateStore,
    args: &FetchArgs,
    format: OutputFormat,
) -> Result<()>
where
    S: IncidentSource<Error = ConnectorError>,
{
    let metrics = FetchMetrics::new();
    let span = fetch_span!(source.source_name(), state = %store.path().display());

    let Some(secs) = args.interval else {
        let cycle = run_cycle(source, &poller, &store, &metrics)
            .instrument(span)
            .await?;
        return print_cycle(&cycle, format);
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_secs = secs, "Fetching until interrupted");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_cycle(source, &poller, &store, &metrics).instrument(span.clone()).await {
                    Ok(cycle) => print_cycle(&cycle, format)?,
                    Err(e) => warn!(error = %format!("{:#}", e), "Fetch cycle failed, retrying on next tick"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    let stats = metrics.snapshot();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&stats)?),
        OutputFormat::Text => println!(
            "\n{} {} cycles, {} incidents, {} rejected, {} failed",
            "Stopped:".yellow(),
            stats.cycles,
            stats.incidents_emitted,
            stats.records_rejected,
            stats.failures
        ),
    }
    Ok(())
}

/// Renders a cycle for the terminal or as one JSON document.
pub fn render_cycle(cycle: &FetchCycle, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        let rejected: Vec<String> = cycle.rejected.iter().map(|e| e.to_string()).collect();
        return Ok(serde_json::to_string_pretty(&serde_json::json!({
            "incidents": cycle.incidents,
            "rejected": rejected,
            "already_seen": cycle.already_seen,
            "last_run": cycle.next_run,
        }))?);
    }

    let mut out = String::new();
    for incident in &cycle.incidents {
        let severity = match incident.severity {
            Severity::Critical => incident.severity.as_str().red(),
            Severity::High => incident.severity.as_str().yellow(),
            Severity::Medium => incident.severity.as_str().cyan(),
            _ => incident.severity.as_str().white(),
        };
        out.push_str(&format!(
            "  {} [{}] {}\n",
            incident.occurred.cyan(),
            severity,
            incident.name
        ));
    }
    for rejected in &cycle.rejected {
        out.push_str(&format!("  {} {}\n", "rejected".red(), rejected));
    }
    let watermark = cycle
        .next_watermark()
        .map(|w| w.to_string())
        .unwrap_or_else(|| "-".to_string());
    out.push_str(&format!(
        "{} new, {} rejected, {} already seen; watermark {}",
        cycle.incidents.len(),
        cycle.rejected.len(),
        cycle.already_seen,
        watermark
    ));
    Ok(out)
}

fn print_cycle(cycle: &FetchCycle, format: OutputFormat) -> Result<()> {
    println!("{}", render_cycle(cycle, format)?);
    Ok(())
}
