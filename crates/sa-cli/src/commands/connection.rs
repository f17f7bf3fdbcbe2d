//! `test-connection`

use super::OutputFormat;
use crate::config::AppConfig;
use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use sa_connectors::{CiscoEsaConnector, Connector, ConnectorHealth, XMattersConnector};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Adapter {
    Xmatters,
    Cisco,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    adapter: String,
    connector_type: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl HealthReport {
    fn new(connector: &dyn Connector, health: Result<ConnectorHealth, String>) -> Self {
        let (status, detail) = match health {
            Ok(ConnectorHealth::Healthy) => ("healthy", None),
            Ok(ConnectorHealth::Degraded(reason)) => ("degraded", Some(reason)),
            Ok(ConnectorHealth::Unhealthy(reason)) => ("unhealthy", Some(reason)),
            Err(e) => ("unhealthy", Some(e)),
        };
        Self {
            adapter: connector.name().to_string(),
            connector_type: connector.connector_type().to_string(),
            status: status.to_string(),
            detail,
        }
    }

    fn print_text(&self) {
        let status = match self.status.as_str() {
            "healthy" => self.status.green(),
            "degraded" => self.status.yellow(),
            _ => self.status.red(),
        };
        match &self.detail {
            Some(detail) => println!(
                "  {} ({}): {} - {}",
                self.adapter.cyan(),
                self.connector_type,
                status,
                detail
            ),
            None => println!("  {} ({}): {}", self.adapter.cyan(), self.connector_type, status),
        }
    }
}

async fn check(connector: &dyn Connector) -> HealthReport {
    let health = connector.health_check().await.map_err(|e| e.to_string());
    HealthReport::new(connector, health)
}

/// Checks the selected adapter, or every configured one.
///
/// Fails when any checked adapter is not healthy.
pub async fn run(config: &AppConfig, adapter: Option<Adapter>, format: OutputFormat) -> Result<()> {
    let mut reports = Vec::new();

    let selected = |which: Adapter, configured: bool| match adapter {
        Some(chosen) => chosen == which,
        None => configured,
    };

    if selected(Adapter::Xmatters, config.xmatters.is_some()) {
        let connector = XMattersConnector::new(config.xmatters()?.clone())?;
        reports.push(check(&connector).await);
    }
    if selected(Adapter::Cisco, config.cisco.is_some()) {
        let connector = CiscoEsaConnector::new(config.cisco()?.clone())?;
        reports.push(check(&connector).await);
    }

    if reports.is_empty() {
        anyhow::bail!("No adapters configured");
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("{}", "Connection Test".bold());
        println!("───────────────");
        for report in &reports {
            report.print_text();
        }
    }

    let failed = reports.iter().filter(|r| r.status != "healthy").count();
    if failed > 0 {
        anyhow::bail!("{} adapter(s) failed the connection test", failed);
    }
    Ok(())
}
