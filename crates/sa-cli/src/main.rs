//! SOAR adapters CLI
//!
//! Runs xMatters and Cisco Email Security commands and fetch cycles.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod config;
mod state;

use commands::cisco::CiscoCommands;
use commands::connection::Adapter;
use commands::xmatters::XMattersCommands;
use commands::OutputFormat;
use config::AppConfig;
use sa_observability::LoggingConfig;

#[derive(Parser)]
#[command(name = "soar-adapters")]
#[command(version)]
#[command(about = "xMatters and Cisco Email Security adapters", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// xMatters commands
    Xmatters {
        #[command(subcommand)]
        action: XMattersCommands,
    },

    /// Cisco Email Security commands
    Cisco {
        #[command(subcommand)]
        action: CiscoCommands,
    },

    /// Check connectivity and credentials
    TestConnection {
        /// Adapter to check; all configured adapters when omitted
        #[arg(value_enum)]
        adapter: Option<Adapter>,
    },

    /// Show current configuration
    Config {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = if cli.config.is_some() || config_path.exists() {
        AppConfig::load(&config_path)?
    } else {
        if cli.verbose {
            eprintln!("Using default configuration (no config file found)");
        }
        AppConfig::default()
    };

    sa_observability::init_logging_with_config(logging_config(&config, cli.verbose));

    match cli.command {
        Commands::Xmatters { action } => {
            commands::xmatters::run(action, &config, cli.format).await
        }
        Commands::Cisco { action } => commands::cisco::run(action, &config, cli.format).await,
        Commands::TestConnection { adapter } => {
            commands::connection::run(&config, adapter, cli.format).await
        }
        Commands::Config { show_secrets } => cmd_config(config, show_secrets, cli.format),
    }
}

fn logging_config(config: &AppConfig, verbose: bool) -> LoggingConfig {
    if verbose {
        return LoggingConfig::development();
    }
    let base = if config.logging.json_format {
        LoggingConfig::production()
    } else {
        LoggingConfig::default()
    };
    LoggingConfig {
        level: config.logging.level.parse().unwrap_or(base.level),
        ..base
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "soar-adapters", "soar-adapters") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/default.yaml")
    }
}

fn cmd_config(config: AppConfig, show_secrets: bool, format: OutputFormat) -> Result<()> {
    let display_config = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display_config)?);
        return Ok(());
    }

    println!("{}", "Current Configuration".bold());
    println!("─────────────────────────");
    match &display_config.xmatters {
        Some(xmatters) => {
            println!("{}", "xMatters".cyan());
            println!("  Instance: {}", xmatters.instance_url());
            println!("  Workflow trigger: {}", xmatters.connector.base_url);
            println!("  First fetch: {}", xmatters.first_fetch);
        }
        None => println!("{}", "xMatters: not configured".yellow()),
    }
    match &display_config.cisco {
        Some(cisco) => {
            println!("{}", "Cisco Email Security".cyan());
            println!("  Appliance: {}", cisco.connector.base_url);
            println!("  Max fetch: {}", cisco.max_fetch);
            println!("  First fetch: {}", cisco.first_fetch);
        }
        None => println!("{}", "Cisco Email Security: not configured".yellow()),
    }
    println!();
    print!("{}", serde_yaml::to_string(&display_config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_subcommand() {
        let cli = Cli::try_parse_from([
            "soar-adapters",
            "--format",
            "json",
            "cisco",
            "fetch",
            "--state",
            "/tmp/cisco.json",
            "--interval",
            "60",
        ])
        .unwrap();
        assert!(cli.format == OutputFormat::Json);
        match cli.command {
            Commands::Cisco {
                action: CiscoCommands::Fetch(args),
            } => {
                assert_eq!(args.interval, Some(60));
                assert_eq!(args.state, Some(PathBuf::from("/tmp/cisco.json")));
            }
            _ => panic!("expected cisco fetch"),
        }
    }

    #[test]
    fn test_parse_get_events() {
        let cli = Cli::try_parse_from([
            "soar-adapters",
            "xmatters",
            "get-events",
            "--status",
            "ACTIVE",
            "--from",
            "3 days",
        ])
        .unwrap();
        match cli.command {
            Commands::Xmatters {
                action: XMattersCommands::GetEvents(args),
            } => {
                assert_eq!(args.status.as_deref(), Some("ACTIVE"));
                assert_eq!(args.from.as_deref(), Some("3 days"));
            }
            _ => panic!("expected xmatters get-events"),
        }
    }

    #[test]
    fn test_logging_config_from_file() {
        let mut config = AppConfig::default();
        config.logging.level = "warn".into();
        assert_eq!(logging_config(&config, false).level, tracing::Level::WARN);
        assert_eq!(logging_config(&config, true).level, tracing::Level::DEBUG);

        config.logging.json_format = true;
        assert!(logging_config(&config, false).json_format);
    }
}
