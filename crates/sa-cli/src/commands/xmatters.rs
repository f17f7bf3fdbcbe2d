//! `xmatters` subcommands.

use super::fetch::{self, FetchArgs};
use super::{print_result, OutputFormat};
use crate::config::AppConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use sa_connectors::xmatters::commands::{
    get_event_command, get_events_command, trigger_workflow_command,
};
use sa_connectors::xmatters::{EventQuery, WorkflowTrigger};
use sa_connectors::XMattersConnector;
use sa_core::Poller;
use sa_observability::command_span;
use tracing::Instrument;

#[derive(Subcommand, Debug)]
pub enum XMattersCommands {
    /// Send a message through the configured workflow trigger
    TriggerWorkflow(TriggerArgs),

    /// Search events on the instance
    GetEvents(GetEventsArgs),

    /// Show a single event
    GetEvent {
        /// Event ID
        event_id: String,
    },

    /// Fetch new events as incidents
    Fetch(FetchArgs),
}

#[derive(Args, Debug, Default)]
pub struct TriggerArgs {
    /// Recipients of the message (users or groups)
    #[arg(long)]
    pub recipients: Option<String>,

    #[arg(long)]
    pub subject: Option<String>,

    #[arg(long)]
    pub body: Option<String>,

    /// Incident the message is about
    #[arg(long)]
    pub incident_id: Option<String>,

    /// Task to close when the message is answered
    #[arg(long)]
    pub close_task_id: Option<String>,
}

impl From<TriggerArgs> for WorkflowTrigger {
    fn from(args: TriggerArgs) -> Self {
        WorkflowTrigger {
            recipients: args.recipients,
            subject: args.subject,
            body: args.body,
            incident_id: args.incident_id,
            close_task_id: args.close_task_id,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct GetEventsArgs {
    #[arg(long)]
    pub request_id: Option<String>,

    /// ACTIVE, SUSPENDED or TERMINATED
    #[arg(long)]
    pub status: Option<String>,

    /// LOW, MEDIUM or HIGH
    #[arg(long)]
    pub priority: Option<String>,

    /// Start of the creation window (timestamp or "3 days")
    #[arg(long)]
    pub from: Option<String>,

    /// End of the creation window
    #[arg(long)]
    pub to: Option<String>,

    /// Workflow (plan) name
    #[arg(long)]
    pub workflow: Option<String>,

    #[arg(long)]
    pub form: Option<String>,

    #[arg(long)]
    pub property_name: Option<String>,

    #[arg(long)]
    pub property_value: Option<String>,
}

impl From<GetEventsArgs> for EventQuery {
    fn from(args: GetEventsArgs) -> Self {
        EventQuery {
            request_id: args.request_id,
            status: args.status,
            priority: args.priority,
            from: args.from,
            to: args.to,
            workflow: args.workflow,
            form: args.form,
            property_name: args.property_name,
            property_value: args.property_value,
        }
    }
}

pub async fn run(action: XMattersCommands, config: &AppConfig, format: OutputFormat) -> Result<()> {
    let xmatters = config.xmatters()?;
    let connector =
        XMattersConnector::new(xmatters.clone()).context("Failed to create xMatters connector")?;

    let result = match action {
        XMattersCommands::TriggerWorkflow(args) => {
            trigger_workflow_command(&connector, &args.into())
                .instrument(command_span!("xmatters", "trigger-workflow"))
                .await?
        }
        XMattersCommands::GetEvents(args) => {
            get_events_command(&connector, args.into(), Utc::now())
                .instrument(command_span!("xmatters", "get-events"))
                .await?
        }
        XMattersCommands::GetEvent { event_id } => {
            get_event_command(&connector, Some(&event_id))
                .instrument(command_span!("xmatters", "get-event"))
                .await?
        }
        XMattersCommands::Fetch(args) => {
            let store = args.store(config.state_dir.as_deref(), "xmatters");
            let poller = Poller::new(xmatters.first_fetch);
            return fetch::run(&connector, poller, store, &args, format).await;
        }
    };

    print_result(&result, format)
}
