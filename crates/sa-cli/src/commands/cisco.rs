//! `cisco` subcommands.

use super::fetch::{self, FetchArgs};
use super::{print_result, OutputFormat};
use crate::config::AppConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use sa_connectors::cisco::commands::{
    list_entries_add_command, list_entries_delete_command, list_entries_get_command,
    message_details_command, messages_search_command, quarantine_action_command,
    quarantine_message_details_command, report_get_command, spam_quarantine_search_command,
};
use sa_connectors::cisco::params::{
    ListEntriesGetArgs, ListEntriesWriteArgs, MessageDetailsArgs, MessagesSearchArgs, ReportArgs,
    SpamQuarantineArgs,
};
use sa_connectors::cisco::QuarantineAction;
use sa_connectors::CiscoEsaConnector;
use sa_core::Poller;
use sa_observability::command_span;
use tracing::Instrument;

#[derive(Subcommand, Debug)]
pub enum CiscoCommands {
    /// Get a statistics report
    ReportGet(ReportGetArgs),

    /// Search tracked messages
    MessagesSearch(MessagesSearchCliArgs),

    /// Show the tracking details of a message
    MessageDetails(MessageDetailsCliArgs),

    /// Search the spam quarantine
    SpamQuarantineSearch(SpamQuarantineCliArgs),

    /// Show a quarantined message
    QuarantineMessageDetails {
        /// Message ID
        message_id: String,
    },

    /// Delete quarantined messages
    QuarantineDelete {
        /// Comma separated message IDs
        messages_ids: String,
    },

    /// Release quarantined messages
    QuarantineRelease {
        /// Comma separated message IDs
        messages_ids: String,
    },

    /// List safelist or blocklist entries
    ListEntriesGet(ListEntriesGetCliArgs),

    /// Add or edit safelist or blocklist entries
    ListEntriesAdd(ListEntriesAddCliArgs),

    /// Delete safelist or blocklist entries
    ListEntriesDelete(ListEntriesDeleteCliArgs),

    /// Fetch new quarantined messages as incidents
    Fetch(FetchArgs),
}

/// Date window shared by the search commands.
#[derive(Args, Debug, Default)]
pub struct DateWindow {
    /// Start date (timestamp or "3 days")
    #[arg(long)]
    pub start_date: Option<String>,

    /// End date (timestamp or "now")
    #[arg(long)]
    pub end_date: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct Paging {
    #[arg(long)]
    pub offset: Option<String>,

    /// Page size, at most 50
    #[arg(long)]
    pub limit: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct ReportGetArgs {
    /// Report name (e.g. mail_incoming_traffic_summary)
    #[arg(long)]
    pub report_type: Option<String>,
    #[command(flatten)]
    pub window: DateWindow,
    #[arg(long)]
    pub filter_value: Option<String>,
    #[arg(long)]
    pub filter_by: Option<String>,
    #[arg(long)]
    pub filter_operator: Option<String>,
    #[command(flatten)]
    pub paging: Paging,
    #[arg(long)]
    pub order_by: Option<String>,
    #[arg(long)]
    pub order_dir: Option<String>,
    #[arg(long)]
    pub top: Option<String>,
}

impl From<ReportGetArgs> for ReportArgs {
    fn from(args: ReportGetArgs) -> Self {
        ReportArgs {
            report_type: args.report_type,
            start_date: args.window.start_date,
            end_date: args.window.end_date,
            filter_value: args.filter_value,
            filter_by: args.filter_by,
            filter_operator: args.filter_operator,
            limit: args.paging.limit,
            offset: args.paging.offset,
            order_by: args.order_by,
            order_dir: args.order_dir,
            top: args.top,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct MessagesSearchCliArgs {
    #[command(flatten)]
    pub window: DateWindow,
    #[command(flatten)]
    pub paging: Paging,
    #[arg(long)]
    pub attachment_name_operator: Option<String>,
    #[arg(long)]
    pub attachment_name_value: Option<String>,
    #[arg(long)]
    pub recipient_filter_operator: Option<String>,
    #[arg(long)]
    pub recipient_filter_value: Option<String>,
    #[arg(long)]
    pub sender_filter_operator: Option<String>,
    #[arg(long)]
    pub sender_filter_value: Option<String>,
    #[arg(long)]
    pub subject_filter_operator: Option<String>,
    #[arg(long)]
    pub subject_filter_value: Option<String>,
    #[arg(long)]
    pub file_sha256: Option<String>,
    #[arg(long)]
    pub url_reputation: Option<String>,
    /// incoming or outgoing
    #[arg(long)]
    pub message_direction: Option<String>,
    #[arg(long)]
    pub spam_positive: Option<String>,
    #[arg(long)]
    pub quarantined_to: Option<String>,
    #[arg(long)]
    pub virus_positive: Option<String>,
    #[arg(long)]
    pub sender_ip: Option<String>,
    /// Message-ID header
    #[arg(long)]
    pub message_id: Option<String>,
}

impl From<MessagesSearchCliArgs> for MessagesSearchArgs {
    fn from(args: MessagesSearchCliArgs) -> Self {
        MessagesSearchArgs {
            start_date: args.window.start_date,
            end_date: args.window.end_date,
            offset: args.paging.offset,
            limit: args.paging.limit,
            attachment_name_operator: args.attachment_name_operator,
            attachment_name_value: args.attachment_name_value,
            recipient_filter_operator: args.recipient_filter_operator,
            recipient_filter_value: args.recipient_filter_value,
            sender_filter_operator: args.sender_filter_operator,
            sender_filter_value: args.sender_filter_value,
            subject_filter_operator: args.subject_filter_operator,
            subject_filter_value: args.subject_filter_value,
            file_sha256: args.file_sha256,
            url_reputation: args.url_reputation,
            message_direction: args.message_direction,
            spam_positive: args.spam_positive,
            quarantined_to: args.quarantined_to,
            virus_positive: args.virus_positive,
            sender_ip: args.sender_ip,
            message_id: args.message_id,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct MessageDetailsCliArgs {
    #[command(flatten)]
    pub window: DateWindow,
    /// Message ID (mid)
    #[arg(long)]
    pub message_id: Option<String>,
    /// Injection connection ID
    #[arg(long)]
    pub icid: Option<String>,
    #[arg(long)]
    pub serial_number: Option<String>,
}

impl From<MessageDetailsCliArgs> for MessageDetailsArgs {
    fn from(args: MessageDetailsCliArgs) -> Self {
        MessageDetailsArgs {
            start_date: args.window.start_date,
            end_date: args.window.end_date,
            message_id: args.message_id,
            icid: args.icid,
            serial_number: args.serial_number,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct SpamQuarantineCliArgs {
    #[command(flatten)]
    pub window: DateWindow,
    #[command(flatten)]
    pub paging: Paging,
    #[arg(long)]
    pub order_by: Option<String>,
    #[arg(long)]
    pub order_dir: Option<String>,
    #[arg(long)]
    pub recipient_filter_operator: Option<String>,
    #[arg(long)]
    pub recipient_filter_value: Option<String>,
    #[arg(long)]
    pub filter_operator: Option<String>,
    #[arg(long)]
    pub filter_value: Option<String>,
}

impl From<SpamQuarantineCliArgs> for SpamQuarantineArgs {
    fn from(args: SpamQuarantineCliArgs) -> Self {
        SpamQuarantineArgs {
            start_date: args.window.start_date,
            end_date: args.window.end_date,
            offset: args.paging.offset,
            limit: args.paging.limit,
            order_by: args.order_by,
            order_dir: args.order_dir,
            recipient_filter_operator: args.recipient_filter_operator,
            recipient_filter_value: args.recipient_filter_value,
            filter_operator: args.filter_operator,
            filter_value: args.filter_value,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ListEntriesGetCliArgs {
    /// safelist or blocklist
    #[arg(long)]
    pub list_type: Option<String>,
    #[command(flatten)]
    pub paging: Paging,
    /// recipient (default) or sender
    #[arg(long)]
    pub view_by: Option<String>,
    #[arg(long)]
    pub order_by: Option<String>,
    #[arg(long)]
    pub order_dir: Option<String>,
    #[arg(long)]
    pub search: Option<String>,
}

impl From<ListEntriesGetCliArgs> for ListEntriesGetArgs {
    fn from(args: ListEntriesGetCliArgs) -> Self {
        ListEntriesGetArgs {
            list_type: args.list_type,
            limit: args.paging.limit,
            offset: args.paging.offset,
            view_by: args.view_by,
            order_by: args.order_by,
            order_dir: args.order_dir,
            search: args.search,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ListEntriesAddCliArgs {
    /// safelist or blocklist
    #[arg(long)]
    pub list_type: Option<String>,
    /// recipient (default) or sender
    #[arg(long)]
    pub view_by: Option<String>,
    /// add (default) or edit
    #[arg(long)]
    pub action: Option<String>,
    #[arg(long)]
    pub recipient_addresses: Option<String>,
    #[arg(long)]
    pub sender_addresses: Option<String>,
    #[arg(long)]
    pub recipient_list: Option<String>,
    #[arg(long)]
    pub sender_list: Option<String>,
}

impl From<ListEntriesAddCliArgs> for ListEntriesWriteArgs {
    fn from(args: ListEntriesAddCliArgs) -> Self {
        ListEntriesWriteArgs {
            list_type: args.list_type,
            view_by: args.view_by,
            action: args.action,
            recipient_addresses: args.recipient_addresses,
            sender_addresses: args.sender_addresses,
            recipient_list: args.recipient_list,
            sender_list: args.sender_list,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ListEntriesDeleteCliArgs {
    /// safelist or blocklist
    #[arg(long)]
    pub list_type: Option<String>,
    /// recipient (default) or sender
    #[arg(long)]
    pub view_by: Option<String>,
    #[arg(long)]
    pub recipient_list: Option<String>,
    #[arg(long)]
    pub sender_list: Option<String>,
}

impl From<ListEntriesDeleteCliArgs> for ListEntriesWriteArgs {
    fn from(args: ListEntriesDeleteCliArgs) -> Self {
        ListEntriesWriteArgs {
            list_type: args.list_type,
            view_by: args.view_by,
            recipient_list: args.recipient_list,
            sender_list: args.sender_list,
            ..Default::default()
        }
    }
}

pub async fn run(action: CiscoCommands, config: &AppConfig, format: OutputFormat) -> Result<()> {
    let cisco = config.cisco()?;
    let connector = CiscoEsaConnector::new(cisco.clone())
        .context("Failed to create Cisco Email Security connector")?;
    let now = Utc::now();

    let result = match action {
        CiscoCommands::ReportGet(args) => {
            report_get_command(&connector, &args.into(), now)
                .instrument(command_span!("cisco", "report-get"))
                .await?
        }
        CiscoCommands::MessagesSearch(args) => {
            messages_search_command(&connector, &args.into(), now)
                .instrument(command_span!("cisco", "messages-search"))
                .await?
        }
        CiscoCommands::MessageDetails(args) => {
            message_details_command(&connector, &args.into(), now)
                .instrument(command_span!("cisco", "message-details"))
                .await?
        }
        CiscoCommands::SpamQuarantineSearch(args) => {
            spam_quarantine_search_command(&connector, &args.into(), now)
                .instrument(command_span!("cisco", "spam-quarantine-search"))
                .await?
        }
        CiscoCommands::QuarantineMessageDetails { message_id } => {
            quarantine_message_details_command(&connector, Some(&message_id))
                .instrument(command_span!("cisco", "quarantine-message-details"))
                .await?
        }
        CiscoCommands::QuarantineDelete { messages_ids } => {
            quarantine_action_command(&connector, QuarantineAction::Delete, Some(&messages_ids))
                .instrument(command_span!("cisco", "quarantine-delete"))
                .await?
        }
        CiscoCommands::QuarantineRelease { messages_ids } => {
            quarantine_action_command(&connector, QuarantineAction::Release, Some(&messages_ids))
                .instrument(command_span!("cisco", "quarantine-release"))
                .await?
        }
        CiscoCommands::ListEntriesGet(args) => {
            list_entries_get_command(&connector, &args.into())
                .instrument(command_span!("cisco", "list-entries-get"))
                .await?
        }
        CiscoCommands::ListEntriesAdd(args) => {
            list_entries_add_command(&connector, &args.into())
                .instrument(command_span!("cisco", "list-entries-add"))
                .await?
        }
        CiscoCommands::ListEntriesDelete(args) => {
            list_entries_delete_command(&connector, &args.into())
                .instrument(command_span!("cisco", "list-entries-delete"))
                .await?
        }
        CiscoCommands::Fetch(args) => {
            let store = args.store(config.state_dir.as_deref(), "cisco");
            let poller = Poller::new(cisco.first_fetch);
            return fetch::run(&connector, poller, store, &args, format).await;
        }
    };

    print_result(&result, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_args_never_carry_add_fields() {
        let args: ListEntriesWriteArgs = ListEntriesDeleteCliArgs {
            list_type: Some("blocklist".into()),
            sender_list: Some("bad.example".into()),
            ..Default::default()
        }
        .into();
        assert!(args.action.is_none());
        assert!(args.recipient_addresses.is_none());

        let (_, body) = args.build_delete().unwrap();
        assert_eq!(body["action"], "delete");
    }

    #[test]
    fn test_spam_quarantine_args_flatten() {
        let args: SpamQuarantineArgs = SpamQuarantineCliArgs {
            window: DateWindow {
                start_date: Some("1 day".into()),
                end_date: Some("now".into()),
            },
            paging: Paging {
                offset: None,
                limit: Some("10".into()),
            },
            ..Default::default()
        }
        .into();
        assert_eq!(args.limit.as_deref(), Some("10"));
        assert_eq!(args.start_date.as_deref(), Some("1 day"));
    }
}
