//! Cisco Email Security commands.

use super::client::CiscoEsaConnector;
use super::params::{
    ListEntriesGetArgs, ListEntriesWriteArgs, MessageDetailsArgs, MessagesSearchArgs,
    QuarantineAction, ReportArgs, SpamQuarantineArgs, ViewBy,
};
use crate::traits::{ConnectorError, ConnectorResult};
use chrono::{DateTime, Utc};
use sa_core::command::cell;
use sa_core::{CommandResult, MarkdownTable};
use serde_json::Value;

/// Columns of a table, each read from a JSON pointer.
type Columns = &'static [(&'static str, &'static str)];

const MESSAGE_COLUMNS: Columns = &[
    ("Message ID", "/attributes/mid"),
    ("ICID", "/attributes/icid"),
    ("Serial Number", "/attributes/serialNumber"),
    ("Sender", "/attributes/sender"),
    ("Recipient", "/attributes/recipient"),
    ("Subject", "/attributes/subject"),
    ("Timestamp", "/attributes/timestamp"),
    ("Status", "/attributes/messageStatus"),
];

const MESSAGE_DETAILS_COLUMNS: Columns = &[
    ("Message ID", "/messages/mid"),
    ("Subject", "/messages/subject"),
    ("Sender", "/messages/sender"),
    ("Recipient", "/messages/recipient"),
    ("Timestamp", "/messages/timestamp"),
    ("Direction", "/messages/direction"),
    ("Sender Group", "/messages/sendingHostSummary/senderGroup"),
    ("Host IP", "/messages/sendingHostSummary/ipAddress"),
];

const QUARANTINE_COLUMNS: Columns = &[
    ("Message ID", "/mid"),
    ("Recipient", "/attributes/envelopeRecipient"),
    ("Sender", "/attributes/sender"),
    ("Subject", "/attributes/subject"),
    ("Date", "/attributes/date"),
    ("Size", "/attributes/size"),
];

const QUARANTINE_DETAILS_COLUMNS: Columns = &[
    ("Message ID", "/mid"),
    ("Recipient", "/attributes/envelopeRecipient"),
    ("Sender", "/attributes/sender"),
    ("Subject", "/attributes/subject"),
    ("Date", "/attributes/date"),
    ("To", "/attributes/toAddress"),
    ("Attachments", "/attributes/attachments"),
];

const RECIPIENT_ENTRY_COLUMNS: Columns = &[
    ("Recipient Address", "/recipientAddress"),
    ("Sender List", "/senderList"),
];

const SENDER_ENTRY_COLUMNS: Columns = &[
    ("Sender Address", "/senderAddress"),
    ("Recipient List", "/recipientList"),
];

fn table(title: &str, columns: Columns, rows: &[Value]) -> String {
    let headers: Vec<&str> = columns.iter().map(|(h, _)| *h).collect();
    let mut table = MarkdownTable::new(title, &headers);
    for row in rows {
        table.push_row(
            columns
                .iter()
                .map(|(_, pointer)| row.pointer(pointer).map(cell).unwrap_or_default())
                .collect(),
        );
    }
    table.render()
}

/// The `data` member of a response, or null.
fn data(response: &Value) -> Value {
    response.get("data").cloned().unwrap_or(Value::Null)
}

/// Rows of a `data` member that may be a list or a single object.
fn rows(data: &Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Renders messages search results.
pub fn messages_to_human_readable(messages: &Value) -> String {
    table("CiscoEmailSecurity Messages", MESSAGE_COLUMNS, &rows(messages))
}

/// Renders one tracked message's details.
pub fn message_details_to_human_readable(details: &Value) -> String {
    table("CiscoEmailSecurity Message Details", MESSAGE_DETAILS_COLUMNS, &rows(details))
}

/// Renders spam quarantine search results.
pub fn spam_quarantine_to_human_readable(messages: &Value) -> String {
    table("CiscoEmailSecurity SpamQuarantine", QUARANTINE_COLUMNS, &rows(messages))
}

pub fn quarantine_message_details_to_human_readable(details: &Value) -> String {
    table(
        "CiscoEmailSecurity QuarantineMessageDetails",
        QUARANTINE_DETAILS_COLUMNS,
        &rows(details),
    )
}

/// `cisco report-get`
pub async fn report_get_command(
    connector: &CiscoEsaConnector,
    args: &ReportArgs,
    now: DateTime<Utc>,
) -> ConnectorResult<CommandResult> {
    let (path, params) = args.build(now)?;
    let response = connector.get_report(&path, &params).await?;
    let report = data(&response);

    let report_type = report
        .get("type")
        .and_then(|v| v.as_str())
        .or(args.report_type.as_deref())
        .unwrap_or_default()
        .to_string();
    let mut table = MarkdownTable::new(&format!("Report type: {}", report_type), &["Key", "Value"]);
    if let Some(Value::Object(results)) = report.get("resultSet") {
        for (key, value) in results {
            table.push_row(vec![key.clone(), cell(value)]);
        }
    } else if let Some(Value::Array(results)) = report.get("resultSet") {
        for entry in results.iter().filter_map(|e| e.as_object()) {
            for (key, value) in entry {
                table.push_row(vec![key.clone(), cell(value)]);
            }
        }
    }

    Ok(CommandResult::readable(table.render())
        .with_outputs("CiscoEmailSecurity.Report", report)
        .with_key_field("type")
        .with_raw_response(response))
}

/// `cisco messages-search`
pub async fn messages_search_command(
    connector: &CiscoEsaConnector,
    args: &MessagesSearchArgs,
    now: DateTime<Utc>,
) -> ConnectorResult<CommandResult> {
    let params = args.build(now)?;
    let response = connector.search_messages(&params).await?;
    let messages = data(&response);

    Ok(CommandResult::readable(messages_to_human_readable(&messages))
        .with_outputs("CiscoEmailSecurity.Messages", messages)
        .with_key_field("attributes.mid")
        .with_raw_response(response))
}

/// `cisco message-details`
pub async fn message_details_command(
    connector: &CiscoEsaConnector,
    args: &MessageDetailsArgs,
    now: DateTime<Utc>,
) -> ConnectorResult<CommandResult> {
    let params = args.build(now)?;
    let response = connector.get_message_details(&params).await?;
    let details = data(&response);

    Ok(
        CommandResult::readable(message_details_to_human_readable(&details))
            .with_outputs("CiscoEmailSecurity.Message", details)
            .with_key_field("messages.mid")
            .with_raw_response(response),
    )
}

/// `cisco spam-quarantine-search`
pub async fn spam_quarantine_search_command(
    connector: &CiscoEsaConnector,
    args: &SpamQuarantineArgs,
    now: DateTime<Utc>,
) -> ConnectorResult<CommandResult> {
    let params = args.build(now)?;
    let response = connector.search_spam_quarantine(&params).await?;
    let messages = data(&response);

    Ok(
        CommandResult::readable(spam_quarantine_to_human_readable(&messages))
            .with_outputs("CiscoEmailSecurity.SpamQuarantine", messages)
            .with_key_field("mid")
            .with_raw_response(response),
    )
}

/// `cisco quarantine-message-details`
pub async fn quarantine_message_details_command(
    connector: &CiscoEsaConnector,
    message_id: Option<&str>,
) -> ConnectorResult<CommandResult> {
    let response = connector.get_quarantine_message_details(message_id).await?;
    let details = data(&response);

    Ok(
        CommandResult::readable(quarantine_message_details_to_human_readable(&details))
            .with_outputs("CiscoEmailSecurity.QuarantineMessageDetails", details)
            .with_key_field("mid")
            .with_raw_response(response),
    )
}

/// `cisco quarantine-delete` and `cisco quarantine-release`
///
/// The readable output is the appliance's response body.
pub async fn quarantine_action_command(
    connector: &CiscoEsaConnector,
    action: QuarantineAction,
    message_ids: Option<&str>,
) -> ConnectorResult<CommandResult> {
    let response = connector.quarantine_action(action, message_ids).await?;
    let prefix = match action {
        QuarantineAction::Delete => "CiscoEmailSecurity.QuarantineDeleteMessages",
        QuarantineAction::Release => "CiscoEmailSecurity.QuarantineReleaseMessages",
    };
    let readable = serde_json::to_string_pretty(&response)
        .map_err(|e| ConnectorError::Internal(e.to_string()))?;

    Ok(CommandResult::readable(readable)
        .with_outputs(prefix, data(&response))
        .with_raw_response(response))
}

/// `cisco list-entries-get`
pub async fn list_entries_get_command(
    connector: &CiscoEsaConnector,
    args: &ListEntriesGetArgs,
) -> ConnectorResult<CommandResult> {
    let (list_type, params) = args.build()?;
    let response = connector.list_entries_get(list_type, &params).await?;
    let entries = data(&response);

    let columns = match ViewBy::from_arg(args.view_by.as_deref())? {
        ViewBy::Recipient => RECIPIENT_ENTRY_COLUMNS,
        ViewBy::Sender => SENDER_ENTRY_COLUMNS,
    };
    let readable = table(&format!("List Entries ({})", list_type), columns, &rows(&entries));

    Ok(CommandResult::readable(readable)
        .with_outputs("CiscoEmailSecurity.ListEntriesGet", entries)
        .with_raw_response(response))
}

/// `cisco list-entries-add`
pub async fn list_entries_add_command(
    connector: &CiscoEsaConnector,
    args: &ListEntriesWriteArgs,
) -> ConnectorResult<CommandResult> {
    let (list_type, body) = args.build_add()?;
    let response = connector.list_entries_update(list_type, &body).await?;

    Ok(CommandResult::readable(format!(
        "Successfully updated the {} with the requested entries.",
        list_type
    ))
    .with_outputs("CiscoEmailSecurity.listEntriesAdd", data(&response))
    .with_raw_response(response))
}

/// `cisco list-entries-delete`
pub async fn list_entries_delete_command(
    connector: &CiscoEsaConnector,
    args: &ListEntriesWriteArgs,
) -> ConnectorResult<CommandResult> {
    let (list_type, body) = args.build_delete()?;
    let response = connector.list_entries_update(list_type, &body).await?;

    Ok(CommandResult::readable(format!(
        "Successfully removed the requested entries from the {}.",
        list_type
    ))
    .with_outputs("CiscoEmailSecurity.listEntriesDelete", data(&response))
    .with_raw_response(response))
}
