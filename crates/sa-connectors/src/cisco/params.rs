//! Query strings and request bodies for the appliance API.
//!
//! Builders take user arguments as given on the command line, validate
//! them, and return the path with its parameters in the order the appliance
//! documents them. Dates go out in the wire format.

use crate::http::{push_param, QueryParams};
use chrono::{DateTime, Utc};
use sa_core::args::{arg_to_list, clamp_limit, non_empty, parse_count, require};
use sa_core::time::arg_to_wire_date;
use sa_core::ArgError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

pub const LOGIN_PATH: &str = "/sma/api/v2.0/login";
pub const MESSAGES_PATH: &str = "/sma/api/v2.0/message-tracking/messages";
pub const MESSAGE_DETAILS_PATH: &str = "/sma/api/v2.0/message-tracking/details";
pub const QUARANTINE_MESSAGES_PATH: &str = "/sma/api/v2.0/quarantine/messages";

/// Page size used when none is given, and the largest one accepted.
pub const MAX_LIMIT: u32 = 50;

const QUARANTINE_TYPE: &str = "spam";

/// Path of a report.
pub fn report_path(report_type: &str) -> String {
    format!(
        "/sma/api/v2.0/reporting/{}",
        urlencoding::encode(report_type.trim())
    )
}

/// The two sender lists kept by the spam quarantine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Safelist,
    Blocklist,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safelist => "safelist",
            Self::Blocklist => "blocklist",
        }
    }

    pub fn path(&self) -> String {
        format!("/sma/api/v2.0/quarantine/{}", self.as_str())
    }
}

impl FromStr for ListType {
    type Err = ArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safelist" => Ok(Self::Safelist),
            "blocklist" => Ok(Self::Blocklist),
            other => Err(ArgError::invalid(
                "list_type",
                format!("expected safelist or blocklist, got '{}'", other),
            )),
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether list entries are keyed by recipient or by sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewBy {
    #[default]
    Recipient,
    Sender,
}

impl ViewBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recipient => "recipient",
            Self::Sender => "sender",
        }
    }

    /// Parses an optional argument, defaulting to `recipient`.
    pub fn from_arg(value: Option<&str>) -> Result<Self, ArgError> {
        match non_empty(value).map(str::to_ascii_lowercase).as_deref() {
            None | Some("recipient") => Ok(Self::Recipient),
            Some("sender") => Ok(Self::Sender),
            Some(other) => Err(ArgError::invalid(
                "view_by",
                format!("expected recipient or sender, got '{}'", other),
            )),
        }
    }
}

/// Add or edit when writing list entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListAction {
    #[default]
    Add,
    Edit,
}

impl ListAction {
    pub fn from_arg(value: Option<&str>) -> Result<Self, ArgError> {
        match non_empty(value).map(str::to_ascii_lowercase).as_deref() {
            None | Some("add") => Ok(Self::Add),
            Some("edit") => Ok(Self::Edit),
            Some(other) => Err(ArgError::invalid(
                "action",
                format!("expected add or edit, got '{}'", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Edit => "edit",
        }
    }
}

/// Actions on quarantined messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarantineAction {
    Delete,
    Release,
}

impl QuarantineAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Release => "release",
        }
    }
}

fn required_date(arg: Option<&str>, name: &str, now: DateTime<Utc>) -> Result<String, ArgError> {
    require(arg, name)?;
    arg_to_wire_date(arg, name, now)?.ok_or_else(|| ArgError::Missing(name.to_string()))
}

fn push_paging(params: &mut QueryParams, offset: Option<&str>, limit: Option<&str>) -> Result<(), ArgError> {
    let offset = parse_count(offset, "offset")?.unwrap_or(0);
    let limit = clamp_limit(limit, MAX_LIMIT)?;
    params.push(("offset".to_string(), offset.to_string()));
    params.push(("limit".to_string(), limit.to_string()));
    Ok(())
}

/// Arguments of `report-get`.
#[derive(Debug, Clone, Default)]
pub struct ReportArgs {
    pub report_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub filter_value: Option<String>,
    pub filter_by: Option<String>,
    pub filter_operator: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
    pub top: Option<String>,
}

impl ReportArgs {
    pub fn build(&self, now: DateTime<Utc>) -> Result<(String, QueryParams), ArgError> {
        let report_type = require(self.report_type.as_deref(), "report_type")?;
        let mut params = QueryParams::new();
        params.push((
            "startDate".to_string(),
            required_date(self.start_date.as_deref(), "start_date", now)?,
        ));
        params.push((
            "endDate".to_string(),
            required_date(self.end_date.as_deref(), "end_date", now)?,
        ));
        params.push(("device_type".to_string(), "esa".to_string()));
        push_param(&mut params, "filterValue", self.filter_value.as_deref());
        push_param(&mut params, "filterBy", self.filter_by.as_deref());
        push_param(&mut params, "filterOperator", self.filter_operator.as_deref());
        if let Some(limit) = parse_count(self.limit.as_deref(), "limit")? {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = parse_count(self.offset.as_deref(), "offset")? {
            params.push(("offset".to_string(), offset.to_string()));
        }
        push_param(&mut params, "orderBy", self.order_by.as_deref());
        push_param(&mut params, "orderDir", self.order_dir.as_deref());
        if let Some(top) = parse_count(self.top.as_deref(), "top")? {
            params.push(("top".to_string(), top.to_string()));
        }
        Ok((report_path(report_type), params))
    }
}

/// Arguments of `messages-search`.
#[derive(Debug, Clone, Default)]
pub struct MessagesSearchArgs {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub attachment_name_operator: Option<String>,
    pub attachment_name_value: Option<String>,
    pub recipient_filter_operator: Option<String>,
    pub recipient_filter_value: Option<String>,
    pub sender_filter_operator: Option<String>,
    pub sender_filter_value: Option<String>,
    pub subject_filter_operator: Option<String>,
    pub subject_filter_value: Option<String>,
    pub file_sha256: Option<String>,
    pub url_reputation: Option<String>,
    pub message_direction: Option<String>,
    pub spam_positive: Option<String>,
    pub quarantined_to: Option<String>,
    pub virus_positive: Option<String>,
    pub sender_ip: Option<String>,
    pub message_id: Option<String>,
}

impl MessagesSearchArgs {
    pub fn build(&self, now: DateTime<Utc>) -> Result<QueryParams, ArgError> {
        let mut params = QueryParams::new();
        params.push((
            "startDate".to_string(),
            required_date(self.start_date.as_deref(), "start_date", now)?,
        ));
        params.push((
            "endDate".to_string(),
            required_date(self.end_date.as_deref(), "end_date", now)?,
        ));
        params.push(("searchOption".to_string(), "messages".to_string()));
        push_paging(&mut params, self.offset.as_deref(), self.limit.as_deref())?;

        push_filter(
            &mut params,
            ("attachmentNameOperator", self.attachment_name_operator.as_deref()),
            ("attachmentNameValue", self.attachment_name_value.as_deref()),
        );
        push_filter(
            &mut params,
            ("envelopeRecipientfilterOperator", self.recipient_filter_operator.as_deref()),
            ("envelopeRecipientfilterValue", self.recipient_filter_value.as_deref()),
        );
        push_filter(
            &mut params,
            ("envelopeSenderfilterOperator", self.sender_filter_operator.as_deref()),
            ("envelopeSenderfilterValue", self.sender_filter_value.as_deref()),
        );
        push_filter(
            &mut params,
            ("subjectfilterOperator", self.subject_filter_operator.as_deref()),
            ("subjectfilterValue", self.subject_filter_value.as_deref()),
        );
        push_param(&mut params, "fileSha256", self.file_sha256.as_deref());
        push_param(&mut params, "urlReputation", self.url_reputation.as_deref());
        push_param(&mut params, "messageDirection", self.message_direction.as_deref());
        push_param(&mut params, "spamPositive", self.spam_positive.as_deref());
        push_param(&mut params, "quarantinedTo", self.quarantined_to.as_deref());
        push_param(&mut params, "virusPositive", self.virus_positive.as_deref());
        push_param(&mut params, "senderIp", self.sender_ip.as_deref());
        push_param(&mut params, "messageIdHeader", self.message_id.as_deref());
        Ok(params)
    }
}

/// Adds an operator/value pair; the operator defaults to `is` when only a
/// value is given.
fn push_filter(
    params: &mut QueryParams,
    operator: (&str, Option<&str>),
    value: (&str, Option<&str>),
) {
    if let Some(v) = non_empty(value.1) {
        push_param(params, operator.0, Some(non_empty(operator.1).unwrap_or("is")));
        push_param(params, value.0, Some(v));
    }
}

/// Arguments of `message-details`.
#[derive(Debug, Clone, Default)]
pub struct MessageDetailsArgs {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub message_id: Option<String>,
    pub icid: Option<String>,
    pub serial_number: Option<String>,
}

impl MessageDetailsArgs {
    pub fn build(&self, now: DateTime<Utc>) -> Result<QueryParams, ArgError> {
        let mut params = QueryParams::new();
        params.push((
            "startDate".to_string(),
            required_date(self.start_date.as_deref(), "start_date", now)?,
        ));
        params.push((
            "endDate".to_string(),
            required_date(self.end_date.as_deref(), "end_date", now)?,
        ));
        params.push((
            "mid".to_string(),
            require(self.message_id.as_deref(), "message_id")?.to_string(),
        ));
        params.push((
            "icid".to_string(),
            require(self.icid.as_deref(), "icid")?.to_string(),
        ));
        push_param(&mut params, "serialNumber", self.serial_number.as_deref());
        Ok(params)
    }
}

/// Arguments of `spam-quarantine-search`.
#[derive(Debug, Clone, Default)]
pub struct SpamQuarantineArgs {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
    pub recipient_filter_operator: Option<String>,
    pub recipient_filter_value: Option<String>,
    pub filter_operator: Option<String>,
    pub filter_value: Option<String>,
}

impl SpamQuarantineArgs {
    pub fn build(&self, now: DateTime<Utc>) -> Result<QueryParams, ArgError> {
        let mut params = QueryParams::new();
        params.push((
            "startDate".to_string(),
            required_date(self.start_date.as_deref(), "start_date", now)?,
        ));
        params.push((
            "endDate".to_string(),
            required_date(self.end_date.as_deref(), "end_date", now)?,
        ));
        params.push(("quarantineType".to_string(), QUARANTINE_TYPE.to_string()));
        push_paging(&mut params, self.offset.as_deref(), self.limit.as_deref())?;
        push_param(&mut params, "orderBy", self.order_by.as_deref());
        push_param(&mut params, "orderDir", self.order_dir.as_deref());
        push_filter(
            &mut params,
            (
                "envelopeRecipientFilterOperator",
                self.recipient_filter_operator.as_deref(),
            ),
            (
                "envelopeRecipientFilterValue",
                self.recipient_filter_value.as_deref(),
            ),
        );
        push_filter(
            &mut params,
            ("filterOperator", self.filter_operator.as_deref()),
            ("filterValue", self.filter_value.as_deref()),
        );
        Ok(params)
    }
}

/// Parameters for the details of one quarantined message.
pub fn quarantine_message_details_params(message_id: Option<&str>) -> Result<QueryParams, ArgError> {
    Ok(vec![
        (
            "mid".to_string(),
            require(message_id, "message_id")?.to_string(),
        ),
        ("quarantineType".to_string(), QUARANTINE_TYPE.to_string()),
    ])
}

/// Body for deleting or releasing quarantined messages.
pub fn quarantine_action_body(
    action: QuarantineAction,
    message_ids: Option<&str>,
) -> Result<Value, ArgError> {
    let ids = arg_to_list(message_ids);
    if ids.is_empty() {
        return Err(ArgError::Missing("messages_ids".to_string()));
    }
    let mids = ids
        .iter()
        .map(|id| {
            id.parse::<u64>().map_err(|_| {
                ArgError::invalid("messages_ids", format!("'{}' is not a message id", id))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "action": action.as_str(),
        "mids": mids,
        "quarantineType": QUARANTINE_TYPE,
    }))
}

/// Arguments of `list-entries-get`.
#[derive(Debug, Clone, Default)]
pub struct ListEntriesGetArgs {
    pub list_type: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub view_by: Option<String>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
    pub search: Option<String>,
}

impl ListEntriesGetArgs {
    pub fn build(&self) -> Result<(ListType, QueryParams), ArgError> {
        let list_type: ListType = require(self.list_type.as_deref(), "list_type")?.parse()?;
        let limit = clamp_limit(self.limit.as_deref(), MAX_LIMIT)?;
        let offset = parse_count(self.offset.as_deref(), "offset")?.unwrap_or(0);
        let view_by = ViewBy::from_arg(self.view_by.as_deref())?;

        let mut params: QueryParams = vec![
            ("action".to_string(), "view".to_string()),
            ("limit".to_string(), limit.to_string()),
            ("offset".to_string(), offset.to_string()),
            ("quarantineType".to_string(), QUARANTINE_TYPE.to_string()),
            ("viewBy".to_string(), view_by.as_str().to_string()),
        ];
        push_param(&mut params, "orderBy", self.order_by.as_deref());
        push_param(&mut params, "orderDir", self.order_dir.as_deref());
        push_param(&mut params, "search", self.search.as_deref());
        Ok((list_type, params))
    }
}

/// Arguments of `list-entries-add` and `list-entries-delete`.
#[derive(Debug, Clone, Default)]
pub struct ListEntriesWriteArgs {
    pub list_type: Option<String>,
    pub view_by: Option<String>,
    pub action: Option<String>,
    pub recipient_addresses: Option<String>,
    pub sender_addresses: Option<String>,
    pub recipient_list: Option<String>,
    pub sender_list: Option<String>,
}

impl ListEntriesWriteArgs {
    /// Body for adding or editing entries.
    ///
    /// Entries keyed by recipient carry `recipientAddresses` with the
    /// `senderList` to apply; entries keyed by sender carry
    /// `senderAddresses` with a `recipientList`.
    pub fn build_add(&self) -> Result<(ListType, Value), ArgError> {
        let list_type: ListType = require(self.list_type.as_deref(), "list_type")?.parse()?;
        let view_by = ViewBy::from_arg(self.view_by.as_deref())?;
        let action = ListAction::from_arg(self.action.as_deref())?;

        let mut body = json!({
            "action": action.as_str(),
            "quarantineType": QUARANTINE_TYPE,
            "viewBy": view_by.as_str(),
        });
        let (keys_field, keys, values_field, values) = match view_by {
            ViewBy::Recipient => (
                "recipientAddresses",
                arg_to_list(self.recipient_addresses.as_deref()),
                "senderList",
                arg_to_list(self.sender_list.as_deref()),
            ),
            ViewBy::Sender => (
                "senderAddresses",
                arg_to_list(self.sender_addresses.as_deref()),
                "recipientList",
                arg_to_list(self.recipient_list.as_deref()),
            ),
        };
        if keys.is_empty() {
            return Err(ArgError::Missing(to_arg_name(keys_field)));
        }
        if values.is_empty() {
            return Err(ArgError::Missing(to_arg_name(values_field)));
        }
        body[keys_field] = json!(keys);
        body[values_field] = json!(values);
        Ok((list_type, body))
    }

    /// Body for deleting entries by recipient and/or sender.
    pub fn build_delete(&self) -> Result<(ListType, Value), ArgError> {
        let list_type: ListType = require(self.list_type.as_deref(), "list_type")?.parse()?;
        let view_by = ViewBy::from_arg(self.view_by.as_deref())?;

        let mut body = json!({
            "action": "delete",
            "quarantineType": QUARANTINE_TYPE,
            "viewBy": view_by.as_str(),
        });
        let recipients = arg_to_list(self.recipient_list.as_deref());
        let senders = arg_to_list(self.sender_list.as_deref());
        if recipients.is_empty() && senders.is_empty() {
            return Err(ArgError::Missing("recipient_list or sender_list".to_string()));
        }
        if !recipients.is_empty() {
            body["recipientList"] = json!(recipients);
        }
        if !senders.is_empty() {
            body["senderList"] = json!(senders);
        }
        Ok((list_type, body))
    }
}

fn to_arg_name(field: &str) -> String {
    let mut name = String::with_capacity(field.len() + 2);
    for c in field.chars() {
        if c.is_ascii_uppercase() {
            name.push('_');
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }
    name
}
