//! xMatters commands.

use super::client::{EventQuery, WorkflowTrigger, XMattersConnector};
use crate::traits::{ConnectorError, ConnectorResult};
use chrono::{DateTime, Utc};
use sa_core::args::require;
use sa_core::time::arg_to_wire_date;
use sa_core::{CommandResult, MarkdownTable};
use serde_json::{json, Value};

const EVENT_COLUMNS: &[&str] = &[
    "Incident",
    "Name",
    "Created",
    "Terminated",
    "Status",
    "Priority",
    "PlanName",
    "FormName",
    "SubmitterName",
];

/// Projects an event onto the fields shown to analysts.
pub fn event_reduce(event: &Value) -> Value {
    let field = |pointer: &str| event.pointer(pointer).cloned().unwrap_or(Value::Null);
    json!({
        "Created": field("/created"),
        "Terminated": field("/terminated"),
        "Incident": field("/id"),
        "Name": field("/name"),
        "PlanName": field("/plan/name"),
        "FormName": field("/form/name"),
        "Status": field("/status"),
        "Priority": field("/priority"),
        "Properties": field("/properties"),
        "SubmitterName": field("/submitter/targetName"),
    })
}

/// `xmatters trigger-workflow`
pub async fn trigger_workflow_command(
    connector: &XMattersConnector,
    trigger: &WorkflowTrigger,
) -> ConnectorResult<CommandResult> {
    let response = connector.trigger_workflow(trigger).await?;
    let request_id = response
        .get("requestId")
        .cloned()
        .filter(|v| !v.is_null())
        .ok_or_else(|| {
            ConnectorError::InvalidResponse("workflow response has no requestId".to_string())
        })?;

    Ok(CommandResult::readable("Successfully sent a message to xMatters.")
        .with_bare_outputs(json!({ "request_id": request_id }))
        .with_raw_response(response))
}

/// `xmatters get-events`
///
/// `from` and `to` accept any supported date form and are sent in wire format.
pub async fn get_events_command(
    connector: &XMattersConnector,
    mut query: EventQuery,
    now: DateTime<Utc>,
) -> ConnectorResult<CommandResult> {
    query.from = arg_to_wire_date(query.from.as_deref(), "from", now)?;
    query.to = arg_to_wire_date(query.to.as_deref(), "to", now)?;

    let events = connector.search_events(&query).await?;
    let reduced: Vec<Value> = events.iter().map(event_reduce).collect();

    let mut table = MarkdownTable::new("xMatters Events", EVENT_COLUMNS);
    table.push_objects(&reduced);

    Ok(CommandResult::readable(format!(
        "Retrieved Events from xMatters.\n{}",
        table.render()
    ))
    .with_outputs("xMatters.GetEvents", json!({ "Events": reduced }))
    .with_raw_response(Value::Array(events)))
}

/// `xmatters get-event`
pub async fn get_event_command(
    connector: &XMattersConnector,
    event_id: Option<&str>,
) -> ConnectorResult<CommandResult> {
    let event_id = require(event_id, "event_id")?;
    let event = connector.get_event(event_id).await?;
    let reduced = event_reduce(&event);

    let mut table = MarkdownTable::new("xMatters Event", EVENT_COLUMNS);
    table.push_objects(std::slice::from_ref(&reduced));

    Ok(CommandResult::readable(format!(
        "Retrieved Event from xMatters.\n{}",
        table.render()
    ))
    .with_outputs("xMatters.GetEvent", json!({ "Event": reduced }))
    .with_raw_response(event))
}
