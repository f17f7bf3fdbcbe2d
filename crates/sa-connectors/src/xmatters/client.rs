//! xMatters REST client and incident source.
//!
//! Two endpoints are involved: the inbound workflow webhook (the connector's
//! `base_url`) that triggers a notification, and the instance's
//! `/api/xm/1/events` API that is searched and polled.

use crate::http::{push_param, HttpClient, QueryParams};
use crate::traits::{
    health_from_probe, Connector, ConnectorConfig, ConnectorError, ConnectorHealth,
    ConnectorResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sa_core::incident::record_id;
use sa_core::{
    parse_timestamp, to_wire_format, FirstFetch, IncidentSource, NormalizedIncident, RecordError,
    SeverityPolicy,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

const EVENTS_PATH: &str = "/api/xm/1/events";

/// Incident type assigned to fetched events.
pub const INCIDENT_TYPE: &str = "xMatters Alert";

/// Name used when an event carries none.
pub const DEFAULT_INCIDENT_NAME: &str = "No Message Subject";

/// xMatters-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XMattersConfig {
    /// Base connector configuration; `base_url` is the workflow trigger URL.
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    /// Instance host (`company.xmatters.com`) or full URL.
    pub instance: String,
    /// Filters applied when polling for incidents.
    #[serde(default)]
    pub fetch: XMattersFetchFilter,
    #[serde(default)]
    pub first_fetch: FirstFetch,
    /// How event priorities map to incident severity.
    #[serde(default)]
    pub severity_policy: SeverityPolicy,
}

impl XMattersConfig {
    /// Base URL of the instance API.
    pub fn instance_url(&self) -> String {
        let instance = self.instance.trim().trim_end_matches('/');
        if instance.starts_with("https://") || instance.starts_with("http://") {
            instance.to_string()
        } else {
            format!("https://{}", instance)
        }
    }
}

/// Event filters used by the poller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XMattersFetchFilter {
    /// `ACTIVE`, `SUSPENDED` or `TERMINATED`.
    pub status: Option<String>,
    /// Comma separated priorities (`LOW,MEDIUM,HIGH`).
    pub priority: Option<String>,
    pub property_name: Option<String>,
    pub property_value: Option<String>,
}

/// Search filters for the events API. Dates are already in wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub request_id: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Workflow (plan) name.
    pub workflow: Option<String>,
    pub form: Option<String>,
    pub property_name: Option<String>,
    pub property_value: Option<String>,
}

impl EventQuery {
    /// Query parameters for the events API.
    ///
    /// A property filter is only sent when both its name and value are set.
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        push_param(&mut params, "status", self.status.as_deref());
        push_param(&mut params, "priority", self.priority.as_deref());
        push_param(&mut params, "from", self.from.as_deref());
        push_param(&mut params, "to", self.to.as_deref());
        if let (Some(name), Some(value)) = (
            sa_core::args::non_empty(self.property_name.as_deref()),
            sa_core::args::non_empty(self.property_value.as_deref()),
        ) {
            push_param(&mut params, "propertyName", Some(name));
            push_param(&mut params, "propertyValue", Some(value));
        }
        push_param(&mut params, "requestId", self.request_id.as_deref());
        push_param(&mut params, "plan", self.workflow.as_deref());
        push_param(&mut params, "form", self.form.as_deref());
        params
    }
}

/// Arguments sent to the workflow trigger webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowTrigger {
    pub recipients: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub incident_id: Option<String>,
    pub close_task_id: Option<String>,
}

impl WorkflowTrigger {
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        push_param(&mut params, "recipients", self.recipients.as_deref());
        push_param(&mut params, "subject", self.subject.as_deref());
        push_param(&mut params, "body", self.body.as_deref());
        push_param(&mut params, "incident_id", self.incident_id.as_deref());
        push_param(&mut params, "close_task_id", self.close_task_id.as_deref());
        params
    }
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    data: Vec<serde_json::Value>,
    #[serde(default)]
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    next: Option<String>,
}

/// xMatters connector.
pub struct XMattersConnector {
    config: XMattersConfig,
    trigger_client: HttpClient,
    events_client: HttpClient,
}

impl XMattersConnector {
    pub fn new(config: XMattersConfig) -> ConnectorResult<Self> {
        if config.instance.trim().is_empty() {
            return Err(ConnectorError::ConfigError(
                "xMatters instance is required".to_string(),
            ));
        }

        let trigger_client = HttpClient::new(config.connector.clone())?;

        let mut events_config = config.connector.clone();
        events_config.base_url = config.instance_url();
        let events_client = HttpClient::new(events_config)?;

        info!(
            instance = %config.instance_url(),
            "xMatters connector initialized"
        );

        Ok(Self {
            config,
            trigger_client,
            events_client,
        })
    }

    pub fn config(&self) -> &XMattersConfig {
        &self.config
    }

    /// Triggers the configured workflow and returns the webhook response.
    #[instrument(skip(self, trigger), fields(connector = %self.config.connector.name))]
    pub async fn trigger_workflow(
        &self,
        trigger: &WorkflowTrigger,
    ) -> ConnectorResult<serde_json::Value> {
        let response: serde_json::Value = self
            .trigger_client
            .post_query_json("", &trigger.to_params())
            .await?;
        info!("Triggered xMatters workflow");
        Ok(response)
    }

    /// Searches events, following `links.next` until the last page.
    #[instrument(skip(self, query), fields(connector = %self.config.connector.name))]
    pub async fn search_events(
        &self,
        query: &EventQuery,
    ) -> ConnectorResult<Vec<serde_json::Value>> {
        let mut page: EventsPage = self
            .events_client
            .get_json_with_query(EVENTS_PATH, &query.to_params())
            .await?;
        let mut events = std::mem::take(&mut page.data);
        let mut pages = 1;

        while let Some(next) = page.links.take().and_then(|links| links.next) {
            page = self.events_client.get_json(&next).await?;
            events.append(&mut page.data);
            pages += 1;
        }

        debug!(pages, events = events.len(), "Event search complete");
        Ok(events)
    }

    /// Gets one event by id.
    #[instrument(skip(self), fields(connector = %self.config.connector.name))]
    pub async fn get_event(&self, event_id: &str) -> ConnectorResult<serde_json::Value> {
        let path = format!("{}/{}", EVENTS_PATH, urlencoding::encode(event_id));
        self.events_client.get_json(&path).await
    }

    fn fetch_query(&self, lower_bound: DateTime<Utc>) -> EventQuery {
        let filter = &self.config.fetch;
        EventQuery {
            status: filter.status.clone(),
            priority: filter.priority.clone(),
            from: Some(to_wire_format(&lower_bound)),
            property_name: filter.property_name.clone(),
            property_value: filter.property_value.clone(),
            ..Default::default()
        }
    }

    async fn probe(&self) -> ConnectorResult<()> {
        let params = vec![("limit".to_string(), "1".to_string())];
        self.events_client
            .get_json_with_query::<serde_json::Value>(EVENTS_PATH, &params)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Connector for XMattersConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn connector_type(&self) -> &str {
        "alerting"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "health_check".to_string(),
            "test_connection".to_string(),
            "trigger_workflow".to_string(),
            "get_events".to_string(),
            "get_event".to_string(),
            "fetch_incidents".to_string(),
        ]
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(health_from_probe(self.probe().await))
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        self.probe().await?;
        Ok(true)
    }
}

#[async_trait]
impl IncidentSource for XMattersConnector {
    type Error = ConnectorError;

    fn source_name(&self) -> &str {
        &self.config.connector.name
    }

    async fn fetch_since(
        &self,
        lower_bound: DateTime<Utc>,
    ) -> Result<Vec<serde_json::Value>, Self::Error> {
        self.search_events(&self.fetch_query(lower_bound)).await
    }

    fn created_at(&self, record: &serde_json::Value) -> Result<DateTime<Utc>, RecordError> {
        event_created_at(record)
    }

    fn normalize(&self, record: &serde_json::Value) -> Result<NormalizedIncident, RecordError> {
        normalize_event(record, &self.config.severity_policy)
    }
}

/// Reads the `created` time of an xMatters event.
pub fn event_created_at(event: &serde_json::Value) -> Result<DateTime<Utc>, RecordError> {
    let created = event
        .get("created")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RecordError::MissingField {
            record_id: record_id(event, "id"),
            field: "created".to_string(),
        })?;
    parse_timestamp(created).ok_or_else(|| RecordError::InvalidTimestamp {
        record_id: record_id(event, "id"),
        value: created.to_string(),
    })
}

/// Turns an xMatters event into an incident.
pub fn normalize_event(
    event: &serde_json::Value,
    policy: &SeverityPolicy,
) -> Result<NormalizedIncident, RecordError> {
    let id = record_id(event, "id");
    let created_at = event_created_at(event)?;

    let priority = event
        .get("priority")
        .and_then(|v| v.as_str())
        .unwrap_or("Low");
    let severity = policy.map(priority).map_err(|source| RecordError::Severity {
        record_id: id.clone(),
        source,
    })?;

    let name = event
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_INCIDENT_NAME);

    Ok(
        NormalizedIncident::from_record(event, name, created_at, INCIDENT_TYPE, severity)
            .with_details(event_details(event)),
    )
}

/// `"<plan> - <form>"`, leaving out whichever part is absent.
fn event_details(event: &serde_json::Value) -> String {
    let mut details = String::new();
    if let Some(plan) = event.pointer("/plan/name").and_then(|v| v.as_str()) {
        details.push_str(plan);
        details.push_str(" - ");
    }
    if let Some(form) = event.pointer("/form/name").and_then(|v| v.as_str()) {
        details.push_str(form);
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_xmatters_config;
    use sa_core::{FallbackSeverity, Severity};
    use serde_json::json;

    fn sample_event() -> serde_json::Value {
        json!({
            "id": "34dbeef5-2a9b-4b4e-9d6a-0fd0d1d1a111",
            "name": "Disk usage above 95% on db-01",
            "created": "2020-01-23T21:45:45.000+0000",
            "status": "ACTIVE",
            "priority": "HIGH",
            "plan": {"name": "Ops Alerts"},
            "form": {"name": "Disk Alert"},
            "submitter": {"targetName": "svc-monitor"}
        })
    }

    #[test]
    fn test_instance_url() {
        let mut config = test_xmatters_config("https://acme.xmatters.com");
        assert_eq!(config.instance_url(), "https://acme.xmatters.com");

        config.instance = "acme.xmatters.com/".to_string();
        assert_eq!(config.instance_url(), "https://acme.xmatters.com");
    }

    #[test]
    fn test_event_query_params_order() {
        let query = EventQuery {
            request_id: Some("req-1".into()),
            status: Some("ACTIVE".into()),
            priority: Some("HIGH".into()),
            from: Some("2020-01-01T00:00:00.000Z".into()),
            to: None,
            workflow: Some("Ops".into()),
            form: Some("Disk".into()),
            property_name: Some("host".into()),
            property_value: Some("db-01".into()),
        };
        let keys: Vec<_> = query.to_params().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["status", "priority", "from", "propertyName", "propertyValue", "requestId", "plan", "form"]
        );
    }

    #[test]
    fn test_property_filter_needs_both_parts() {
        let query = EventQuery {
            property_name: Some("host".into()),
            ..Default::default()
        };
        assert!(query.to_params().is_empty());
    }

    #[test]
    fn test_workflow_trigger_params() {
        let trigger = WorkflowTrigger {
            recipients: Some("ops-oncall".into()),
            subject: Some("Phishing campaign".into()),
            body: None,
            incident_id: Some("42".into()),
            close_task_id: Some("".into()),
        };
        assert_eq!(
            trigger.to_params(),
            vec![
                ("recipients".to_string(), "ops-oncall".to_string()),
                ("subject".to_string(), "Phishing campaign".to_string()),
                ("incident_id".to_string(), "42".to_string()),
            ]
        );
    }

    #[test]
    fn test_normalize_event() {
        let incident = normalize_event(&sample_event(), &SeverityPolicy::Strict).unwrap();
        assert_eq!(incident.name, "Disk usage above 95% on db-01");
        assert_eq!(incident.details, "Ops Alerts - Disk Alert");
        assert_eq!(incident.occurred, "2020-01-23T21:45:45.000Z");
        assert_eq!(incident.incident_type, "xMatters Alert");
        assert_eq!(incident.severity, Severity::High);
        assert_eq!(incident.created_at.timestamp(), 1_579_815_945);
    }

    #[test]
    fn test_normalize_defaults() {
        let event = json!({"id": "e1", "created": "2020-01-23T21:45:45.000+0000"});
        let incident = normalize_event(&event, &SeverityPolicy::Strict).unwrap();
        assert_eq!(incident.name, DEFAULT_INCIDENT_NAME);
        assert_eq!(incident.details, "");
        assert_eq!(incident.severity, Severity::Low);
    }

    #[test]
    fn test_normalize_rejects_unknown_priority() {
        let mut event = sample_event();
        event["priority"] = json!("URGENT");
        let err = normalize_event(&event, &SeverityPolicy::Strict).unwrap_err();
        assert!(matches!(err, RecordError::Severity { .. }));

        let fallback = SeverityPolicy::Fallback(FallbackSeverity::Medium);
        let incident = normalize_event(&event, &fallback).unwrap();
        assert_eq!(incident.severity, Severity::Medium);
    }

    #[test]
    fn test_normalize_rejects_bad_created() {
        let mut event = sample_event();
        event["created"] = json!("yesterday-ish");
        assert!(matches!(
            normalize_event(&event, &SeverityPolicy::Strict),
            Err(RecordError::InvalidTimestamp { .. })
        ));

        event.as_object_mut().unwrap().remove("created");
        assert!(matches!(
            normalize_event(&event, &SeverityPolicy::Strict),
            Err(RecordError::MissingField { .. })
        ));
    }

    #[test]
    fn test_unknown_priority_at_watermark_counts_as_seen() {
        let mut event = sample_event();
        event["priority"] = json!("URGENT");
        let at = event_created_at(&event).unwrap();
        let policy = SeverityPolicy::Strict;

        let cycle = sa_core::poller::process_records(
            sa_core::Watermark::from_datetime(&at),
            &[event],
            event_created_at,
            |e| normalize_event(e, &policy),
        );
        assert_eq!(cycle.already_seen, 1);
        assert!(cycle.rejected.is_empty());
        assert!(cycle.incidents.is_empty());
    }

    #[test]
    fn test_requires_instance() {
        let mut config = test_xmatters_config("https://acme.xmatters.com");
        config.instance = " ".to_string();
        assert!(matches!(
            XMattersConnector::new(config),
            Err(ConnectorError::ConfigError(_))
        ));
    }
}
