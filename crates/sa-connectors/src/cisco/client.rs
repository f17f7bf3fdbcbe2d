//! Cisco Email Security (SMA) client and spam quarantine incident source.

use super::params::{
    quarantine_action_body, quarantine_message_details_params, ListType, QuarantineAction,
    MAX_LIMIT, MESSAGES_PATH, MESSAGE_DETAILS_PATH, QUARANTINE_MESSAGES_PATH,
};
use crate::http::{HttpClient, QueryParams, RateLimitConfig};
use crate::traits::{
    health_from_probe, AuthConfig, Connector, ConnectorConfig, ConnectorError, ConnectorHealth,
    ConnectorResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sa_core::incident::record_id;
use sa_core::{
    parse_timestamp, to_wire_format, FirstFetch, IncidentSource, NormalizedIncident, RecordError,
    Severity,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Incident type assigned to quarantined messages.
pub const INCIDENT_TYPE: &str = "Cisco Email Security Quarantine";

const DEFAULT_SUBJECT: &str = "No Message Subject";

/// Cisco Email Security configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiscoEsaConfig {
    /// Base connector configuration; `base_url` is the appliance URL.
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    /// Quarantine messages requested per poll cycle.
    #[serde(default = "default_max_fetch")]
    pub max_fetch: u32,
    #[serde(default)]
    pub first_fetch: FirstFetch,
    /// Requests per minute sent to the appliance; 0 disables limiting.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

fn default_max_fetch() -> u32 {
    MAX_LIMIT
}

fn default_rate_limit() -> u32 {
    60
}

/// Cisco Email Security connector.
pub struct CiscoEsaConnector {
    config: CiscoEsaConfig,
    client: HttpClient,
}

impl CiscoEsaConnector {
    pub fn new(config: CiscoEsaConfig) -> ConnectorResult<Self> {
        if matches!(config.connector.auth, AuthConfig::Basic { .. }) {
            return Err(ConnectorError::ConfigError(
                "the appliance API needs jwt_login authentication".to_string(),
            ));
        }

        let rate_limit = (config.rate_limit_per_minute > 0).then(|| RateLimitConfig {
            max_requests: config.rate_limit_per_minute,
            period: std::time::Duration::from_secs(60),
            burst_size: config.rate_limit_per_minute.min(10),
        });
        let client = HttpClient::with_rate_limit(config.connector.clone(), rate_limit)?;

        info!(
            base_url = %config.connector.base_url,
            "Cisco Email Security connector initialized"
        );

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &CiscoEsaConfig {
        &self.config
    }

    async fn get(&self, path: &str, params: &QueryParams) -> ConnectorResult<Value> {
        self.client.get_json_with_query(path, params).await
    }

    #[instrument(skip(self, params), fields(connector = %self.config.connector.name))]
    pub async fn get_report(&self, path: &str, params: &QueryParams) -> ConnectorResult<Value> {
        self.get(path, params).await
    }

    #[instrument(skip(self, params), fields(connector = %self.config.connector.name))]
    pub async fn search_messages(&self, params: &QueryParams) -> ConnectorResult<Value> {
        self.get(MESSAGES_PATH, params).await
    }

    #[instrument(skip(self, params), fields(connector = %self.config.connector.name))]
    pub async fn get_message_details(&self, params: &QueryParams) -> ConnectorResult<Value> {
        self.get(MESSAGE_DETAILS_PATH, params).await
    }

    #[instrument(skip(self, params), fields(connector = %self.config.connector.name))]
    pub async fn search_spam_quarantine(&self, params: &QueryParams) -> ConnectorResult<Value> {
        self.get(QUARANTINE_MESSAGES_PATH, params).await
    }

    #[instrument(skip(self), fields(connector = %self.config.connector.name))]
    pub async fn get_quarantine_message_details(
        &self,
        message_id: Option<&str>,
    ) -> ConnectorResult<Value> {
        let params = quarantine_message_details_params(message_id)?;
        self.get(QUARANTINE_MESSAGES_PATH, &params).await
    }

    /// Deletes or releases quarantined messages by id.
    #[instrument(skip(self), fields(connector = %self.config.connector.name))]
    pub async fn quarantine_action(
        &self,
        action: QuarantineAction,
        message_ids: Option<&str>,
    ) -> ConnectorResult<Value> {
        let body = quarantine_action_body(action, message_ids)?;
        let response = self.client.post_json(QUARANTINE_MESSAGES_PATH, &body).await?;
        info!(action = action.as_str(), "Quarantine action applied");
        Ok(response)
    }

    #[instrument(skip(self, params), fields(connector = %self.config.connector.name))]
    pub async fn list_entries_get(
        &self,
        list_type: ListType,
        params: &QueryParams,
    ) -> ConnectorResult<Value> {
        self.get(&list_type.path(), params).await
    }

    /// Adds, edits or deletes safelist/blocklist entries.
    #[instrument(skip(self, body), fields(connector = %self.config.connector.name))]
    pub async fn list_entries_update(
        &self,
        list_type: ListType,
        body: &Value,
    ) -> ConnectorResult<Value> {
        self.client.post_json(&list_type.path(), body).await
    }

    fn fetch_params(&self, lower_bound: DateTime<Utc>, now: DateTime<Utc>) -> QueryParams {
        vec![
            ("startDate".to_string(), to_wire_format(&lower_bound)),
            ("endDate".to_string(), to_wire_format(&now)),
            ("quarantineType".to_string(), "spam".to_string()),
            ("offset".to_string(), "0".to_string()),
            ("limit".to_string(), self.config.max_fetch.to_string()),
            ("orderBy".to_string(), "date".to_string()),
            ("orderDir".to_string(), "asc".to_string()),
        ]
    }

    async fn probe(&self) -> ConnectorResult<()> {
        self.client.login().await?;
        let now = Utc::now();
        let mut params = self.fetch_params(now - Duration::hours(1), now);
        params.retain(|(k, _)| k != "limit");
        params.push(("limit".to_string(), "1".to_string()));
        self.search_spam_quarantine(&params).await.map(|_| ())
    }
}

#[async_trait]
impl Connector for CiscoEsaConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn connector_type(&self) -> &str {
        "email"
    }

    fn capabilities(&self) -> Vec<String> {
        [
            "health_check",
            "test_connection",
            "report_get",
            "messages_search",
            "message_details",
            "spam_quarantine_search",
            "quarantine_message_details",
            "quarantine_delete",
            "quarantine_release",
            "list_entries_get",
            "list_entries_add",
            "list_entries_delete",
            "fetch_incidents",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect()
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
impl IncidentSource for CiscoEsaConnector {
    type Error = ConnectorError;

    fn source_name(&self) -> &str {
        &self.config.connector.name
    }

    async fn fetch_since(&self, lower_bound: DateTime<Utc>) -> Result<Vec<Value>, Self::Error> {
        let params = self.fetch_params(lower_bound, Utc::now());
        let response = self.search_spam_quarantine(&params).await?;
        let messages = match response.get("data") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(ConnectorError::InvalidResponse(format!(
                    "expected a message list, got {}",
                    other
                )))
            }
        };
        debug!(messages = messages.len(), "Fetched quarantined messages");
        Ok(messages)
    }

    fn created_at(&self, record: &Value) -> Result<DateTime<Utc>, RecordError> {
        quarantine_date(record)
    }

    fn normalize(&self, record: &Value) -> Result<NormalizedIncident, RecordError> {
        normalize_quarantine_message(record)
    }
}

/// Reads `attributes.date` of a quarantined message.
pub fn quarantine_date(message: &Value) -> Result<DateTime<Utc>, RecordError> {
    let date = message
        .pointer("/attributes/date")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RecordError::MissingField {
            record_id: record_id(message, "mid"),
            field: "attributes.date".to_string(),
        })?;
    parse_timestamp(date).ok_or_else(|| RecordError::InvalidTimestamp {
        record_id: record_id(message, "mid"),
        value: date.to_string(),
    })
}

/// Turns a quarantined message into an incident.
pub fn normalize_quarantine_message(message: &Value) -> Result<NormalizedIncident, RecordError> {
    let created_at = quarantine_date(message)?;

    let subject = message
        .pointer("/attributes/subject")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SUBJECT);

    Ok(
        NormalizedIncident::from_record(message, subject, created_at, INCIDENT_TYPE, Severity::Medium)
            .with_details(message_details(message)),
    )
}

/// `"Sender: a@x; Recipients: b@y, c@z"`, from whatever the message carries.
fn message_details(message: &Value) -> String {
    let mut parts = Vec::new();
    if let Some(sender) = message.pointer("/attributes/sender").and_then(|v| v.as_str()) {
        parts.push(format!("Sender: {}", sender));
    }
    if let Some(recipients) = message.pointer("/attributes/envelopeRecipient") {
        let recipients = sa_core::command::cell(recipients);
        if !recipients.is_empty() {
            parts.push(format!("Recipients: {}", recipients));
        }
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_cisco_config;
    use serde_json::json;

    fn quarantined() -> Value {
        json!({
            "mid": 4715,
            "attributes": {
                "envelopeRecipient": ["user1@acme.com"],
                "date": "19 May 2020 10:35 (GMT +00:00)",
                "subject": "Invoice overdue",
                "sender": "billing@bad.example",
                "size": "12.3K"
            }
        })
    }

    #[test]
    fn test_normalize_quarantine_message() {
        let incident = normalize_quarantine_message(&quarantined()).unwrap();
        assert_eq!(incident.name, "Invoice overdue");
        assert_eq!(incident.occurred, "2020-05-19T10:35:00.000Z");
        assert_eq!(incident.incident_type, INCIDENT_TYPE);
        assert_eq!(incident.severity, Severity::Medium);
        assert_eq!(
            incident.details,
            "Sender: billing@bad.example; Recipients: user1@acme.com"
        );
    }

    #[test]
    fn test_normalize_requires_date() {
        let mut message = quarantined();
        message["attributes"].as_object_mut().unwrap().remove("date");
        let err = normalize_quarantine_message(&message).unwrap_err();
        assert_eq!(err.record_id(), "4715");
        assert!(matches!(err, RecordError::MissingField { .. }));
    }

    #[test]
    fn test_malformed_gmt_offset_is_rejected() {
        let mut message = quarantined();
        message["attributes"]["date"] = json!("19 May 2020 10:35 (GMT +99999999:00)");
        let err = normalize_quarantine_message(&message).unwrap_err();
        assert!(matches!(err, RecordError::InvalidTimestamp { .. }));
        assert_eq!(err.record_id(), "4715");
    }

    #[test]
    fn test_normalize_defaults_subject() {
        let mut message = quarantined();
        message["attributes"]["subject"] = json!("");
        let incident = normalize_quarantine_message(&message).unwrap();
        assert_eq!(incident.name, DEFAULT_SUBJECT);
    }

    #[test]
    fn test_rejects_basic_auth() {
        let mut config = test_cisco_config("https://esa.example.com");
        config.connector.auth = AuthConfig::basic("admin", "ironport");
        assert!(matches!(
            CiscoEsaConnector::new(config),
            Err(ConnectorError::ConfigError(_))
        ));
    }

    #[test]
    fn test_fetch_params_use_max_fetch() {
        let mut config = test_cisco_config("https://esa.example.com");
        config.max_fetch = 20;
        let connector = CiscoEsaConnector::new(config).unwrap();
        let now = Utc::now();
        let params = connector.fetch_params(now - Duration::days(3), now);
        assert!(params.contains(&("limit".to_string(), "20".to_string())));
        assert!(params.contains(&("quarantineType".to_string(), "spam".to_string())));
    }
}
