//! Normalized incidents handed to the case platform.

use crate::severity::{Severity, UnknownSeverity};
use crate::time::to_wire_format;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An incident ready for case creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedIncident {
    pub name: String,
    pub details: String,
    /// Wire-formatted occurrence time.
    pub occurred: String,
    #[serde(rename = "type")]
    pub incident_type: String,
    pub severity: Severity,
    /// The vendor record, serialized verbatim.
    #[serde(rename = "rawJSON")]
    pub raw_json: String,
    /// Creation time the watermark is computed from.
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

impl NormalizedIncident {
    /// Builds an incident from a vendor record.
    pub fn from_record(
        record: &serde_json::Value,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        incident_type: &str,
        severity: Severity,
    ) -> Self {
        Self {
            name: name.into(),
            details: String::new(),
            occurred: to_wire_format(&created_at),
            incident_type: incident_type.to_string(),
            severity,
            raw_json: record.to_string(),
            created_at,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// Why a single record could not become an incident.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record {record_id}: missing field '{field}'")]
    MissingField { record_id: String, field: String },

    #[error("record {record_id}: unparseable creation time '{value}'")]
    InvalidTimestamp { record_id: String, value: String },

    #[error("record {record_id}: {source}")]
    Severity {
        record_id: String,
        #[source]
        source: UnknownSeverity,
    },
}

impl RecordError {
    pub fn record_id(&self) -> &str {
        match self {
            Self::MissingField { record_id, .. }
            | Self::InvalidTimestamp { record_id, .. }
            | Self::Severity { record_id, .. } => record_id,
        }
    }
}

/// Best-effort identifier for diagnostics about a record.
pub fn record_id(record: &serde_json::Value, field: &str) -> String {
    match record.get(field) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => "<unknown>".to_string(),
        Some(other) => other.to_string(),
    }
}
