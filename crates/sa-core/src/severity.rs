//! Incident severity and the vendor vocabulary mapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Platform incident severity.
///
/// Serialized as its ordinal, which is what the case platform expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

/// A vendor severity that has no mapping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown severity: {0}")]
pub struct UnknownSeverity(pub String);

impl Severity {
    /// Returns the ordinal used by the case platform.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    /// Looks up a vendor severity, ignoring case.
    pub fn from_vendor(value: &str) -> Result<Self, UnknownSeverity> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(UnknownSeverity(value.to_string())),
        }
    }

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            4 => Ok(Self::Critical),
            other => Err(serde::de::Error::custom(format!(
                "severity ordinal out of range: {}",
                other
            ))),
        }
    }
}

/// What to do with vendor severities that have no mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "severity", rename_all = "snake_case")]
pub enum SeverityPolicy {
    /// Reject the record.
    #[default]
    Strict,
    /// Use the given severity.
    Fallback(FallbackSeverity),
}

/// Severities a fallback may name, in config vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackSeverity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl From<FallbackSeverity> for Severity {
    fn from(value: FallbackSeverity) -> Self {
        match value {
            FallbackSeverity::Unknown => Severity::Unknown,
            FallbackSeverity::Low => Severity::Low,
            FallbackSeverity::Medium => Severity::Medium,
            FallbackSeverity::High => Severity::High,
            FallbackSeverity::Critical => Severity::Critical,
        }
    }
}

impl SeverityPolicy {
    /// Maps a vendor severity under this policy.
    pub fn map(&self, value: &str) -> Result<Severity, UnknownSeverity> {
        match (Severity::from_vendor(value), self) {
            (Ok(severity), _) => Ok(severity),
            (Err(e), Self::Strict) => Err(e),
            (Err(_), Self::Fallback(fallback)) => Ok((*fallback).into()),
        }
    }
}
