//! Command argument validation helpers.

use thiserror::Error;

/// Errors raised while validating command arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("Missing \"{0}\"")]
    Missing(String),

    #[error("Invalid date: \"{0}\"")]
    InvalidDate(String),

    #[error("Invalid value for \"{name}\": {reason}")]
    InvalidValue { name: String, reason: String },
}

impl ArgError {
    /// Creates an invalid value error.
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Returns the argument or a `Missing` error.
pub fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ArgError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ArgError::Missing(name.to_string()))
}

/// Treats empty strings as absent.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Splits a comma separated argument into trimmed, non-empty items.
pub fn arg_to_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses an optional non-negative integer argument.
pub fn parse_count(value: Option<&str>, name: &str) -> Result<Option<u32>, ArgError> {
    match non_empty(value) {
        None => Ok(None),
        Some(v) => v
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ArgError::invalid(name, format!("expected a non-negative integer, got '{}'", v))),
    }
}

/// Parses a page size, defaulting to and capped at `max`.
pub fn clamp_limit(value: Option<&str>, max: u32) -> Result<u32, ArgError> {
    Ok(match parse_count(value, "limit")? {
        Some(limit) if limit > 0 && limit <= max => limit,
        _ => max,
    })
}
