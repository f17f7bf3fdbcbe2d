//! Connector trait definitions.
//!
//! Every vendor connector implements [`Connector`] so the host can check
//! health and connectivity the same way for all of them.

use crate::secure_string::SecureString;
use async_trait::async_trait;
use sa_core::ArgError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur in connectors.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-success status with no more specific variant.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error(transparent)]
    InvalidArgument(#[from] ArgError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// HTTP status carried by the error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationFailed(_) => Some(401),
            Self::AuthorizationDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::RateLimited(_) => Some(429),
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Health status of a connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    Healthy,
    /// Reachable but not fully usable (e.g. rate limited).
    Degraded(String),
    Unhealthy(String),
}

/// Configuration shared by every connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name used in logs.
    pub name: String,
    /// Base URL for the API.
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Whether to verify TLS certificates.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Additional headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_verify_tls() -> bool {
    true
}

/// Authentication configuration.
///
/// Credential fields use `SecureString` so they are zeroized when dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    #[default]
    None,
    /// HTTP basic authentication.
    Basic {
        username: String,
        password: SecureString,
    },
    /// Session login that exchanges base64 encoded credentials for a JWT.
    ///
    /// The token is cached by the client and sent in `header_name` on
    /// every request.
    JwtLogin {
        username: String,
        password: SecureString,
        #[serde(default = "default_login_path")]
        login_path: String,
        #[serde(default = "default_jwt_header")]
        header_name: String,
    },
}

fn default_login_path() -> String {
    "/sma/api/v2.0/login".to_string()
}

fn default_jwt_header() -> String {
    "jwtToken".to_string()
}

impl AuthConfig {
    /// Basic auth from plain credentials.
    pub fn basic(username: impl Into<String>, password: impl Into<SecureString>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// JWT session login with the default path and header.
    pub fn jwt_login(username: impl Into<String>, password: impl Into<SecureString>) -> Self {
        Self::JwtLogin {
            username: username.into(),
            password: password.into(),
            login_path: default_login_path(),
            header_name: default_jwt_header(),
        }
    }

    /// Replaces the secrets with a placeholder for display.
    pub fn redacted(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Basic { username, .. } => Self::Basic {
                username: username.clone(),
                password: SecureString::from("[REDACTED]"),
            },
            Self::JwtLogin {
                username,
                login_path,
                header_name,
                ..
            } => Self::JwtLogin {
                username: username.clone(),
                password: SecureString::from("[REDACTED]"),
                login_path: login_path.clone(),
                header_name: header_name.clone(),
            },
        }
    }
}

/// Categories of connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorCategory {
    /// On-call alerting and notification services.
    Alerting,
    /// Email security appliances.
    Email,
}

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name.
    fn name(&self) -> &str;

    /// Returns the connector type (e.g. "alerting", "email").
    fn connector_type(&self) -> &str;

    fn category(&self) -> ConnectorCategory {
        match self.connector_type() {
            "email" => ConnectorCategory::Email,
            _ => ConnectorCategory::Alerting,
        }
    }

    /// Operations this connector provides.
    fn capabilities(&self) -> Vec<String> {
        vec!["health_check".to_string(), "test_connection".to_string()]
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth>;

    /// Tests the connection to the external system.
    async fn test_connection(&self) -> ConnectorResult<bool>;
}

/// Maps a health probe result the same way for every connector.
pub fn health_from_probe(result: ConnectorResult<()>) -> ConnectorHealth {
    match result {
        Ok(()) => ConnectorHealth::Healthy,
        Err(ConnectorError::AuthenticationFailed(_)) => {
            ConnectorHealth::Unhealthy("Authentication failed".to_string())
        }
        Err(ConnectorError::AuthorizationDenied(_)) => {
            ConnectorHealth::Unhealthy("Authorization denied - check permissions".to_string())
        }
        Err(ConnectorError::RateLimited(_)) => ConnectorHealth::Degraded("Rate limited".to_string()),
        Err(ConnectorError::ConnectionFailed(e)) => {
            ConnectorHealth::Unhealthy(format!("Connection failed: {}", e))
        }
        Err(e) => ConnectorHealth::Unhealthy(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status() {
        assert_eq!(ConnectorError::NotFound("x".into()).status(), Some(404));
        assert_eq!(
            ConnectorError::Http {
                status: 503,
                body: String::new()
            }
            .status(),
            Some(503)
        );
        assert_eq!(ConnectorError::Timeout("x".into()).status(), None);
    }

    #[test]
    fn test_http_error_message_includes_status() {
        let err = ConnectorError::Http {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: boom");
    }

    #[test]
    fn test_auth_config_deserialize_jwt_defaults() {
        let auth: AuthConfig =
            serde_json::from_str(r#"{"type":"jwt_login","username":"admin","password":"pw"}"#)
                .unwrap();
        match auth {
            AuthConfig::JwtLogin {
                username,
                password,
                login_path,
                header_name,
            } => {
                assert_eq!(username, "admin");
                assert_eq!(password.expose_secret(), "pw");
                assert_eq!(login_path, "/sma/api/v2.0/login");
                assert_eq!(header_name, "jwtToken");
            }
            other => panic!("unexpected auth config: {:?}", other),
        }
    }

    #[test]
    fn test_auth_config_redacted() {
        let auth = AuthConfig::basic("ops", "hunter2");
        let json = serde_json::to_string(&auth.redacted()).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("[REDACTED]"));
    }

    #[test]
    fn test_connector_config_defaults() {
        let config: ConnectorConfig =
            serde_json::from_str(r#"{"name":"xm","base_url":"https://example.com"}"#).unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert!(config.verify_tls);
        assert!(matches!(config.auth, AuthConfig::None));
    }

    #[test]
    fn test_health_from_probe() {
        assert_eq!(health_from_probe(Ok(())), ConnectorHealth::Healthy);
        assert_eq!(
            health_from_probe(Err(ConnectorError::RateLimited(30))),
            ConnectorHealth::Degraded("Rate limited".to_string())
        );
        assert!(matches!(
            health_from_probe(Err(ConnectorError::AuthenticationFailed("x".into()))),
            ConnectorHealth::Unhealthy(_)
        ));
    }
}
