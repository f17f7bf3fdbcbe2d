//! Configuration loading for the adapters CLI.

use anyhow::{Context, Result};
use sa_connectors::{AuthConfig, CiscoEsaConfig, SecureString, XMattersConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xmatters: Option<XMattersConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cisco: Option<CiscoEsaConfig>,

    /// Directory holding the last-run state files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Logging settings from the config file. `--verbose` overrides the level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file and applies `SA_*` overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Replaces credentials with values from `lookup`.
    ///
    /// Recognized keys are `SA_XMATTERS_USERNAME`, `SA_XMATTERS_PASSWORD`,
    /// `SA_CISCO_USERNAME` and `SA_CISCO_PASSWORD`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(xmatters) = self.xmatters.as_mut() {
            override_credentials(
                &mut xmatters.connector.auth,
                lookup("SA_XMATTERS_USERNAME"),
                lookup("SA_XMATTERS_PASSWORD"),
                |username, password| AuthConfig::basic(username, password),
            );
        }
        if let Some(cisco) = self.cisco.as_mut() {
            override_credentials(
                &mut cisco.connector.auth,
                lookup("SA_CISCO_USERNAME"),
                lookup("SA_CISCO_PASSWORD"),
                |username, password| AuthConfig::jwt_login(username, password),
            );
        }
    }

    /// Creates a copy with secrets redacted.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        if let Some(xmatters) = config.xmatters.as_mut() {
            xmatters.connector.auth = xmatters.connector.auth.redacted();
        }
        if let Some(cisco) = config.cisco.as_mut() {
            cisco.connector.auth = cisco.connector.auth.redacted();
        }
        config
    }

    pub fn xmatters(&self) -> Result<&XMattersConfig> {
        self.xmatters
            .as_ref()
            .context("No xmatters section in the configuration")
    }

    pub fn cisco(&self) -> Result<&CiscoEsaConfig> {
        self.cisco
            .as_ref()
            .context("No cisco section in the configuration")
    }
}

fn override_credentials(
    auth: &mut AuthConfig,
    username: Option<String>,
    password: Option<String>,
    build: fn(String, SecureString) -> AuthConfig,
) {
    match auth {
        AuthConfig::Basic {
            username: current_user,
            password: current_password,
        }
        | AuthConfig::JwtLogin {
            username: current_user,
            password: current_password,
            ..
        } => {
            if let Some(username) = username {
                *current_user = username;
            }
            if let Some(password) = password {
                *current_password = SecureString::new(password);
            }
        }
        AuthConfig::None => {
            if let (Some(username), Some(password)) = (username, password) {
                *auth = build(username, SecureString::new(password));
            }
        }
    }
}
