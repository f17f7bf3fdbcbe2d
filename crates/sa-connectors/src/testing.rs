//! Helpers for connector tests.

use crate::cisco::CiscoEsaConfig;
use crate::traits::{AuthConfig, ConnectorConfig, ConnectorHealth, ConnectorResult};
use crate::xmatters::XMattersConfig;
use std::collections::HashMap;

/// Creates a connector config with no authentication.
pub fn test_connector_config(name: &str, base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        auth: AuthConfig::None,
        timeout_secs: 5,
        verify_tls: true,
        headers: HashMap::new(),
    }
}

/// xMatters config whose webhook and instance both point at `base_url`.
pub fn test_xmatters_config(base_url: &str) -> XMattersConfig {
    let mut connector = test_connector_config("xmatters-test", &format!("{}/trigger", base_url));
    connector.auth = AuthConfig::basic("svc-soar", "xm-password");
    XMattersConfig {
        connector,
        instance: base_url.to_string(),
        fetch: Default::default(),
        first_fetch: Default::default(),
        severity_policy: Default::default(),
    }
}

/// Cisco config with JWT login against `base_url`.
pub fn test_cisco_config(base_url: &str) -> CiscoEsaConfig {
    let mut connector = test_connector_config("cisco-test", base_url);
    connector.auth = AuthConfig::jwt_login("admin", "ironport");
    CiscoEsaConfig {
        connector,
        max_fetch: 50,
        first_fetch: Default::default(),
        rate_limit_per_minute: 0,
    }
}

/// Asserts that a connector health check returns healthy.
pub fn assert_healthy(result: &ConnectorResult<ConnectorHealth>) {
    match result {
        Ok(ConnectorHealth::Healthy) => {}
        other => panic!("Expected Healthy, got {:?}", other),
    }
}

/// Asserts that a connector health check returns unhealthy.
pub fn assert_unhealthy(result: &ConnectorResult<ConnectorHealth>) {
    match result {
        Ok(ConnectorHealth::Unhealthy(_)) => {}
        other => panic!("Expected Unhealthy, got {:?}", other),
    }
}
