//! # sa-connectors
//!
//! Connectors for xMatters and Cisco Email Security.
//!
//! Each connector wraps an [`HttpClient`], implements [`Connector`] for
//! health checks and [`sa_core::IncidentSource`] for polling, and exposes
//! command functions that return [`sa_core::CommandResult`]s.

pub mod cisco;
pub mod http;
pub mod secure_string;
pub mod testing;
pub mod traits;
pub mod xmatters;

pub use http::{HttpClient, QueryParams, RateLimitConfig};
pub use secure_string::SecureString;
pub use traits::{
    AuthConfig, Connector, ConnectorCategory, ConnectorConfig, ConnectorError, ConnectorHealth,
    ConnectorResult,
};

pub use cisco::{CiscoEsaConfig, CiscoEsaConnector};
pub use xmatters::{XMattersConfig, XMattersConnector};
