//! Cisco Email Security (SMA) connector.
//!
//! Message tracking, spam quarantine, safelist/blocklist management and
//! reporting over the appliance's `/sma/api/v2.0` API. The connector logs
//! in once and reuses the returned JWT until the appliance rejects it.

mod client;
pub mod commands;
pub mod params;

pub use client::{normalize_quarantine_message, CiscoEsaConfig, CiscoEsaConnector, INCIDENT_TYPE};
pub use params::{ListType, QuarantineAction, ViewBy};
