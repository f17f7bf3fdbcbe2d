//! xMatters alerting connector.

mod client;
pub mod commands;

pub use client::{
    normalize_event, EventQuery, WorkflowTrigger, XMattersConfig, XMattersConnector,
    XMattersFetchFilter, DEFAULT_INCIDENT_NAME, INCIDENT_TYPE,
};
