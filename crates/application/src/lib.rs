//! Application services and ports.

#![forbid(unsafe_code)]

mod purge_ports;
mod purge_service;

pub use purge_ports::{AccessTokenProvider, PurgeGateway};
pub use purge_service::{PurgeOutcome, PurgeRunSummary, RetentionPurgeService};
