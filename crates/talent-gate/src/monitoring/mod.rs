//! Behavioural monitoring: activity ingestion, temporal heuristics, message gating and
//! user reports.

pub mod domain;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    FlagKind, FlagListener, FlagRepository, RaisedFlag, Severity, SuspiciousFlag,
};
pub use service::{
    ActivityMonitor, MessageDecision, MessageDisposition, MonitorConfig, MonitorError, ReportAck,
};
