//! Rule-driven alerting: immediate evaluation of raised flags, scheduled sweeps over
//! aggregate state, and the alert lifecycle.

pub mod domain;
pub mod engine;
pub mod rules;

#[cfg(test)]
mod tests;

pub use domain::{
    Alert, AlertRepository, AlertStatus, Notification, NotificationSink, NotifyError,
    ESCALATION_AFTER_MINUTES,
};
pub use engine::{AlertEngine, AlertError, RuleFailure, SweepReport};
pub use rules::{default_rules, AlertRule, Condition, Finding, RuleAction, RuleInput, Snapshot, Trigger};
