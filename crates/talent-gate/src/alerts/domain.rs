use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{CandidateId, EmployerId};
use crate::monitoring::Severity;
use crate::store::RepositoryError;

/// Pending critical alerts older than this escalate on the next sweep.
pub const ESCALATION_AFTER_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Acknowledged,
    Resolved,
    Escalated,
}

impl AlertStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Escalated => "escalated",
        }
    }

    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Resolved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub rule_id: String,
    pub employer_id: Option<EmployerId>,
    pub candidate_id: Option<CandidateId>,
    pub severity: Severity,
    pub status: AlertStatus,
    pub title: String,
    pub detail: String,
    pub dedupe_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Alert {
    pub fn is_due_for_escalation(&self, now: DateTime<Utc>) -> bool {
        self.status == AlertStatus::Pending
            && self.severity == Severity::Critical
            && now - self.created_at > Duration::minutes(ESCALATION_AFTER_MINUTES)
    }
}

/// Append-only alert log; only the lifecycle fields of a stored alert change.
pub trait AlertRepository: Send + Sync {
    /// Fails with `Conflict` when an alert with the same rule and dedupe key exists.
    fn insert(&self, alert: Alert) -> Result<Alert, RepositoryError>;
    fn compare_and_set(&self, expected: u64, alert: Alert) -> Result<Alert, RepositoryError>;
    fn fetch(&self, id: &Uuid) -> Result<Option<Alert>, RepositoryError>;
    fn list(&self) -> Result<Vec<Alert>, RepositoryError>;
}

/// Content handed to the outbound notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub severity: Severity,
    pub subject: String,
    pub body: String,
    pub employer_id: Option<EmployerId>,
    pub candidate_id: Option<CandidateId>,
}

/// Email/SMS/dashboard delivery lives behind this hook.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
