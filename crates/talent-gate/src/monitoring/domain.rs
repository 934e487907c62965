use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{CandidateId, EmployerId, GrantKey};
use crate::store::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagKind {
    ExcessiveProfileViewing,
    SuddenInactivityAfterContactAccess,
    MessagePolicyViolation,
    MassCandidateAccess,
    OffHoursActivity,
    UserReport,
}

impl FlagKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::ExcessiveProfileViewing => "EXCESSIVE_PROFILE_VIEWING",
            Self::SuddenInactivityAfterContactAccess => "SUDDEN_INACTIVITY_AFTER_CONTACT_ACCESS",
            Self::MessagePolicyViolation => "MESSAGE_POLICY_VIOLATION",
            Self::MassCandidateAccess => "MASS_CANDIDATE_ACCESS",
            Self::OffHoursActivity => "OFF_HOURS_ACTIVITY",
            Self::UserReport => "USER_REPORT",
        }
    }
}

/// A recorded behavioural anomaly. Employer-wide flags carry no candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousFlag {
    pub id: Uuid,
    pub kind: FlagKind,
    pub severity: Severity,
    pub employer_id: EmployerId,
    pub candidate_id: Option<CandidateId>,
    pub detail: String,
    pub evidence: Vec<String>,
    pub raised_at: DateTime<Utc>,
}

impl SuspiciousFlag {
    pub fn for_pair(
        kind: FlagKind,
        severity: Severity,
        key: &GrantKey,
        detail: impl Into<String>,
        raised_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            employer_id: key.employer_id.clone(),
            candidate_id: Some(key.candidate_id.clone()),
            detail: detail.into(),
            evidence: Vec::new(),
            raised_at,
        }
    }

    pub fn for_employer(
        kind: FlagKind,
        severity: Severity,
        employer_id: &EmployerId,
        detail: impl Into<String>,
        raised_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            employer_id: employer_id.clone(),
            candidate_id: None,
            detail: detail.into(),
            evidence: Vec::new(),
            raised_at,
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn key(&self) -> Option<GrantKey> {
        self.candidate_id.as_ref().map(|candidate_id| GrantKey {
            employer_id: self.employer_id.clone(),
            candidate_id: candidate_id.clone(),
        })
    }
}

/// Append-only flag store.
pub trait FlagRepository: Send + Sync {
    fn insert(&self, flag: SuspiciousFlag) -> Result<(), RepositoryError>;
    fn since(&self, since: DateTime<Utc>) -> Result<Vec<SuspiciousFlag>, RepositoryError>;

    /// Most recent flag of `kind` for the employer, scoped to `candidate_id` when given.
    fn latest(
        &self,
        kind: FlagKind,
        employer_id: &EmployerId,
        candidate_id: Option<&CandidateId>,
    ) -> Result<Option<SuspiciousFlag>, RepositoryError>;
}

/// A freshly stored flag as seen by synchronous listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct RaisedFlag {
    pub flag: SuspiciousFlag,
    /// The message that produced the flag was withheld from the recipient.
    pub message_blocked: bool,
}

/// Synchronous hook invoked after a flag has been stored and applied.
pub trait FlagListener: Send + Sync {
    fn on_flag(&self, raised: &RaisedFlag);
}
