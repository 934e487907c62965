use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{CandidateId, EmployerId, GrantKey};
use crate::store::RepositoryError;

/// Length of the exclusive period that follows a pair's first contact.
pub const EXCLUSIVE_PERIOD_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationKind {
    SuccessFee,
    BypassPenalty,
    LiquidatedDamages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    Pending,
    Paid,
    Overdue,
    Disputed,
    Waived,
    Refunded,
}

impl ObligationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Disputed => "disputed",
            Self::Waived => "waived",
            Self::Refunded => "refunded",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Waived | Self::Refunded)
    }

    pub const fn is_collectable(self) -> bool {
        matches!(self, Self::Pending | Self::Overdue)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use ObligationStatus::*;
        matches!(
            (self, next),
            (Pending, Paid | Overdue | Disputed | Waived | Refunded)
                | (Overdue, Paid | Disputed | Waived)
                | (Disputed, Paid | Waived)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeStage {
    Reminder,
    Demand,
    LegalAction,
}

impl NoticeStage {
    pub const fn ordered() -> [Self; 3] {
        [Self::Reminder, Self::Demand, Self::LegalAction]
    }

    pub const fn days_overdue(self) -> i64 {
        match self {
            Self::Reminder => 7,
            Self::Demand => 14,
            Self::LegalAction => 30,
        }
    }

    /// Highest stage reached after `days` overdue.
    pub fn reached(days: i64) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .rev()
            .find(|stage| days >= stage.days_overdue())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalNotice {
    pub stage: NoticeStage,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub at: DateTime<Utc>,
    pub description: String,
}

/// Monetary obligation owed by an employer. Amounts are in pence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementRecord {
    pub id: Uuid,
    pub employer_id: EmployerId,
    pub candidate_id: CandidateId,
    pub kind: ObligationKind,
    pub rate_percent: Option<u8>,
    pub amount_pence: u64,
    pub due_date: DateTime<Utc>,
    pub status: ObligationStatus,
    first_contact_at: DateTime<Utc>,
    exclusive_period_end: DateTime<Utc>,
    /// Set on the penalty raised for an off-platform hire, as opposed to a lesser violation.
    pub confirmed_hire: bool,
    pub evidence: Vec<Evidence>,
    pub notices: Vec<LegalNotice>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnforcementRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: &GrantKey,
        kind: ObligationKind,
        rate_percent: Option<u8>,
        amount_pence: u64,
        first_contact_at: DateTime<Utc>,
        due_date: DateTime<Utc>,
        created_at: DateTime<Utc>,
        evidence: Vec<Evidence>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            employer_id: key.employer_id.clone(),
            candidate_id: key.candidate_id.clone(),
            kind,
            rate_percent,
            amount_pence,
            due_date,
            status: ObligationStatus::Pending,
            first_contact_at,
            exclusive_period_end: exclusive_period_end(first_contact_at),
            confirmed_hire: false,
            evidence,
            notices: Vec::new(),
            version: 0,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn for_confirmed_hire(mut self) -> Self {
        self.confirmed_hire = true;
        self
    }

    pub fn first_contact_at(&self) -> DateTime<Utc> {
        self.first_contact_at
    }

    pub fn exclusive_period_end(&self) -> DateTime<Utc> {
        self.exclusive_period_end
    }

    pub fn key(&self) -> GrantKey {
        GrantKey {
            employer_id: self.employer_id.clone(),
            candidate_id: self.candidate_id.clone(),
        }
    }

    pub fn last_notice(&self) -> Option<NoticeStage> {
        self.notices.iter().map(|notice| notice.stage).max()
    }
}

pub fn exclusive_period_end(first_contact_at: DateTime<Utc>) -> DateTime<Utc> {
    first_contact_at + Duration::days(EXCLUSIVE_PERIOD_DAYS)
}

/// Storage for obligations, indexed by employer/status and due date/status.
pub trait EnforcementRepository: Send + Sync {
    fn insert(&self, record: EnforcementRecord) -> Result<EnforcementRecord, RepositoryError>;
    fn compare_and_set(
        &self,
        expected: u64,
        record: EnforcementRecord,
    ) -> Result<EnforcementRecord, RepositoryError>;
    fn fetch(&self, id: &Uuid) -> Result<Option<EnforcementRecord>, RepositoryError>;
    fn for_pair(&self, key: &GrantKey) -> Result<Vec<EnforcementRecord>, RepositoryError>;
    fn by_employer_status(
        &self,
        employer_id: &EmployerId,
        status: ObligationStatus,
    ) -> Result<Vec<EnforcementRecord>, RepositoryError>;
    fn due_before(
        &self,
        at: DateTime<Utc>,
        statuses: &[ObligationStatus],
    ) -> Result<Vec<EnforcementRecord>, RepositoryError>;
    fn list(&self) -> Result<Vec<EnforcementRecord>, RepositoryError>;
}
