use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for employer accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmployerId(pub String);

/// Identifier wrapper for candidate accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub String);

impl fmt::Display for EmployerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique key of an access grant: one employer looking at one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantKey {
    pub employer_id: EmployerId,
    pub candidate_id: CandidateId,
}

impl GrantKey {
    pub fn new(employer_id: impl Into<String>, candidate_id: impl Into<String>) -> Self {
        Self {
            employer_id: EmployerId(employer_id.into()),
            candidate_id: CandidateId(candidate_id.into()),
        }
    }
}

impl fmt::Display for GrantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.employer_id, self.candidate_id)
    }
}

/// Disclosure tier, serialized as its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AccessLevel {
    Basic = 1,
    Professional = 2,
    Verified = 3,
    Contact = 4,
}

impl AccessLevel {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Basic,
            Self::Professional,
            Self::Verified,
            Self::Contact,
        ]
    }

    pub const fn number(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Professional => "professional",
            Self::Verified => "verified",
            Self::Contact => "contact",
        }
    }
}

impl TryFrom<u8> for AccessLevel {
    type Error = InvalidAccessLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Basic),
            2 => Ok(Self::Professional),
            3 => Ok(Self::Verified),
            4 => Ok(Self::Contact),
            other => Err(InvalidAccessLevel(other as i64)),
        }
    }
}

impl TryFrom<i64> for AccessLevel {
    type Error = InvalidAccessLevel;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| InvalidAccessLevel(value))
            .and_then(Self::try_from)
    }
}

impl From<AccessLevel> for u8 {
    fn from(level: AccessLevel) -> Self {
        level.number()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("access level must be between 1 and 4 (got {0})")]
pub struct InvalidAccessLevel(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    None,
    PerProfile,
    Subscription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentType {
    #[default]
    None,
    SuccessFee,
    Retainer,
    ExclusiveSearch,
}

/// Prerequisite an employer still has to satisfy before reaching a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    AgreementSigned,
    PaymentArranged,
    CommitmentSelected,
}

impl Requirement {
    pub const fn remediation(self) -> &'static str {
        match self {
            Self::AgreementSigned => "sign the platform non-circumvention agreement",
            Self::PaymentArranged => "purchase profile access or an active subscription",
            Self::CommitmentSelected => "choose a hiring commitment (success fee, retainer or exclusive search)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Restrictions {
    pub contact_blocked: bool,
    pub download_blocked: bool,
    pub external_sharing_blocked: bool,
}

impl Restrictions {
    /// The only way restrictions are ever derived.
    pub fn project(level: AccessLevel, suspicious_activity: bool) -> Self {
        Self {
            contact_blocked: level < AccessLevel::Contact || suspicious_activity,
            download_blocked: level < AccessLevel::Verified || suspicious_activity,
            external_sharing_blocked: level < AccessLevel::Contact || suspicious_activity,
        }
    }

    pub fn all_blocked(&self) -> bool {
        self.contact_blocked && self.download_blocked && self.external_sharing_blocked
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonitoringFlags {
    pub suspicious_activity: bool,
    pub external_contact_attempts: u32,
    pub last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantAction {
    Created,
    AgreementSigned,
    PaymentRecorded,
    CommitmentRecorded,
    LevelUpgraded,
    SuspiciousActivityFlagged,
    RestrictionsTightened,
    FirstContact,
}

/// Append-only audit row stored on the grant itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub level: AccessLevel,
    pub action: GrantAction,
    pub at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

/// Trust state one employer has earned for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub key: GrantKey,
    level: AccessLevel,
    pub payment_status: PaymentStatus,
    pub commitment_type: CommitmentType,
    restrictions: Restrictions,
    monitoring: MonitoringFlags,
    agreement_signed: bool,
    agreement_signed_at: Option<DateTime<Utc>>,
    first_contact_at: Option<DateTime<Utc>>,
    activity_history: Vec<HistoryEntry>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessGrant {
    pub fn new(key: GrantKey, at: DateTime<Utc>) -> Self {
        let mut grant = Self {
            key,
            level: AccessLevel::Basic,
            payment_status: PaymentStatus::None,
            commitment_type: CommitmentType::None,
            restrictions: Restrictions::project(AccessLevel::Basic, false),
            monitoring: MonitoringFlags::default(),
            agreement_signed: false,
            agreement_signed_at: None,
            first_contact_at: None,
            activity_history: Vec::new(),
            version: 0,
            created_at: at,
            updated_at: at,
        };
        grant.record(GrantAction::Created, at, BTreeMap::new());
        grant
    }

    pub fn level(&self) -> AccessLevel {
        self.level
    }

    pub fn restrictions(&self) -> Restrictions {
        self.restrictions
    }

    pub fn monitoring(&self) -> &MonitoringFlags {
        &self.monitoring
    }

    pub fn agreement_signed(&self) -> bool {
        self.agreement_signed
    }

    pub fn agreement_signed_at(&self) -> Option<DateTime<Utc>> {
        self.agreement_signed_at
    }

    pub fn first_contact_at(&self) -> Option<DateTime<Utc>> {
        self.first_contact_at
    }

    pub fn activity_history(&self) -> &[HistoryEntry] {
        &self.activity_history
    }

    /// Requirements still unmet for `target`, cumulative across the lower tiers.
    pub fn missing_requirements(&self, target: AccessLevel) -> Vec<Requirement> {
        let mut missing = Vec::new();
        if target >= AccessLevel::Professional && !self.agreement_signed {
            missing.push(Requirement::AgreementSigned);
        }
        if target >= AccessLevel::Verified && self.payment_status == PaymentStatus::None {
            missing.push(Requirement::PaymentArranged);
        }
        if target >= AccessLevel::Contact && self.commitment_type == CommitmentType::None {
            missing.push(Requirement::CommitmentSelected);
        }
        missing
    }

    pub(crate) fn record(
        &mut self,
        action: GrantAction,
        at: DateTime<Utc>,
        metadata: BTreeMap<String, String>,
    ) {
        self.activity_history.push(HistoryEntry {
            level: self.level,
            action,
            at,
            metadata,
        });
    }

    pub(crate) fn sign_agreement(&mut self, at: DateTime<Utc>) -> bool {
        if self.agreement_signed {
            return false;
        }
        self.agreement_signed = true;
        self.agreement_signed_at = Some(at);
        self.record(GrantAction::AgreementSigned, at, BTreeMap::new());
        true
    }

    pub(crate) fn set_payment_status(&mut self, status: PaymentStatus, at: DateTime<Utc>) {
        if status == self.payment_status || status == PaymentStatus::None {
            return;
        }
        self.payment_status = status;
        self.record(
            GrantAction::PaymentRecorded,
            at,
            BTreeMap::from([("payment_status".to_string(), format!("{status:?}"))]),
        );
    }

    pub(crate) fn set_commitment(&mut self, commitment: CommitmentType, at: DateTime<Utc>) {
        if commitment == self.commitment_type || commitment == CommitmentType::None {
            return;
        }
        self.commitment_type = commitment;
        self.record(
            GrantAction::CommitmentRecorded,
            at,
            BTreeMap::from([("commitment_type".to_string(), format!("{commitment:?}"))]),
        );
    }

    /// Levels only move up; a lower or equal target leaves the grant untouched.
    pub(crate) fn raise_level(&mut self, target: AccessLevel, at: DateTime<Utc>) -> bool {
        if target <= self.level {
            return false;
        }
        let from = self.level;
        self.level = target;
        self.record(
            GrantAction::LevelUpgraded,
            at,
            BTreeMap::from([("from".to_string(), from.number().to_string())]),
        );
        true
    }

    /// Every flag counts as an external contact attempt, whatever its kind.
    pub(crate) fn flag_suspicious(&mut self, at: DateTime<Utc>, metadata: BTreeMap<String, String>) {
        self.monitoring.suspicious_activity = true;
        self.monitoring.external_contact_attempts =
            self.monitoring.external_contact_attempts.saturating_add(1);
        self.record(GrantAction::SuspiciousActivityFlagged, at, metadata);
    }

    /// Mark the pair suspicious without counting another attempt. No-op when already set.
    pub(crate) fn tighten(&mut self, at: DateTime<Utc>, metadata: BTreeMap<String, String>) -> bool {
        if self.monitoring.suspicious_activity {
            return false;
        }
        self.monitoring.suspicious_activity = true;
        self.record(GrantAction::RestrictionsTightened, at, metadata);
        true
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        let latest = match self.monitoring.last_activity_at {
            Some(previous) if previous > at => previous,
            _ => at,
        };
        self.monitoring.last_activity_at = Some(latest);
    }

    pub(crate) fn mark_first_contact(&mut self, at: DateTime<Utc>) -> bool {
        if self.first_contact_at.is_some() {
            return false;
        }
        self.first_contact_at = Some(at);
        self.record(GrantAction::FirstContact, at, BTreeMap::new());
        true
    }

    pub(crate) fn reproject(&mut self) {
        self.restrictions = Restrictions::project(self.level, self.monitoring.suspicious_activity);
    }
}
