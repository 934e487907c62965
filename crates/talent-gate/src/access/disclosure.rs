use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    AccessLevel, CandidateId, CommitmentType, EmployerId, GrantKey, InvalidAccessLevel,
    PaymentStatus, Requirement, Restrictions,
};
use super::ledger::{AccessLedger, LedgerError};
use super::profile::{Profile, ProfileError, ProfileRepository};
use super::views::{stage_view, watermark_id, DisclosureConfig, StagedView};
use super::AccessGrant;
use crate::accounts::AccountDirectory;
use crate::activity::{ActivityAction, ActivityEvent, ActivitySink};
use crate::clock::Clock;
use crate::detection::PatternDetector;
use crate::store::RepositoryError;

/// What an employer may currently see of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedProfile {
    pub level: AccessLevel,
    pub view: StagedView,
    pub restrictions: Restrictions,
}

/// Result of checking an upgrade without performing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeCheck {
    pub current: AccessLevel,
    pub target: AccessLevel,
    pub missing: Vec<Requirement>,
}

impl UpgradeCheck {
    pub fn allowed(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DisclosureError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("upgrade requirements unmet: {}", describe_missing(.missing))]
    PermissionDenied { missing: Vec<Requirement> },
    #[error("employer account {0} is suspended")]
    AccountSuspended(EmployerId),
    #[error("no profile stored for candidate {0}")]
    ProfileNotFound(CandidateId),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<InvalidAccessLevel> for DisclosureError {
    fn from(value: InvalidAccessLevel) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<ProfileError> for DisclosureError {
    fn from(value: ProfileError) -> Self {
        Self::Validation(value.to_string())
    }
}

fn describe_missing(missing: &[Requirement]) -> String {
    missing
        .iter()
        .map(|requirement| requirement.remediation())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Staged profile reads and the upgrade state machine.
pub struct DisclosureService {
    ledger: Arc<AccessLedger>,
    profiles: Arc<dyn ProfileRepository>,
    accounts: Arc<dyn AccountDirectory>,
    activity: Arc<dyn ActivitySink>,
    detector: Arc<PatternDetector>,
    clock: Arc<dyn Clock>,
    config: DisclosureConfig,
}

impl DisclosureService {
    pub fn new(
        ledger: Arc<AccessLedger>,
        profiles: Arc<dyn ProfileRepository>,
        accounts: Arc<dyn AccountDirectory>,
        activity: Arc<dyn ActivitySink>,
        detector: Arc<PatternDetector>,
        clock: Arc<dyn Clock>,
        config: DisclosureConfig,
    ) -> Self {
        Self {
            ledger,
            profiles,
            accounts,
            activity,
            detector,
            clock,
            config,
        }
    }

    /// Load the candidate's profile and stage it for the employer.
    pub fn staged_profile(&self, key: &GrantKey) -> Result<StagedProfile, DisclosureError> {
        let profile = self
            .profiles
            .fetch(&key.candidate_id)?
            .ok_or_else(|| DisclosureError::ProfileNotFound(key.candidate_id.clone()))?;
        self.stage(key, &profile)
    }

    /// Stage an already loaded profile. A missing grant means level 1.
    pub fn stage(&self, key: &GrantKey, profile: &Profile) -> Result<StagedProfile, DisclosureError> {
        profile.validate()?;
        let candidate = profile
            .as_candidate()
            .ok_or_else(|| ProfileError::NotACandidate(key.candidate_id.to_string()))?;
        self.ensure_active(&key.employer_id)?;

        let grant = self.ledger.get_or_default(key)?;
        let now = self.clock.now();
        let restrictions = grant.restrictions();
        let view = stage_view(
            key,
            candidate,
            grant.level(),
            restrictions,
            &self.config,
            &self.detector,
            now.date_naive(),
        );

        let mut metadata = BTreeMap::from([(
            "level".to_string(),
            grant.level().number().to_string(),
        )]);
        if view.verified.as_ref().is_some_and(|verified| verified.video.is_some()) {
            metadata.insert("watermark_id".to_string(), watermark_id(key).to_string());
        }
        let action = if view.contact.is_some() {
            ActivityAction::ContactAccess
        } else {
            ActivityAction::ProfileView
        };
        self.activity
            .record(ActivityEvent::new(key, action, now, metadata));

        Ok(StagedProfile {
            level: grant.level(),
            view,
            restrictions,
        })
    }

    pub fn can_upgrade(&self, key: &GrantKey, target: i64) -> Result<UpgradeCheck, DisclosureError> {
        let target = AccessLevel::try_from(target)?;
        let grant = self.ledger.get_or_default(key)?;
        Ok(UpgradeCheck {
            current: grant.level(),
            target,
            missing: grant.missing_requirements(target),
        })
    }

    /// Raise the pair's level. The optional commitment is recorded in the same write; a
    /// target at or below the current level returns the current level unchanged.
    pub fn request_upgrade(
        &self,
        key: &GrantKey,
        target: i64,
        commitment: Option<CommitmentType>,
    ) -> Result<AccessLevel, DisclosureError> {
        let target_level = AccessLevel::try_from(target)?;
        if commitment == Some(CommitmentType::None) {
            return Err(DisclosureError::Validation(
                "commitment must name a concrete commitment type".to_string(),
            ));
        }
        self.ensure_active(&key.employer_id)?;

        let check = self.can_upgrade(key, target)?;
        if check.target <= check.current && commitment.is_none() {
            return Ok(check.current);
        }
        if commitment.is_none() && !check.allowed() {
            return Err(DisclosureError::PermissionDenied {
                missing: check.missing,
            });
        }

        let (grant, level) = self.ledger.update(key, |grant, now| {
            if let Some(commitment) = commitment {
                grant.set_commitment(commitment, now);
            }
            if target_level <= grant.level() {
                return Ok(grant.level());
            }
            let missing = grant.missing_requirements(target_level);
            if !missing.is_empty() {
                return Err(DisclosureError::PermissionDenied { missing });
            }
            grant.raise_level(target_level, now);
            Ok(target_level)
        })?;

        info!(
            employer_id = %key.employer_id,
            candidate_id = %key.candidate_id,
            level = level.number(),
            version = grant.version,
            "access level confirmed"
        );
        self.activity.record(ActivityEvent::new(
            key,
            ActivityAction::UpgradeRequest,
            grant.updated_at,
            BTreeMap::from([("target".to_string(), target_level.number().to_string())]),
        ));
        Ok(level)
    }

    pub fn sign_agreement(&self, key: &GrantKey) -> Result<AccessGrant, DisclosureError> {
        self.ensure_active(&key.employer_id)?;
        let (grant, _) = self.ledger.update(key, |grant, now| {
            grant.sign_agreement(now);
            Ok::<_, DisclosureError>(())
        })?;
        Ok(grant)
    }

    pub fn record_payment(
        &self,
        key: &GrantKey,
        status: PaymentStatus,
    ) -> Result<AccessGrant, DisclosureError> {
        if status == PaymentStatus::None {
            return Err(DisclosureError::Validation(
                "payment status must name a purchase".to_string(),
            ));
        }
        let (grant, _) = self.ledger.update(key, |grant, now| {
            grant.set_payment_status(status, now);
            Ok::<_, DisclosureError>(())
        })?;
        Ok(grant)
    }

    fn ensure_active(&self, employer_id: &EmployerId) -> Result<(), DisclosureError> {
        if self.accounts.is_suspended(employer_id)? {
            warn!(employer_id = %employer_id, "suspended employer refused");
            return Err(DisclosureError::AccountSuspended(employer_id.clone()));
        }
        Ok(())
    }
}
