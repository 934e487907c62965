use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::access::{CommitmentType, EmployerId, GrantKey, PaymentStatus};
use crate::accounts::AccountDirectory;
use crate::activity::{ActivityEvent, ActivityLog};
use crate::clock::ManualClock;
use crate::config::EngineConfig;
use crate::context::{EngineContext, EngineStores};
use crate::monitoring::{FlagKind, SuspiciousFlag};
use crate::store::memory::{
    InMemoryAccountDirectory, InMemoryActivityLog, InMemoryAlertRepository,
    InMemoryEnforcementRepository, InMemoryFlagRepository, InMemoryGrantRepository,
    InMemoryNotificationSink, InMemoryProfileRepository,
};
use crate::store::RepositoryError;

/// Monday morning, inside working hours.
pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap()
}

pub(super) fn key() -> GrantKey {
    GrantKey::new("emp-acme", "cand-priya")
}

pub(super) struct Harness {
    pub(super) clock: Arc<ManualClock>,
    pub(super) context: Arc<EngineContext>,
    pub(super) activity: InMemoryActivityLog,
    pub(super) flags: InMemoryFlagRepository,
    pub(super) alerts: InMemoryAlertRepository,
    pub(super) notifications: InMemoryNotificationSink,
}

impl Harness {
    pub(super) fn flags_of(&self, kind: FlagKind) -> Vec<SuspiciousFlag> {
        self.flags
            .flags()
            .into_iter()
            .filter(|flag| flag.kind == kind)
            .collect()
    }

    pub(super) fn is_suspended(&self, employer_id: &EmployerId) -> bool {
        self.context
            .accounts
            .is_suspended(employer_id)
            .expect("account lookup")
    }

    /// Walk the pair up to level 4 through the public upgrade path.
    pub(super) fn reach_contact(&self, key: &GrantKey) {
        let disclosure = &self.context.disclosure;
        disclosure.sign_agreement(key).expect("agreement signed");
        disclosure
            .record_payment(key, PaymentStatus::PerProfile)
            .expect("payment recorded");
        disclosure
            .request_upgrade(key, 4, Some(CommitmentType::Retainer))
            .expect("level 4");
    }
}

pub(super) fn harness() -> Harness {
    harness_with(EngineConfig::default(), None)
}

pub(super) fn harness_with(
    config: EngineConfig,
    activity_override: Option<Arc<dyn ActivityLog>>,
) -> Harness {
    let clock = Arc::new(ManualClock::new(start()));
    let activity = InMemoryActivityLog::default();
    let flags = InMemoryFlagRepository::default();
    let alerts = InMemoryAlertRepository::default();
    let notifications = InMemoryNotificationSink::default();
    let stores = EngineStores {
        grants: Arc::new(InMemoryGrantRepository::default()),
        profiles: Arc::new(InMemoryProfileRepository::default()),
        activity: activity_override.unwrap_or_else(|| Arc::new(activity.clone())),
        accounts: Arc::new(InMemoryAccountDirectory::default()),
        flags: Arc::new(flags.clone()),
        enforcement: Arc::new(InMemoryEnforcementRepository::default()),
        alerts: Arc::new(alerts.clone()),
        notifications: Arc::new(notifications.clone()),
    };
    let context = Arc::new(EngineContext::new(stores, clock.clone(), config));
    Harness {
        clock,
        context,
        activity,
        flags,
        alerts,
        notifications,
    }
}

/// Activity store that is down.
pub(super) struct UnavailableActivityLog;

impl ActivityLog for UnavailableActivityLog {
    fn append(&self, _event: ActivityEvent) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("activity store offline".to_string()))
    }

    fn for_pair_since(
        &self,
        _key: &GrantKey,
        _since: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, RepositoryError> {
        Err(RepositoryError::Unavailable("activity store offline".to_string()))
    }

    fn for_employer_since(
        &self,
        _employer_id: &EmployerId,
        _since: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, RepositoryError> {
        Err(RepositoryError::Unavailable("activity store offline".to_string()))
    }

    fn latest_for_pair(&self, _key: &GrantKey) -> Result<Option<ActivityEvent>, RepositoryError> {
        Err(RepositoryError::Unavailable("activity store offline".to_string()))
    }
}
