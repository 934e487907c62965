//! Process-local stores used by the demo service and the test suites.
//!
//! Each store holds one mutex over its map, so a compare-and-set is a single critical
//! section and per-key atomicity holds without any global coordination.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::RepositoryError;
use crate::access::{
    AccessGrant, CandidateId, EmployerId, GrantKey, GrantRepository, Profile, ProfileRepository,
};
use crate::accounts::{AccountDirectory, Suspension};
use crate::activity::{ActivityEvent, ActivityLog};
use crate::alerts::{Alert, AlertRepository, Notification, NotificationSink, NotifyError};
use crate::enforcement::{EnforcementRecord, EnforcementRepository, ObligationStatus};
use crate::monitoring::{FlagKind, FlagRepository, SuspiciousFlag};

fn next_version(expected: Option<u64>) -> u64 {
    expected.map_or(1, |version| version + 1)
}

#[derive(Default, Clone)]
pub struct InMemoryGrantRepository {
    grants: Arc<Mutex<HashMap<GrantKey, AccessGrant>>>,
}

impl GrantRepository for InMemoryGrantRepository {
    fn fetch(&self, key: &GrantKey) -> Result<Option<AccessGrant>, RepositoryError> {
        let guard = self.grants.lock().expect("grant mutex poisoned");
        Ok(guard.get(key).cloned())
    }

    fn compare_and_set(
        &self,
        expected: Option<u64>,
        mut grant: AccessGrant,
    ) -> Result<AccessGrant, RepositoryError> {
        let mut guard = self.grants.lock().expect("grant mutex poisoned");
        let actual = guard.get(&grant.key).map(|stored| stored.version);
        if actual != expected {
            return Err(RepositoryError::VersionMismatch { expected, actual });
        }
        grant.version = next_version(expected);
        guard.insert(grant.key.clone(), grant.clone());
        Ok(grant)
    }

    fn list(&self) -> Result<Vec<AccessGrant>, RepositoryError> {
        let guard = self.grants.lock().expect("grant mutex poisoned");
        let mut grants: Vec<AccessGrant> = guard.values().cloned().collect();
        grants.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(grants)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryActivityLog {
    events: Arc<Mutex<Vec<ActivityEvent>>>,
}

impl InMemoryActivityLog {
    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().expect("activity mutex poisoned").clone()
    }
}

impl ActivityLog for InMemoryActivityLog {
    fn append(&self, event: ActivityEvent) -> Result<(), RepositoryError> {
        self.events
            .lock()
            .expect("activity mutex poisoned")
            .push(event);
        Ok(())
    }

    fn for_pair_since(
        &self,
        key: &GrantKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, RepositoryError> {
        let guard = self.events.lock().expect("activity mutex poisoned");
        Ok(guard
            .iter()
            .filter(|event| {
                event.actor == key.employer_id
                    && event.subject == key.candidate_id
                    && event.at >= since
            })
            .cloned()
            .collect())
    }

    fn for_employer_since(
        &self,
        employer_id: &EmployerId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, RepositoryError> {
        let guard = self.events.lock().expect("activity mutex poisoned");
        Ok(guard
            .iter()
            .filter(|event| &event.actor == employer_id && event.at >= since)
            .cloned()
            .collect())
    }

    fn latest_for_pair(&self, key: &GrantKey) -> Result<Option<ActivityEvent>, RepositoryError> {
        let guard = self.events.lock().expect("activity mutex poisoned");
        Ok(guard
            .iter()
            .filter(|event| event.actor == key.employer_id && event.subject == key.candidate_id)
            .max_by_key(|event| event.at)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryProfileRepository {
    profiles: Arc<Mutex<HashMap<CandidateId, Profile>>>,
}

impl ProfileRepository for InMemoryProfileRepository {
    fn fetch(&self, candidate_id: &CandidateId) -> Result<Option<Profile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard.get(candidate_id).cloned())
    }

    fn upsert(&self, profile: Profile) -> Result<(), RepositoryError> {
        let id = match &profile {
            Profile::Candidate(candidate) => candidate.candidate_id.clone(),
            Profile::Employer(employer) => CandidateId(employer.employer_id.0.clone()),
        };
        self.profiles
            .lock()
            .expect("profile mutex poisoned")
            .insert(id, profile);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAccountDirectory {
    suspensions: Arc<Mutex<HashMap<EmployerId, Suspension>>>,
}

impl AccountDirectory for InMemoryAccountDirectory {
    fn suspension(&self, employer_id: &EmployerId) -> Result<Option<Suspension>, RepositoryError> {
        let guard = self.suspensions.lock().expect("account mutex poisoned");
        Ok(guard.get(employer_id).cloned())
    }

    fn suspend(
        &self,
        employer_id: &EmployerId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Suspension, RepositoryError> {
        let mut guard = self.suspensions.lock().expect("account mutex poisoned");
        let suspension = guard
            .entry(employer_id.clone())
            .or_insert_with(|| Suspension {
                employer_id: employer_id.clone(),
                reason: reason.to_string(),
                suspended_at: at,
            });
        Ok(suspension.clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryFlagRepository {
    flags: Arc<Mutex<Vec<SuspiciousFlag>>>,
}

impl InMemoryFlagRepository {
    pub fn flags(&self) -> Vec<SuspiciousFlag> {
        self.flags.lock().expect("flag mutex poisoned").clone()
    }
}

impl FlagRepository for InMemoryFlagRepository {
    fn insert(&self, flag: SuspiciousFlag) -> Result<(), RepositoryError> {
        self.flags.lock().expect("flag mutex poisoned").push(flag);
        Ok(())
    }

    fn since(&self, since: DateTime<Utc>) -> Result<Vec<SuspiciousFlag>, RepositoryError> {
        let guard = self.flags.lock().expect("flag mutex poisoned");
        Ok(guard
            .iter()
            .filter(|flag| flag.raised_at >= since)
            .cloned()
            .collect())
    }

    fn latest(
        &self,
        kind: FlagKind,
        employer_id: &EmployerId,
        candidate_id: Option<&CandidateId>,
    ) -> Result<Option<SuspiciousFlag>, RepositoryError> {
        let guard = self.flags.lock().expect("flag mutex poisoned");
        Ok(guard
            .iter()
            .filter(|flag| {
                flag.kind == kind
                    && &flag.employer_id == employer_id
                    && candidate_id.map_or(true, |id| flag.candidate_id.as_ref() == Some(id))
            })
            .max_by_key(|flag| flag.raised_at)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryEnforcementRepository {
    records: Arc<Mutex<HashMap<Uuid, EnforcementRecord>>>,
}

impl InMemoryEnforcementRepository {
    fn filtered(&self, keep: impl Fn(&EnforcementRecord) -> bool) -> Vec<EnforcementRecord> {
        let guard = self.records.lock().expect("enforcement mutex poisoned");
        let mut records: Vec<EnforcementRecord> =
            guard.values().filter(|record| keep(record)).cloned().collect();
        records.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        records
    }
}

impl EnforcementRepository for InMemoryEnforcementRepository {
    fn insert(&self, mut record: EnforcementRecord) -> Result<EnforcementRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("enforcement mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        record.version = 1;
        guard.insert(record.id, record.clone());
        Ok(record)
    }

    fn compare_and_set(
        &self,
        expected: u64,
        mut record: EnforcementRecord,
    ) -> Result<EnforcementRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("enforcement mutex poisoned");
        let actual = guard.get(&record.id).map(|stored| stored.version);
        if actual != Some(expected) {
            return Err(RepositoryError::VersionMismatch {
                expected: Some(expected),
                actual,
            });
        }
        record.version = expected + 1;
        guard.insert(record.id, record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &Uuid) -> Result<Option<EnforcementRecord>, RepositoryError> {
        let guard = self.records.lock().expect("enforcement mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_pair(&self, key: &GrantKey) -> Result<Vec<EnforcementRecord>, RepositoryError> {
        Ok(self.filtered(|record| {
            record.employer_id == key.employer_id && record.candidate_id == key.candidate_id
        }))
    }

    fn by_employer_status(
        &self,
        employer_id: &EmployerId,
        status: ObligationStatus,
    ) -> Result<Vec<EnforcementRecord>, RepositoryError> {
        Ok(self.filtered(|record| &record.employer_id == employer_id && record.status == status))
    }

    fn due_before(
        &self,
        at: DateTime<Utc>,
        statuses: &[ObligationStatus],
    ) -> Result<Vec<EnforcementRecord>, RepositoryError> {
        Ok(self.filtered(|record| record.due_date < at && statuses.contains(&record.status)))
    }

    fn list(&self) -> Result<Vec<EnforcementRecord>, RepositoryError> {
        Ok(self.filtered(|_| true))
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAlertRepository {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl AlertRepository for InMemoryAlertRepository {
    fn insert(&self, mut alert: Alert) -> Result<Alert, RepositoryError> {
        let mut guard = self.alerts.lock().expect("alert mutex poisoned");
        if guard
            .iter()
            .any(|stored| stored.rule_id == alert.rule_id && stored.dedupe_key == alert.dedupe_key)
        {
            return Err(RepositoryError::Conflict);
        }
        alert.version = 1;
        guard.push(alert.clone());
        Ok(alert)
    }

    fn compare_and_set(&self, expected: u64, mut alert: Alert) -> Result<Alert, RepositoryError> {
        let mut guard = self.alerts.lock().expect("alert mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|stored| stored.id == alert.id)
            .ok_or(RepositoryError::NotFound)?;
        if slot.version != expected {
            return Err(RepositoryError::VersionMismatch {
                expected: Some(expected),
                actual: Some(slot.version),
            });
        }
        alert.version = expected + 1;
        *slot = alert.clone();
        Ok(alert)
    }

    fn fetch(&self, id: &Uuid) -> Result<Option<Alert>, RepositoryError> {
        let guard = self.alerts.lock().expect("alert mutex poisoned");
        Ok(guard.iter().find(|alert| &alert.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<Alert>, RepositoryError> {
        Ok(self.alerts.lock().expect("alert mutex poisoned").clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryNotificationSink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}
