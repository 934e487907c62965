use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::domain::{
    exclusive_period_end, EnforcementRecord, EnforcementRepository, Evidence, LegalNotice,
    NoticeStage, ObligationKind, ObligationStatus,
};
use crate::access::{AccessLedger, CandidateId, EmployerId, GrantKey, LedgerError};
use crate::clock::Clock;
use crate::store::RepositoryError;

const MAX_WRITE_ATTEMPTS: usize = 8;

/// Amounts and terms applied when obligations are raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementConfig {
    pub success_fee_percent: u8,
    pub bypass_penalty_pence: u64,
    pub confirmed_hire_penalty_pence: u64,
    pub payment_terms_days: i64,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            success_fee_percent: 15,
            bypass_penalty_pence: 250_000,
            confirmed_hire_penalty_pence: 1_000_000,
            payment_terms_days: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnforcementError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("cannot move obligation {id} from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        id: Uuid,
        from: ObligationStatus,
        to: ObligationStatus,
    },
    #[error("no obligation with id {0}")]
    NotFound(Uuid),
    #[error("gave up updating obligation {id} after {attempts} conflicting writes")]
    Contention { id: Uuid, attempts: usize },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What a confirmed hire produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HireOutcome {
    /// The hire fell inside the pair's exclusive period.
    pub billable: bool,
    pub records: Vec<EnforcementRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedNotice {
    pub record_id: Uuid,
    pub employer_id: EmployerId,
    pub candidate_id: CandidateId,
    pub stage: NoticeStage,
    pub amount_pence: u64,
    pub sent_at: DateTime<Utc>,
}

/// Creates and moves obligations. Every write is a versioned compare-and-set.
pub struct EnforcementLedger {
    repository: Arc<dyn EnforcementRepository>,
    grants: Arc<AccessLedger>,
    clock: Arc<dyn Clock>,
    config: EnforcementConfig,
}

impl EnforcementLedger {
    pub fn new(
        repository: Arc<dyn EnforcementRepository>,
        grants: Arc<AccessLedger>,
        clock: Arc<dyn Clock>,
        config: EnforcementConfig,
    ) -> Self {
        Self {
            repository,
            grants,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &EnforcementConfig {
        &self.config
    }

    pub fn get(&self, id: &Uuid) -> Result<EnforcementRecord, EnforcementError> {
        self.repository
            .fetch(id)?
            .ok_or(EnforcementError::NotFound(*id))
    }

    pub fn records(&self) -> Result<Vec<EnforcementRecord>, EnforcementError> {
        Ok(self.repository.list()?)
    }

    pub fn for_pair(&self, key: &GrantKey) -> Result<Vec<EnforcementRecord>, EnforcementError> {
        Ok(self.repository.for_pair(key)?)
    }

    /// Bill a hire. Inside the exclusive period a success fee is owed; an off-platform hire
    /// additionally carries the confirmed-hire penalty. Calling again returns what exists.
    pub fn record_hire(
        &self,
        key: &GrantKey,
        annual_salary_pence: u64,
        hired_at: DateTime<Utc>,
        via_platform: bool,
    ) -> Result<HireOutcome, EnforcementError> {
        if annual_salary_pence == 0 {
            return Err(EnforcementError::Validation(
                "annual salary must be positive".to_string(),
            ));
        }

        let existing = self.repository.for_pair(key)?;
        let grant_contact = self.grants.get(key)?.and_then(|grant| grant.first_contact_at());
        // A blocked attempt opens the window through its penalty record even though no
        // message was ever delivered.
        let first_contact = existing
            .iter()
            .map(EnforcementRecord::first_contact_at)
            .chain(grant_contact)
            .min();
        let Some(first_contact) = first_contact else {
            debug!(
                employer_id = %key.employer_id,
                candidate_id = %key.candidate_id,
                "hire without prior contact is not billable"
            );
            return Ok(HireOutcome {
                billable: false,
                records: Vec::new(),
            });
        };
        if hired_at < first_contact || hired_at >= exclusive_period_end(first_contact) {
            return Ok(HireOutcome {
                billable: false,
                records: Vec::new(),
            });
        }

        let now = self.clock.now();
        let mut records = Vec::new();

        let fee = match existing
            .iter()
            .find(|record| record.kind == ObligationKind::SuccessFee)
        {
            Some(fee) => fee.clone(),
            None => {
                let amount = annual_salary_pence
                    .saturating_mul(u64::from(self.config.success_fee_percent))
                    / 100;
                let record = EnforcementRecord::new(
                    key,
                    ObligationKind::SuccessFee,
                    Some(self.config.success_fee_percent),
                    amount,
                    first_contact,
                    self.due_date(now),
                    now,
                    vec![Evidence {
                        at: hired_at,
                        description: format!(
                            "hire confirmed at {} pence annual salary",
                            annual_salary_pence
                        ),
                    }],
                );
                let stored = self.repository.insert(record)?;
                info!(
                    employer_id = %key.employer_id,
                    candidate_id = %key.candidate_id,
                    amount_pence = stored.amount_pence,
                    "success fee raised"
                );
                stored
            }
        };
        records.push(fee);

        if !via_platform {
            let penalty = match existing.iter().find(|record| {
                record.kind == ObligationKind::BypassPenalty && record.confirmed_hire
            }) {
                Some(penalty) => penalty.clone(),
                None => {
                    let record = EnforcementRecord::new(
                        key,
                        ObligationKind::BypassPenalty,
                        None,
                        self.config.confirmed_hire_penalty_pence,
                        first_contact,
                        self.due_date(now),
                        now,
                        vec![Evidence {
                            at: hired_at,
                            description: "hire completed outside the platform".to_string(),
                        }],
                    )
                    .for_confirmed_hire();
                    let stored = self.repository.insert(record)?;
                    warn!(
                        employer_id = %key.employer_id,
                        candidate_id = %key.candidate_id,
                        amount_pence = stored.amount_pence,
                        "off-platform hire penalised"
                    );
                    stored
                }
            };
            records.push(penalty);
        }

        Ok(HireOutcome {
            billable: true,
            records,
        })
    }

    /// Penalise a detected bypass attempt. An open penalty for the pair absorbs the new
    /// evidence instead of a second record being raised.
    pub fn record_bypass_attempt(
        &self,
        key: &GrantKey,
        first_contact_at: DateTime<Utc>,
        evidence: Vec<String>,
    ) -> Result<EnforcementRecord, EnforcementError> {
        let now = self.clock.now();
        let entries: Vec<Evidence> = evidence
            .into_iter()
            .map(|description| Evidence {
                at: now,
                description,
            })
            .collect();

        let open = self.repository.for_pair(key)?.into_iter().find(|record| {
            record.kind == ObligationKind::BypassPenalty
                && record.status == ObligationStatus::Pending
                && !record.confirmed_hire
        });

        match open {
            Some(record) => {
                let (stored, _) = self.modify(&record.id, |record, _| {
                    record.evidence.extend(entries.iter().cloned());
                    Ok(())
                })?;
                Ok(stored)
            }
            None => {
                let record = EnforcementRecord::new(
                    key,
                    ObligationKind::BypassPenalty,
                    None,
                    self.config.bypass_penalty_pence,
                    first_contact_at,
                    self.due_date(now),
                    now,
                    entries,
                );
                let stored = self.repository.insert(record)?;
                warn!(
                    employer_id = %key.employer_id,
                    candidate_id = %key.candidate_id,
                    record_id = %stored.id,
                    "bypass penalty raised"
                );
                Ok(stored)
            }
        }
    }

    pub fn assess_damages(
        &self,
        key: &GrantKey,
        amount_pence: u64,
        evidence: Vec<String>,
    ) -> Result<EnforcementRecord, EnforcementError> {
        if amount_pence == 0 {
            return Err(EnforcementError::Validation(
                "damages must be a positive amount".to_string(),
            ));
        }
        let now = self.clock.now();
        let first_contact = self
            .grants
            .get(key)?
            .and_then(|grant| grant.first_contact_at())
            .unwrap_or(now);
        let record = EnforcementRecord::new(
            key,
            ObligationKind::LiquidatedDamages,
            None,
            amount_pence,
            first_contact,
            self.due_date(now),
            now,
            evidence
                .into_iter()
                .map(|description| Evidence {
                    at: now,
                    description,
                })
                .collect(),
        );
        Ok(self.repository.insert(record)?)
    }

    /// Records due before `now` that are still pending or overdue, oldest due first.
    pub fn get_overdue_fees(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EnforcementRecord>, EnforcementError> {
        let mut records = self
            .repository
            .due_before(now, &[ObligationStatus::Pending, ObligationStatus::Overdue])?;
        records.retain(|record| record.due_date < now && record.status.is_collectable());
        records.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    pub fn transition(
        &self,
        id: &Uuid,
        next: ObligationStatus,
    ) -> Result<EnforcementRecord, EnforcementError> {
        let (record, _) = self.modify(id, |record, _| {
            if !record.status.can_transition_to(next) {
                return Err(EnforcementError::InvalidTransition {
                    id: record.id,
                    from: record.status,
                    to: next,
                });
            }
            record.status = next;
            Ok(())
        })?;
        info!(record_id = %id, status = next.label(), "obligation status changed");
        Ok(record)
    }

    /// Move one past-due record to overdue and send the highest notice it has reached but
    /// not yet received. Skipped lower stages are not sent afterwards.
    pub fn escalate_notice(
        &self,
        id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<IssuedNotice>, EnforcementError> {
        let (record, stage) = self.modify(id, |record, _| {
            if !record.status.is_collectable() || record.due_date >= now {
                return Ok(None);
            }
            if record.status == ObligationStatus::Pending {
                record.status = ObligationStatus::Overdue;
            }
            let days = (now - record.due_date).num_days();
            let stage = NoticeStage::reached(days)
                .filter(|stage| record.last_notice().map_or(true, |sent| *stage > sent));
            if let Some(stage) = stage {
                record.notices.push(LegalNotice {
                    stage,
                    sent_at: now,
                });
            }
            Ok(stage)
        })?;

        Ok(stage.map(|stage| {
            info!(
                record_id = %record.id,
                employer_id = %record.employer_id,
                stage = ?stage,
                "legal notice issued"
            );
            IssuedNotice {
                record_id: record.id,
                employer_id: record.employer_id.clone(),
                candidate_id: record.candidate_id.clone(),
                stage,
                amount_pence: record.amount_pence,
                sent_at: now,
            }
        }))
    }

    pub fn issue_legal_notices(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<IssuedNotice>, EnforcementError> {
        let mut issued = Vec::new();
        for record in self.get_overdue_fees(now)? {
            if let Some(notice) = self.escalate_notice(&record.id, now)? {
                issued.push(notice);
            }
        }
        Ok(issued)
    }

    fn due_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.config.payment_terms_days)
    }

    /// Read-modify-write one record. A mutation that leaves the record unchanged skips the
    /// write.
    fn modify<T, F>(&self, id: &Uuid, mutate: F) -> Result<(EnforcementRecord, T), EnforcementError>
    where
        F: Fn(&mut EnforcementRecord, DateTime<Utc>) -> Result<T, EnforcementError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let current = self.get(id)?;
            let mut record = current.clone();
            let output = mutate(&mut record, now)?;
            if record == current {
                return Ok((current, output));
            }
            record.updated_at = now;

            match self.repository.compare_and_set(current.version, record) {
                Ok(stored) => return Ok((stored, output)),
                Err(err) if err.is_version_mismatch() => {
                    debug!(record_id = %id, attempt, "obligation write lost a race, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EnforcementError::Contention {
            id: *id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::GrantRepository;
    use crate::clock::ManualClock;
    use crate::store::memory::{InMemoryEnforcementRepository, InMemoryGrantRepository};
    use chrono::TimeZone;

    struct Fixture {
        clock: Arc<ManualClock>,
        grants: Arc<AccessLedger>,
        records: InMemoryEnforcementRepository,
        ledger: EnforcementLedger,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(start()));
        let repository: Arc<dyn GrantRepository> = Arc::new(InMemoryGrantRepository::default());
        let grants = Arc::new(AccessLedger::new(repository, clock.clone()));
        let records = InMemoryEnforcementRepository::default();
        let ledger = EnforcementLedger::new(
            Arc::new(records.clone()),
            grants.clone(),
            clock.clone(),
            EnforcementConfig::default(),
        );
        Fixture {
            clock,
            grants,
            records,
            ledger,
        }
    }

    fn key() -> GrantKey {
        GrantKey::new("emp-1", "cand-1")
    }

    #[test]
    fn hire_without_contact_is_not_billable() {
        let fx = fixture();
        let outcome = fx
            .ledger
            .record_hire(&key(), 4_000_000, start(), true)
            .unwrap();
        assert!(!outcome.billable);
        assert!(fx.ledger.records().unwrap().is_empty());
    }

    #[test]
    fn off_platform_hire_inside_window_raises_fee_and_penalty_once() {
        let fx = fixture();
        fx.grants.touch(&key(), start(), true).unwrap();
        let hired_at = start() + Duration::days(200);

        let first = fx
            .ledger
            .record_hire(&key(), 4_000_000, hired_at, false)
            .unwrap();
        assert!(first.billable);
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.records[0].amount_pence, 600_000);
        assert_eq!(first.records[0].rate_percent, Some(15));
        assert!(first.records[1].confirmed_hire);
        assert_eq!(first.records[1].amount_pence, 1_000_000);

        let again = fx
            .ledger
            .record_hire(&key(), 4_000_000, hired_at, false)
            .unwrap();
        assert_eq!(again.records, first.records);
        assert_eq!(fx.ledger.records().unwrap().len(), 2);
    }

    #[test]
    fn blocked_attempt_alone_opens_the_billing_window() {
        let fx = fixture();
        fx.ledger
            .record_bypass_attempt(&key(), start(), vec!["phone number".to_string()])
            .unwrap();
        assert!(fx.grants.get(&key()).unwrap().is_none());

        let outcome = fx
            .ledger
            .record_hire(&key(), 3_000_000, start() + Duration::days(92), false)
            .unwrap();
        assert!(outcome.billable);
        let kinds: Vec<(ObligationKind, bool)> = outcome
            .records
            .iter()
            .map(|record| (record.kind, record.confirmed_hire))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ObligationKind::SuccessFee, false),
                (ObligationKind::BypassPenalty, true)
            ]
        );
        assert_eq!(outcome.records[0].amount_pence, 450_000);
        assert_eq!(fx.ledger.records().unwrap().len(), 3);
    }

    #[test]
    fn earliest_record_wins_over_a_later_delivered_message() {
        let fx = fixture();
        fx.ledger
            .record_bypass_attempt(&key(), start(), vec!["email".to_string()])
            .unwrap();
        fx.grants
            .touch(&key(), start() + Duration::days(100), true)
            .unwrap();

        let late = fx
            .ledger
            .record_hire(&key(), 3_000_000, start() + Duration::days(400), true)
            .unwrap();
        assert!(!late.billable);
        let inside = fx
            .ledger
            .record_hire(&key(), 3_000_000, start() + Duration::days(50), true)
            .unwrap();
        assert!(inside.billable);
    }

    #[test]
    fn hire_after_window_is_not_billable() {
        let fx = fixture();
        fx.grants.touch(&key(), start(), true).unwrap();
        let outcome = fx
            .ledger
            .record_hire(&key(), 4_000_000, start() + Duration::days(365), false)
            .unwrap();
        assert!(!outcome.billable);
    }

    #[test]
    fn repeated_bypass_attempts_extend_the_open_penalty() {
        let fx = fixture();
        let first = fx
            .ledger
            .record_bypass_attempt(&key(), start(), vec!["phone number".to_string()])
            .unwrap();
        let second = fx
            .ledger
            .record_bypass_attempt(&key(), start(), vec!["email".to_string()])
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.evidence.len(), 2);
        assert_eq!(second.version, 2);
        assert_eq!(fx.ledger.records().unwrap().len(), 1);
    }

    #[test]
    fn transition_rejects_moves_outside_the_state_machine() {
        let fx = fixture();
        let record = fx
            .ledger
            .assess_damages(&key(), 50_000, vec!["breach".to_string()])
            .unwrap();
        let paid = fx
            .ledger
            .transition(&record.id, ObligationStatus::Paid)
            .unwrap();
        assert_eq!(paid.status, ObligationStatus::Paid);

        let err = fx
            .ledger
            .transition(&record.id, ObligationStatus::Refunded)
            .unwrap_err();
        assert!(matches!(err, EnforcementError::InvalidTransition { .. }));
    }

    #[test]
    fn late_sweep_sends_only_the_highest_reached_notice() {
        let fx = fixture();
        let record = fx
            .ledger
            .record_bypass_attempt(&key(), start(), vec!["evidence".to_string()])
            .unwrap();

        let now = record.due_date + Duration::days(15);
        fx.clock.set(now);
        let issued = fx.ledger.issue_legal_notices(now).unwrap();
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].stage, NoticeStage::Demand);

        let again = fx.ledger.issue_legal_notices(now).unwrap();
        assert!(again.is_empty());

        let stored = fx.ledger.get(&record.id).unwrap();
        assert_eq!(stored.status, ObligationStatus::Overdue);
        assert_eq!(stored.notices.len(), 1);
        assert_eq!(stored.exclusive_period_end(), record.exclusive_period_end());
    }

    #[test]
    fn overdue_fees_are_exactly_the_collectable_past_due_records() {
        let fx = fixture();
        let now = start() + Duration::days(60);
        let seed = |candidate: &str, due: DateTime<Utc>, status: ObligationStatus| {
            let mut record = EnforcementRecord::new(
                &GrantKey::new("emp-1", candidate),
                ObligationKind::BypassPenalty,
                None,
                250_000,
                start(),
                due,
                start(),
                Vec::new(),
            );
            record.status = status;
            fx.records.insert(record).unwrap().id
        };

        let pending_late = seed("cand-a", now - Duration::days(2), ObligationStatus::Pending);
        seed("cand-b", now - Duration::days(20), ObligationStatus::Paid);
        let overdue_early = seed("cand-c", now - Duration::days(9), ObligationStatus::Overdue);
        seed("cand-d", now - Duration::days(5), ObligationStatus::Disputed);
        seed("cand-e", now - Duration::days(30), ObligationStatus::Waived);
        seed("cand-f", now, ObligationStatus::Pending);
        seed("cand-g", now + Duration::days(3), ObligationStatus::Pending);
        let pending_earliest =
            seed("cand-h", now - Duration::days(12), ObligationStatus::Pending);
        seed("cand-i", now - Duration::days(1), ObligationStatus::Refunded);

        let overdue: Vec<Uuid> = fx
            .ledger
            .get_overdue_fees(now)
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(overdue, vec![pending_earliest, overdue_early, pending_late]);
    }
}
