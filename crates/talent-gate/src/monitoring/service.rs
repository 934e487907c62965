use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::domain::{FlagKind, FlagListener, FlagRepository, RaisedFlag, Severity, SuspiciousFlag};
use crate::access::{AccessLedger, AccessLevel, CandidateId, EmployerId, GrantKey, LedgerError};
use crate::accounts::AccountDirectory;
use crate::activity::{ActivityAction, ActivityEvent, ActivityLog, ActivitySink};
use crate::clock::Clock;
use crate::detection::{Classification, PatternDetector};
use crate::enforcement::{EnforcementError, EnforcementLedger};
use crate::store::RepositoryError;

/// Thresholds for the temporal heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub excessive_view_threshold: usize,
    pub counter_window_hours: i64,
    pub mass_access_candidates: usize,
    pub mass_access_events: usize,
    pub mass_access_window_minutes: i64,
    pub off_hours_threshold: usize,
    pub working_day_start_hour: u32,
    pub working_day_end_hour: u32,
    pub local_utc_offset_minutes: i32,
    pub inactivity_after_minutes: i64,
    pub suspend_on_critical: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            excessive_view_threshold: 10,
            counter_window_hours: 24,
            mass_access_candidates: 20,
            mass_access_events: 50,
            mass_access_window_minutes: 60,
            off_hours_threshold: 10,
            working_day_start_hour: 6,
            working_day_end_hour: 22,
            local_utc_offset_minutes: 0,
            inactivity_after_minutes: 120,
            suspend_on_critical: true,
        }
    }
}

impl MonitorConfig {
    fn is_working_hour(&self, at: DateTime<Utc>) -> bool {
        let local = at + Duration::minutes(i64::from(self.local_utc_offset_minutes));
        (self.working_day_start_hour..self.working_day_end_hour).contains(&local.hour())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Enforcement(#[from] EnforcementError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDisposition {
    Delivered,
    Redacted,
    Blocked,
}

/// Outcome of gating one message. Only `delivered_content` may reach the recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDecision {
    pub disposition: MessageDisposition,
    pub delivered_content: Option<String>,
    pub classification: Option<Classification>,
    pub flag_id: Option<Uuid>,
    pub reason: Option<String>,
}

impl MessageDecision {
    fn blocked(
        classification: Option<Classification>,
        flag_id: Option<Uuid>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            disposition: MessageDisposition::Blocked,
            delivered_content: None,
            classification,
            flag_id,
            reason: Some(reason.into()),
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.disposition != MessageDisposition::Blocked
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportAck {
    pub flag_id: Uuid,
    pub severity: Severity,
    pub received_at: DateTime<Utc>,
}

/// Ingests activity and messages, raises flags and applies their immediate effects.
pub struct ActivityMonitor {
    detector: Arc<PatternDetector>,
    grants: Arc<AccessLedger>,
    activity: Arc<dyn ActivityLog>,
    flags: Arc<dyn FlagRepository>,
    accounts: Arc<dyn AccountDirectory>,
    enforcement: Arc<EnforcementLedger>,
    listener: Arc<dyn FlagListener>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
}

impl ActivityMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        detector: Arc<PatternDetector>,
        grants: Arc<AccessLedger>,
        activity: Arc<dyn ActivityLog>,
        flags: Arc<dyn FlagRepository>,
        accounts: Arc<dyn AccountDirectory>,
        enforcement: Arc<EnforcementLedger>,
        listener: Arc<dyn FlagListener>,
        clock: Arc<dyn Clock>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            detector,
            grants,
            activity,
            flags,
            accounts,
            enforcement,
            listener,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Record one action and run the heuristics it may trip. Returns the flags raised.
    pub fn track_activity(
        &self,
        key: &GrantKey,
        action: ActivityAction,
        metadata: BTreeMap<String, String>,
    ) -> Result<Vec<SuspiciousFlag>, MonitorError> {
        self.ingest(ActivityEvent::new(key, action, self.clock.now(), metadata))
    }

    /// Decide whether a message may be delivered, and in what form.
    ///
    /// Runs before delivery. Any storage failure on this path blocks the message.
    pub fn gate_message(&self, key: &GrantKey, text: &str) -> MessageDecision {
        match self.try_gate(key, text) {
            Ok(decision) => decision,
            Err(err) => {
                error!(
                    employer_id = %key.employer_id,
                    candidate_id = %key.candidate_id,
                    error = %err,
                    "message gating failed, blocking delivery"
                );
                MessageDecision::blocked(
                    Some(self.detector.classify(text)),
                    None,
                    "message could not be screened",
                )
            }
        }
    }

    /// Record a candidate's report against an employer as a high severity flag.
    pub fn report_suspicious(
        &self,
        reporter_id: &CandidateId,
        subject_id: &EmployerId,
        reason: &str,
        evidence: Vec<String>,
    ) -> Result<ReportAck, MonitorError> {
        if reason.trim().is_empty() {
            return Err(MonitorError::Validation(
                "a report needs a reason".to_string(),
            ));
        }
        let key = GrantKey {
            employer_id: subject_id.clone(),
            candidate_id: reporter_id.clone(),
        };
        let now = self.clock.now();
        let flag = SuspiciousFlag::for_pair(FlagKind::UserReport, Severity::High, &key, reason.trim(), now)
            .with_evidence(evidence);
        let ack = ReportAck {
            flag_id: flag.id,
            severity: flag.severity,
            received_at: now,
        };
        self.apply_flag(flag, false)?;
        info!(employer_id = %subject_id, candidate_id = %reporter_id, "user report recorded");
        Ok(ack)
    }

    /// Flag level-4 pairs whose last action was a contact-details read more than the
    /// configured quiet period ago. Each contact access is flagged at most once.
    pub fn sweep_inactivity(&self, now: DateTime<Utc>) -> Result<Vec<SuspiciousFlag>, MonitorError> {
        let quiet_period = Duration::minutes(self.config.inactivity_after_minutes);
        let mut raised = Vec::new();

        for grant in self.grants.list()? {
            if grant.level() < AccessLevel::Contact {
                continue;
            }
            let Some(latest) = self.activity.latest_for_pair(&grant.key)? else {
                continue;
            };
            if latest.action != ActivityAction::ContactAccess || now - latest.at <= quiet_period {
                continue;
            }
            let already_flagged = self
                .flags
                .latest(
                    FlagKind::SuddenInactivityAfterContactAccess,
                    &grant.key.employer_id,
                    Some(&grant.key.candidate_id),
                )?
                .is_some_and(|flag| flag.raised_at >= latest.at);
            if already_flagged {
                continue;
            }

            let flag = SuspiciousFlag::for_pair(
                FlagKind::SuddenInactivityAfterContactAccess,
                Severity::Medium,
                &grant.key,
                format!(
                    "no activity for {} minutes after contact details were accessed",
                    (now - latest.at).num_minutes()
                ),
                now,
            )
            .with_evidence(vec![format!("contact_access at {}", latest.at.to_rfc3339())]);
            self.apply_flag(flag.clone(), false)?;
            raised.push(flag);
        }

        Ok(raised)
    }

    fn try_gate(&self, key: &GrantKey, text: &str) -> Result<MessageDecision, MonitorError> {
        let now = self.clock.now();
        if self.accounts.is_suspended(&key.employer_id)? {
            self.ingest(ActivityEvent::new(
                key,
                ActivityAction::MessageBlocked,
                now,
                BTreeMap::from([("reason".to_string(), "account_suspended".to_string())]),
            ))?;
            return Ok(MessageDecision::blocked(None, None, "employer account is suspended"));
        }

        let classification = self.detector.classify(text);
        if classification.is_clean() {
            self.ingest(ActivityEvent::new(
                key,
                ActivityAction::MessageSent,
                now,
                BTreeMap::new(),
            ))?;
            return Ok(MessageDecision {
                disposition: MessageDisposition::Delivered,
                delivered_content: Some(text.to_string()),
                classification: Some(classification),
                flag_id: None,
                reason: None,
            });
        }

        let severity = if classification.has_bypass_intent() {
            Severity::Critical
        } else {
            Severity::Medium
        };
        let evidence: Vec<String> = classification
            .flags
            .iter()
            .flat_map(|flag| {
                flag.masked_matches
                    .iter()
                    .map(move |masked| format!("{}: {}", flag.category.label(), masked))
            })
            .collect();
        let flag = SuspiciousFlag::for_pair(
            FlagKind::MessagePolicyViolation,
            severity,
            key,
            format!(
                "message matched {} (confidence {:.2})",
                classification
                    .categories()
                    .iter()
                    .map(|category| category.label())
                    .collect::<Vec<_>>()
                    .join(", "),
                classification.confidence
            ),
            now,
        )
        .with_evidence(evidence.clone());
        let flag_id = flag.id;
        let metadata = BTreeMap::from([
            ("confidence".to_string(), format!("{:.2}", classification.confidence)),
            ("risk_level".to_string(), classification.risk_level.label().to_string()),
            ("flag_id".to_string(), flag_id.to_string()),
        ]);

        if classification.should_block {
            self.ingest(ActivityEvent::new(
                key,
                ActivityAction::MessageBlocked,
                now,
                metadata,
            ))?;
            let first_contact = self
                .grants
                .get(key)?
                .and_then(|grant| grant.first_contact_at())
                .unwrap_or(now);
            self.enforcement
                .record_bypass_attempt(key, first_contact, evidence)?;
            self.apply_flag(flag, true)?;
            warn!(
                employer_id = %key.employer_id,
                candidate_id = %key.candidate_id,
                severity = severity.label(),
                "message blocked"
            );
            return Ok(MessageDecision::blocked(
                Some(classification),
                Some(flag_id),
                "message contains off-platform contact details or bypass wording",
            ));
        }

        self.apply_flag(flag, false)?;
        let redacted = self.detector.redact(text);
        let mut metadata = metadata;
        metadata.insert("redacted".to_string(), "true".to_string());
        self.ingest(ActivityEvent::new(
            key,
            ActivityAction::MessageSent,
            now,
            metadata,
        ))?;
        Ok(MessageDecision {
            disposition: MessageDisposition::Redacted,
            delivered_content: Some(redacted),
            classification: Some(classification),
            flag_id: Some(flag_id),
            reason: Some("matched details were redacted".to_string()),
        })
    }

    fn ingest(&self, event: ActivityEvent) -> Result<Vec<SuspiciousFlag>, MonitorError> {
        let key = event.key();
        let at = event.at;
        let first_contact = event.action.is_contact();
        self.activity.append(event)?;
        self.grants.touch(&key, at, first_contact)?;

        let candidates = [
            self.check_excessive_viewing(&key, at)?,
            self.check_mass_access(&key.employer_id, at)?,
            self.check_off_hours(&key.employer_id, at)?,
        ];
        let mut raised = Vec::new();
        for flag in candidates.into_iter().flatten() {
            self.apply_flag(flag.clone(), false)?;
            raised.push(flag);
        }
        Ok(raised)
    }

    fn check_excessive_viewing(
        &self,
        key: &GrantKey,
        now: DateTime<Utc>,
    ) -> Result<Option<SuspiciousFlag>, MonitorError> {
        let since = now - Duration::hours(self.config.counter_window_hours);
        let events = self.activity.for_pair_since(key, since)?;
        let views = events
            .iter()
            .filter(|event| {
                matches!(
                    event.action,
                    ActivityAction::ProfileView | ActivityAction::ContactAccess
                )
            })
            .count();
        let messages = events
            .iter()
            .filter(|event| event.action == ActivityAction::MessageSent)
            .count();
        if views <= self.config.excessive_view_threshold || messages > 0 {
            return Ok(None);
        }
        if self.flagged_since(
            FlagKind::ExcessiveProfileViewing,
            &key.employer_id,
            Some(&key.candidate_id),
            since,
        )? {
            return Ok(None);
        }
        Ok(Some(
            SuspiciousFlag::for_pair(
                FlagKind::ExcessiveProfileViewing,
                Severity::High,
                key,
                format!("{views} profile views without a message"),
                now,
            )
            .with_evidence(vec![format!("{views} views"), "0 messages".to_string()]),
        ))
    }

    fn check_mass_access(
        &self,
        employer_id: &EmployerId,
        now: DateTime<Utc>,
    ) -> Result<Option<SuspiciousFlag>, MonitorError> {
        let since = now - Duration::minutes(self.config.mass_access_window_minutes);
        let events = self.activity.for_employer_since(employer_id, since)?;
        let candidates: BTreeSet<&CandidateId> = events.iter().map(|event| &event.subject).collect();
        if candidates.len() <= self.config.mass_access_candidates
            || events.len() <= self.config.mass_access_events
        {
            return Ok(None);
        }
        if self.flagged_since(FlagKind::MassCandidateAccess, employer_id, None, since)? {
            return Ok(None);
        }
        Ok(Some(
            SuspiciousFlag::for_employer(
                FlagKind::MassCandidateAccess,
                Severity::High,
                employer_id,
                format!(
                    "{} candidates touched in {} events",
                    candidates.len(),
                    events.len()
                ),
                now,
            )
            .with_evidence(vec![
                format!("{} distinct candidates", candidates.len()),
                format!("{} events", events.len()),
            ]),
        ))
    }

    fn check_off_hours(
        &self,
        employer_id: &EmployerId,
        now: DateTime<Utc>,
    ) -> Result<Option<SuspiciousFlag>, MonitorError> {
        if self.config.is_working_hour(now) {
            return Ok(None);
        }
        let since = now - Duration::hours(self.config.counter_window_hours);
        let off_hours = self
            .activity
            .for_employer_since(employer_id, since)?
            .into_iter()
            .filter(|event| !self.config.is_working_hour(event.at))
            .count();
        if off_hours <= self.config.off_hours_threshold {
            return Ok(None);
        }
        if self.flagged_since(FlagKind::OffHoursActivity, employer_id, None, since)? {
            return Ok(None);
        }
        Ok(Some(
            SuspiciousFlag::for_employer(
                FlagKind::OffHoursActivity,
                Severity::Medium,
                employer_id,
                format!("{off_hours} events outside working hours"),
                now,
            )
            .with_evidence(vec![format!("{off_hours} off-hours events")]),
        ))
    }

    fn flagged_since(
        &self,
        kind: FlagKind,
        employer_id: &EmployerId,
        candidate_id: Option<&CandidateId>,
        since: DateTime<Utc>,
    ) -> Result<bool, MonitorError> {
        Ok(self
            .flags
            .latest(kind, employer_id, candidate_id)?
            .is_some_and(|flag| flag.raised_at >= since))
    }

    /// Store the flag, mark the affected grants, suspend on critical, then notify.
    fn apply_flag(&self, flag: SuspiciousFlag, message_blocked: bool) -> Result<(), MonitorError> {
        self.flags.insert(flag.clone())?;

        let metadata = BTreeMap::from([
            ("flag_id".to_string(), flag.id.to_string()),
            ("kind".to_string(), flag.kind.code().to_string()),
            ("severity".to_string(), flag.severity.label().to_string()),
        ]);
        let keys = match flag.key() {
            Some(key) => vec![key],
            None => self
                .grants
                .list()?
                .into_iter()
                .map(|grant| grant.key)
                .filter(|key| key.employer_id == flag.employer_id)
                .collect(),
        };
        for key in &keys {
            self.grants.flag_suspicious(key, metadata.clone())?;
        }

        if flag.severity == Severity::Critical && self.config.suspend_on_critical {
            let reason = format!("critical {} flag {}", flag.kind.code(), flag.id);
            self.accounts
                .suspend(&flag.employer_id, &reason, flag.raised_at)?;
            warn!(employer_id = %flag.employer_id, flag_id = %flag.id, "employer suspended");
        }

        info!(
            employer_id = %flag.employer_id,
            kind = flag.kind.code(),
            severity = flag.severity.label(),
            "suspicious activity flagged"
        );
        self.listener.on_flag(&RaisedFlag {
            flag,
            message_blocked,
        });
        Ok(())
    }
}

impl ActivitySink for ActivityMonitor {
    fn record(&self, event: ActivityEvent) {
        let key = event.key();
        if let Err(err) = self.ingest(event) {
            warn!(
                employer_id = %key.employer_id,
                candidate_id = %key.candidate_id,
                error = %err,
                "activity event dropped"
            );
        }
    }
}
