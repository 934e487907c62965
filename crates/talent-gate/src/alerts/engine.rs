use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::domain::{Alert, AlertRepository, AlertStatus, Notification, NotificationSink};
use super::rules::{
    default_rules, AlertRule, Finding, RuleAction, RuleInput, Snapshot, Trigger,
    FLAG_LOOKBACK_HOURS,
};
use crate::access::{AccessLedger, GrantKey, LedgerError};
use crate::accounts::AccountDirectory;
use crate::clock::Clock;
use crate::enforcement::{EnforcementError, EnforcementLedger};
use crate::monitoring::{FlagListener, FlagRepository, RaisedFlag};
use crate::store::RepositoryError;

const MAX_WRITE_ATTEMPTS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("no alert with id {0}")]
    NotFound(Uuid),
    #[error("alert {id} is {} and cannot be {action}", .status.label())]
    InvalidState {
        id: Uuid,
        status: AlertStatus,
        action: &'static str,
    },
    #[error("gave up updating alert {id} after {attempts} conflicting writes")]
    Contention { id: Uuid, attempts: usize },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Enforcement(#[from] EnforcementError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule_id: String,
    pub error: String,
}

/// Summary of one scheduled pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub trigger: Trigger,
    pub ran_at: DateTime<Utc>,
    pub rules_evaluated: usize,
    pub alerts_raised: Vec<Uuid>,
    pub alerts_escalated: Vec<Uuid>,
    pub failures: Vec<RuleFailure>,
}

/// Turns flags and aggregate state into alerts, and applies each rule's actions.
pub struct AlertEngine {
    rules: Vec<AlertRule>,
    alerts: Arc<dyn AlertRepository>,
    notifications: Arc<dyn NotificationSink>,
    grants: Arc<AccessLedger>,
    enforcement: Arc<EnforcementLedger>,
    flags: Arc<dyn FlagRepository>,
    accounts: Arc<dyn AccountDirectory>,
    clock: Arc<dyn Clock>,
}

impl AlertEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        notifications: Arc<dyn NotificationSink>,
        grants: Arc<AccessLedger>,
        enforcement: Arc<EnforcementLedger>,
        flags: Arc<dyn FlagRepository>,
        accounts: Arc<dyn AccountDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rules: default_rules(),
            alerts,
            notifications,
            grants,
            enforcement,
            flags,
            accounts,
            clock,
        }
    }

    pub fn with_rules(mut self, rules: Vec<AlertRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Evaluate the immediate rules against one flag. Failures are logged per rule.
    pub fn evaluate_flag(&self, raised: &RaisedFlag) -> Vec<Alert> {
        let now = self.clock.now();
        let input = RuleInput::Flag(raised);
        let mut alerts = Vec::new();
        for rule in self.active_rules(Trigger::Immediate) {
            for err in self.evaluate(rule, &input, now, &mut alerts) {
                warn!(rule_id = %rule.id, flag_id = %raised.flag.id, error = %err, "immediate rule failed");
            }
        }
        alerts
    }

    /// Run every scheduled rule of `trigger` against current state, then escalate stale
    /// critical alerts. One rule failing never stops its siblings.
    pub fn run_sweep(&self, trigger: Trigger) -> Result<SweepReport, AlertError> {
        if trigger == Trigger::Immediate {
            return Err(AlertError::Validation(
                "immediate rules only run against a raised flag".to_string(),
            ));
        }

        let now = self.clock.now();
        let snapshot = Snapshot {
            now,
            flags: self
                .flags
                .since(now - Duration::hours(FLAG_LOOKBACK_HOURS))?,
            grants: self.grants.list()?,
            records: self.enforcement.records()?,
        };
        let input = RuleInput::Snapshot(&snapshot);

        let mut report = SweepReport {
            trigger,
            ran_at: now,
            rules_evaluated: 0,
            alerts_raised: Vec::new(),
            alerts_escalated: Vec::new(),
            failures: Vec::new(),
        };
        let mut raised = Vec::new();
        for rule in self.active_rules(trigger) {
            report.rules_evaluated += 1;
            for err in self.evaluate(rule, &input, now, &mut raised) {
                warn!(rule_id = %rule.id, error = %err, "scheduled rule failed");
                report.failures.push(RuleFailure {
                    rule_id: rule.id.clone(),
                    error: err.to_string(),
                });
            }
        }
        report.alerts_raised = raised.iter().map(|alert| alert.id).collect();
        report.alerts_escalated = self.escalate_due(now)?;

        info!(
            trigger = trigger.label(),
            rules = report.rules_evaluated,
            raised = report.alerts_raised.len(),
            escalated = report.alerts_escalated.len(),
            failed = report.failures.len(),
            "alert sweep finished"
        );
        Ok(report)
    }

    /// Pending, acknowledged and escalated alerts, most severe first, then oldest first.
    pub fn list_active_alerts(&self) -> Result<Vec<Alert>, AlertError> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .list()?
            .into_iter()
            .filter(|alert| alert.status.is_active())
            .collect();
        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(alerts)
    }

    pub fn acknowledge(&self, id: &Uuid, admin_id: &str) -> Result<Alert, AlertError> {
        let admin_id = require_text(admin_id, "admin id")?;
        self.modify(id, |alert, now| {
            if !matches!(alert.status, AlertStatus::Pending | AlertStatus::Escalated) {
                return Err(AlertError::InvalidState {
                    id: alert.id,
                    status: alert.status,
                    action: "acknowledged",
                });
            }
            alert.status = AlertStatus::Acknowledged;
            alert.acknowledged_by = Some(admin_id.to_string());
            alert.acknowledged_at = Some(now);
            Ok(())
        })
    }

    pub fn resolve(&self, id: &Uuid, admin_id: &str, note: &str) -> Result<Alert, AlertError> {
        let admin_id = require_text(admin_id, "admin id")?;
        let note = require_text(note, "resolution note")?;
        self.modify(id, |alert, now| {
            if alert.status != AlertStatus::Acknowledged {
                return Err(AlertError::InvalidState {
                    id: alert.id,
                    status: alert.status,
                    action: "resolved",
                });
            }
            alert.status = AlertStatus::Resolved;
            alert.resolved_by = Some(admin_id.to_string());
            alert.resolved_at = Some(now);
            alert.resolution_note = Some(note.to_string());
            Ok(())
        })
    }

    fn active_rules(&self, trigger: Trigger) -> impl Iterator<Item = &AlertRule> {
        self.rules
            .iter()
            .filter(move |rule| rule.enabled && rule.trigger == trigger)
    }

    /// Raise and act on every finding of `rule`. A finding that fails is reported back
    /// without stopping the findings after it.
    fn evaluate(
        &self,
        rule: &AlertRule,
        input: &RuleInput<'_>,
        now: DateTime<Utc>,
        raised: &mut Vec<Alert>,
    ) -> Vec<AlertError> {
        let mut failures = Vec::new();
        for finding in (rule.condition)(input) {
            if let Err(err) = self.handle_finding(rule, &finding, now, raised) {
                failures.push(err);
            }
        }
        failures
    }

    fn handle_finding(
        &self,
        rule: &AlertRule,
        finding: &Finding,
        now: DateTime<Utc>,
        raised: &mut Vec<Alert>,
    ) -> Result<(), AlertError> {
        if let Some(alert) = self.raise(rule, finding, now)? {
            raised.push(alert);
        }
        for action in &rule.actions {
            self.apply(*action, rule, finding, now)?;
        }
        Ok(())
    }

    fn raise(
        &self,
        rule: &AlertRule,
        finding: &Finding,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>, AlertError> {
        let alert = Alert {
            id: Uuid::new_v4(),
            rule_id: rule.id.clone(),
            employer_id: finding.employer_id.clone(),
            candidate_id: finding.candidate_id.clone(),
            severity: rule.severity,
            status: AlertStatus::Pending,
            title: finding.title.clone(),
            detail: finding.detail.clone(),
            dedupe_key: finding.dedupe_key.clone(),
            created_at: now,
            updated_at: now,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            resolution_note: None,
            escalated_at: None,
            version: 0,
        };

        match self.alerts.insert(alert) {
            Ok(stored) => {
                info!(
                    rule_id = %stored.rule_id,
                    alert_id = %stored.id,
                    severity = stored.severity.label(),
                    "alert raised"
                );
                self.notify(&stored, &stored.rule_id);
                Ok(Some(stored))
            }
            Err(RepositoryError::Conflict) => {
                debug!(rule_id = %rule.id, dedupe_key = %finding.dedupe_key, "alert already raised");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn apply(
        &self,
        action: RuleAction,
        rule: &AlertRule,
        finding: &Finding,
        now: DateTime<Utc>,
    ) -> Result<(), AlertError> {
        match action {
            RuleAction::TightenRestrictions => {
                let metadata = BTreeMap::from([("rule_id".to_string(), rule.id.clone())]);
                match (&finding.employer_id, &finding.candidate_id) {
                    (Some(employer_id), Some(candidate_id)) => {
                        let key = GrantKey {
                            employer_id: employer_id.clone(),
                            candidate_id: candidate_id.clone(),
                        };
                        self.grants.tighten(&key, metadata)?;
                    }
                    (Some(employer_id), None) => {
                        for grant in self.grants.list()? {
                            if &grant.key.employer_id == employer_id {
                                self.grants.tighten(&grant.key, metadata.clone())?;
                            }
                        }
                    }
                    _ => {}
                }
            }
            RuleAction::SuspendEmployer => {
                if let Some(employer_id) = &finding.employer_id {
                    let reason = format!("{}: {}", rule.id, finding.title);
                    self.accounts.suspend(employer_id, &reason, now)?;
                }
            }
            RuleAction::IssueLegalNotices => {
                if let Some(record_id) = &finding.record_id {
                    self.enforcement.escalate_notice(record_id, now)?;
                }
            }
        }
        Ok(())
    }

    fn escalate_due(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, AlertError> {
        let mut escalated = Vec::new();
        for alert in self.alerts.list()? {
            if !alert.is_due_for_escalation(now) {
                continue;
            }
            let result = self.modify(&alert.id, |alert, now| {
                if !alert.is_due_for_escalation(now) {
                    return Err(AlertError::InvalidState {
                        id: alert.id,
                        status: alert.status,
                        action: "escalated",
                    });
                }
                alert.status = AlertStatus::Escalated;
                alert.escalated_at = Some(now);
                Ok(())
            });
            match result {
                Ok(stored) => {
                    warn!(alert_id = %stored.id, rule_id = %stored.rule_id, "critical alert escalated");
                    self.notify(&stored, "alert_escalated");
                    escalated.push(stored.id);
                }
                Err(AlertError::InvalidState { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(escalated)
    }

    fn notify(&self, alert: &Alert, template: &str) {
        let notification = Notification {
            template: template.to_string(),
            severity: alert.severity,
            subject: alert.title.clone(),
            body: alert.detail.clone(),
            employer_id: alert.employer_id.clone(),
            candidate_id: alert.candidate_id.clone(),
        };
        if let Err(err) = self.notifications.deliver(notification) {
            warn!(alert_id = %alert.id, error = %err, "alert notification failed");
        }
    }

    fn modify<F>(&self, id: &Uuid, mutate: F) -> Result<Alert, AlertError>
    where
        F: Fn(&mut Alert, DateTime<Utc>) -> Result<(), AlertError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let current = self.alerts.fetch(id)?.ok_or(AlertError::NotFound(*id))?;
            let mut alert = current.clone();
            mutate(&mut alert, now)?;
            alert.updated_at = now;
            match self.alerts.compare_and_set(current.version, alert) {
                Ok(stored) => return Ok(stored),
                Err(err) if err.is_version_mismatch() => {
                    debug!(alert_id = %id, attempt, "alert write lost a race, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(AlertError::Contention {
            id: *id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }
}

impl FlagListener for AlertEngine {
    fn on_flag(&self, raised: &RaisedFlag) {
        self.evaluate_flag(raised);
    }
}

fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str, AlertError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AlertError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}
