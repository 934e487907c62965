use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{AccessGrant, CandidateId, EmployerId};
use crate::enforcement::{EnforcementRecord, ObligationStatus};
use crate::monitoring::{RaisedFlag, Severity, SuspiciousFlag};

/// Repeat-attempt threshold for the daily suspension rule.
pub const REPEAT_ATTEMPT_THRESHOLD: u32 = 3;
pub const STALE_DISPUTE_DAYS: i64 = 14;
pub const EXPIRY_NOTICE_DAYS: i64 = 30;
/// Look-back for the hourly flag rules.
pub const FLAG_LOOKBACK_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Immediate,
    Hourly,
    Daily,
    Weekly,
}

impl Trigger {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    pub const fn scheduled() -> [Self; 3] {
        [Self::Hourly, Self::Daily, Self::Weekly]
    }

    /// Sweep cadence; immediate rules have none.
    pub fn interval(self) -> Option<Duration> {
        match self {
            Self::Immediate => None,
            Self::Hourly => Some(Duration::hours(1)),
            Self::Daily => Some(Duration::days(1)),
            Self::Weekly => Some(Duration::weeks(1)),
        }
    }
}

/// Effects a rule applies to each finding. All of them only ever tighten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    TightenRestrictions,
    SuspendEmployer,
    IssueLegalNotices,
}

/// Aggregate state a scheduled sweep evaluates against.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub now: DateTime<Utc>,
    pub flags: Vec<SuspiciousFlag>,
    pub grants: Vec<AccessGrant>,
    pub records: Vec<EnforcementRecord>,
}

pub enum RuleInput<'a> {
    Flag(&'a RaisedFlag),
    Snapshot(&'a Snapshot),
}

/// One subject a rule's condition held for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub employer_id: Option<EmployerId>,
    pub candidate_id: Option<CandidateId>,
    pub record_id: Option<Uuid>,
    pub title: String,
    pub detail: String,
    /// Unique per rule; a finding whose key already has an alert raises nothing new.
    pub dedupe_key: String,
}

impl Finding {
    fn from_flag(flag: &SuspiciousFlag, title: &str) -> Self {
        Self {
            employer_id: Some(flag.employer_id.clone()),
            candidate_id: flag.candidate_id.clone(),
            record_id: None,
            title: format!("{title}: {}", flag.kind.code()),
            detail: flag.detail.clone(),
            dedupe_key: flag.id.to_string(),
        }
    }

    fn from_record(record: &EnforcementRecord, title: String, detail: String, dedupe_key: String) -> Self {
        Self {
            employer_id: Some(record.employer_id.clone()),
            candidate_id: Some(record.candidate_id.clone()),
            record_id: Some(record.id),
            title,
            detail,
            dedupe_key,
        }
    }
}

pub type Condition = fn(&RuleInput<'_>) -> Vec<Finding>;

#[derive(Clone)]
pub struct AlertRule {
    pub id: String,
    pub trigger: Trigger,
    pub severity: Severity,
    pub condition: Condition,
    pub actions: Vec<RuleAction>,
    pub enabled: bool,
}

impl AlertRule {
    pub fn new(
        id: impl Into<String>,
        trigger: Trigger,
        severity: Severity,
        condition: Condition,
        actions: Vec<RuleAction>,
    ) -> Self {
        Self {
            id: id.into(),
            trigger,
            severity,
            condition,
            actions,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Debug for AlertRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertRule")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("severity", &self.severity)
            .field("actions", &self.actions)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(
            "critical-activity",
            Trigger::Immediate,
            Severity::Critical,
            critical_activity,
            vec![RuleAction::TightenRestrictions],
        ),
        AlertRule::new(
            "blocked-message",
            Trigger::Immediate,
            Severity::High,
            blocked_message,
            vec![RuleAction::TightenRestrictions],
        ),
        AlertRule::new(
            "high-risk-activity",
            Trigger::Hourly,
            Severity::High,
            high_risk_activity,
            vec![RuleAction::TightenRestrictions],
        ),
        AlertRule::new(
            "medium-risk-activity",
            Trigger::Hourly,
            Severity::Medium,
            medium_risk_activity,
            Vec::new(),
        ),
        AlertRule::new(
            "overdue-obligations",
            Trigger::Hourly,
            Severity::High,
            overdue_obligations,
            vec![RuleAction::IssueLegalNotices],
        ),
        AlertRule::new(
            "repeat-contact-attempts",
            Trigger::Daily,
            Severity::Critical,
            repeat_contact_attempts,
            vec![RuleAction::SuspendEmployer],
        ),
        AlertRule::new(
            "stale-disputes",
            Trigger::Daily,
            Severity::Medium,
            stale_disputes,
            Vec::new(),
        ),
        AlertRule::new(
            "exclusivity-expiring",
            Trigger::Weekly,
            Severity::Low,
            exclusivity_expiring,
            Vec::new(),
        ),
    ]
}

fn critical_activity(input: &RuleInput<'_>) -> Vec<Finding> {
    match input {
        RuleInput::Flag(raised) if raised.flag.severity == Severity::Critical => {
            vec![Finding::from_flag(&raised.flag, "Critical activity")]
        }
        _ => Vec::new(),
    }
}

fn blocked_message(input: &RuleInput<'_>) -> Vec<Finding> {
    match input {
        RuleInput::Flag(raised)
            if raised.message_blocked && raised.flag.severity < Severity::Critical =>
        {
            vec![Finding::from_flag(&raised.flag, "Message blocked")]
        }
        _ => Vec::new(),
    }
}

fn recent_flags(snapshot: &Snapshot, severity: Severity) -> impl Iterator<Item = &SuspiciousFlag> {
    let since = snapshot.now - Duration::hours(FLAG_LOOKBACK_HOURS);
    snapshot
        .flags
        .iter()
        .filter(move |flag| flag.severity == severity && flag.raised_at >= since)
}

fn high_risk_activity(input: &RuleInput<'_>) -> Vec<Finding> {
    let RuleInput::Snapshot(snapshot) = input else {
        return Vec::new();
    };
    recent_flags(snapshot, Severity::High)
        .map(|flag| Finding::from_flag(flag, "High risk activity"))
        .collect()
}

fn medium_risk_activity(input: &RuleInput<'_>) -> Vec<Finding> {
    let RuleInput::Snapshot(snapshot) = input else {
        return Vec::new();
    };
    recent_flags(snapshot, Severity::Medium)
        .map(|flag| Finding::from_flag(flag, "Medium risk activity"))
        .collect()
}

fn overdue_obligations(input: &RuleInput<'_>) -> Vec<Finding> {
    let RuleInput::Snapshot(snapshot) = input else {
        return Vec::new();
    };
    snapshot
        .records
        .iter()
        .filter(|record| record.status.is_collectable() && record.due_date < snapshot.now)
        .map(|record| {
            Finding::from_record(
                record,
                "Obligation overdue".to_string(),
                format!(
                    "{} pence due {} is unpaid",
                    record.amount_pence,
                    record.due_date.date_naive()
                ),
                record.id.to_string(),
            )
        })
        .collect()
}

fn repeat_contact_attempts(input: &RuleInput<'_>) -> Vec<Finding> {
    let RuleInput::Snapshot(snapshot) = input else {
        return Vec::new();
    };
    snapshot
        .grants
        .iter()
        .filter(|grant| grant.monitoring().external_contact_attempts >= REPEAT_ATTEMPT_THRESHOLD)
        .map(|grant| Finding {
            employer_id: Some(grant.key.employer_id.clone()),
            candidate_id: Some(grant.key.candidate_id.clone()),
            record_id: None,
            title: "Repeated external contact attempts".to_string(),
            detail: format!(
                "{} attempts recorded against candidate {}",
                grant.monitoring().external_contact_attempts,
                grant.key.candidate_id
            ),
            dedupe_key: grant.key.to_string(),
        })
        .collect()
}

fn stale_disputes(input: &RuleInput<'_>) -> Vec<Finding> {
    let RuleInput::Snapshot(snapshot) = input else {
        return Vec::new();
    };
    snapshot
        .records
        .iter()
        .filter(|record| {
            record.status == ObligationStatus::Disputed
                && snapshot.now - record.updated_at >= Duration::days(STALE_DISPUTE_DAYS)
        })
        .map(|record| {
            Finding::from_record(
                record,
                "Dispute unresolved".to_string(),
                format!("disputed since {}", record.updated_at.date_naive()),
                format!("{}:{}", record.id, record.updated_at.timestamp()),
            )
        })
        .collect()
}

fn exclusivity_expiring(input: &RuleInput<'_>) -> Vec<Finding> {
    let RuleInput::Snapshot(snapshot) = input else {
        return Vec::new();
    };
    snapshot
        .records
        .iter()
        .filter(|record| {
            let end = record.exclusive_period_end();
            end >= snapshot.now && end - snapshot.now <= Duration::days(EXPIRY_NOTICE_DAYS)
        })
        .map(|record| {
            let end = record.exclusive_period_end();
            Finding::from_record(
                record,
                "Exclusive period ending".to_string(),
                format!("exclusive period ends {}", end.date_naive()),
                format!("{}:{}", record.key(), end.date_naive()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::GrantKey;
    use crate::enforcement::ObligationKind;
    use crate::monitoring::FlagKind;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    fn rule(id: &str) -> AlertRule {
        default_rules()
            .into_iter()
            .find(|rule| rule.id == id)
            .unwrap()
    }

    #[test]
    fn default_table_covers_every_cadence() {
        let rules = default_rules();
        for trigger in [Trigger::Immediate, Trigger::Hourly, Trigger::Daily, Trigger::Weekly] {
            assert!(rules.iter().any(|rule| rule.trigger == trigger));
        }
        assert!(rules.iter().all(|rule| rule.enabled));
    }

    #[test]
    fn critical_rule_ignores_lower_severities() {
        let key = GrantKey::new("emp-1", "cand-1");
        let medium = RaisedFlag {
            flag: SuspiciousFlag::for_pair(
                FlagKind::MessagePolicyViolation,
                Severity::Medium,
                &key,
                "phone",
                now(),
            ),
            message_blocked: true,
        };
        assert!((rule("critical-activity").condition)(&RuleInput::Flag(&medium)).is_empty());
        let findings = (rule("blocked-message").condition)(&RuleInput::Flag(&medium));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].dedupe_key, medium.flag.id.to_string());
    }

    #[test]
    fn hourly_flag_rules_only_see_the_last_day() {
        let key = GrantKey::new("emp-1", "cand-1");
        let fresh = SuspiciousFlag::for_pair(
            FlagKind::ExcessiveProfileViewing,
            Severity::High,
            &key,
            "views",
            now() - Duration::hours(2),
        );
        let stale = SuspiciousFlag::for_pair(
            FlagKind::UserReport,
            Severity::High,
            &key,
            "report",
            now() - Duration::hours(30),
        );
        let snapshot = Snapshot {
            now: now(),
            flags: vec![fresh.clone(), stale],
            ..Snapshot::default()
        };
        let findings = (rule("high-risk-activity").condition)(&RuleInput::Snapshot(&snapshot));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].dedupe_key, fresh.id.to_string());
    }

    #[test]
    fn expiring_exclusivity_is_found_inside_thirty_days() {
        let key = GrantKey::new("emp-1", "cand-1");
        let first_contact = now() - Duration::days(350);
        let record = EnforcementRecord::new(
            &key,
            ObligationKind::SuccessFee,
            Some(15),
            600_000,
            first_contact,
            now(),
            first_contact,
            Vec::new(),
        );
        let snapshot = Snapshot {
            now: now(),
            records: vec![record],
            ..Snapshot::default()
        };
        let findings = (rule("exclusivity-expiring").condition)(&RuleInput::Snapshot(&snapshot));
        assert_eq!(findings.len(), 1);
    }
}
