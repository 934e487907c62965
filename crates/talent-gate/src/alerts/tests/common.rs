use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::access::{EmployerId, GrantKey};
use crate::alerts::{AlertEngine, AlertRule, Finding, RuleInput};
use crate::clock::ManualClock;
use crate::config::EngineConfig;
use crate::context::{EngineContext, EngineStores};
use crate::store::memory::{
    InMemoryAccountDirectory, InMemoryActivityLog, InMemoryAlertRepository,
    InMemoryEnforcementRepository, InMemoryFlagRepository, InMemoryGrantRepository,
    InMemoryNotificationSink, InMemoryProfileRepository,
};

pub(super) const PHONE_MESSAGE: &str = "Ring me on 07700 900123 tomorrow";
pub(super) const BYPASS_MESSAGE: &str = "Keep this between us and call me directly on 07700 900123";

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap()
}

pub(super) fn key() -> GrantKey {
    GrantKey::new("emp-acme", "cand-priya")
}

pub(super) struct Harness {
    pub(super) clock: Arc<ManualClock>,
    pub(super) context: Arc<EngineContext>,
    pub(super) alerts: InMemoryAlertRepository,
    pub(super) flags: InMemoryFlagRepository,
    pub(super) notifications: InMemoryNotificationSink,
}

impl Harness {
    /// A standalone engine over the same stores, running only `rules`.
    pub(super) fn engine_with(&self, rules: Vec<AlertRule>) -> AlertEngine {
        AlertEngine::new(
            Arc::new(self.alerts.clone()),
            Arc::new(self.notifications.clone()),
            self.context.ledger.clone(),
            self.context.enforcement.clone(),
            Arc::new(self.flags.clone()),
            self.context.accounts.clone(),
            self.clock.clone(),
        )
        .with_rules(rules)
    }
}

pub(super) fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(start()));
    let alerts = InMemoryAlertRepository::default();
    let flags = InMemoryFlagRepository::default();
    let notifications = InMemoryNotificationSink::default();
    let stores = EngineStores {
        grants: Arc::new(InMemoryGrantRepository::default()),
        profiles: Arc::new(InMemoryProfileRepository::default()),
        activity: Arc::new(InMemoryActivityLog::default()),
        accounts: Arc::new(InMemoryAccountDirectory::default()),
        flags: Arc::new(flags.clone()),
        enforcement: Arc::new(InMemoryEnforcementRepository::default()),
        alerts: Arc::new(alerts.clone()),
        notifications: Arc::new(notifications.clone()),
    };
    let context = Arc::new(EngineContext::new(
        stores,
        clock.clone(),
        EngineConfig::default(),
    ));
    Harness {
        clock,
        context,
        alerts,
        flags,
        notifications,
    }
}

pub(super) fn heartbeat(_input: &RuleInput<'_>) -> Vec<Finding> {
    vec![Finding {
        employer_id: Some(EmployerId("emp-acme".to_string())),
        candidate_id: None,
        record_id: None,
        title: "Heartbeat".to_string(),
        detail: "always fires".to_string(),
        dedupe_key: "heartbeat".to_string(),
    }]
}

/// Points its notice action at an obligation that does not exist.
pub(super) fn dangling_record(_input: &RuleInput<'_>) -> Vec<Finding> {
    vec![Finding {
        employer_id: Some(EmployerId("emp-acme".to_string())),
        candidate_id: None,
        record_id: Some(uuid::Uuid::nil()),
        title: "Dangling".to_string(),
        detail: "no such record".to_string(),
        dedupe_key: "dangling".to_string(),
    }]
}

/// A dangling obligation first, then a finding whose action has nothing to fail on.
pub(super) fn dangling_then_heartbeat(input: &RuleInput<'_>) -> Vec<Finding> {
    let mut findings = dangling_record(input);
    findings.extend(heartbeat(input).into_iter().map(|finding| Finding {
        record_id: None,
        ..finding
    }));
    findings
}
