//! Process-wide wiring. The entry point builds one [`EngineContext`] and hands it to the
//! router and the scheduler; nothing in the engine reaches for globals.

use std::sync::Arc;

use crate::access::{AccessLedger, DisclosureService, GrantRepository, ProfileRepository};
use crate::accounts::AccountDirectory;
use crate::activity::ActivityLog;
use crate::alerts::{AlertEngine, AlertRepository, NotificationSink};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::detection::PatternDetector;
use crate::enforcement::{EnforcementLedger, EnforcementRepository};
use crate::monitoring::{ActivityMonitor, FlagRepository};
use crate::scheduler::Scheduler;
use crate::store::memory::{
    InMemoryAccountDirectory, InMemoryActivityLog, InMemoryAlertRepository,
    InMemoryEnforcementRepository, InMemoryFlagRepository, InMemoryGrantRepository,
    InMemoryNotificationSink, InMemoryProfileRepository,
};

/// Every persistence and delivery collaborator the engine consumes.
#[derive(Clone)]
pub struct EngineStores {
    pub grants: Arc<dyn GrantRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub activity: Arc<dyn ActivityLog>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub flags: Arc<dyn FlagRepository>,
    pub enforcement: Arc<dyn EnforcementRepository>,
    pub alerts: Arc<dyn AlertRepository>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl EngineStores {
    pub fn in_memory() -> Self {
        Self {
            grants: Arc::new(InMemoryGrantRepository::default()),
            profiles: Arc::new(InMemoryProfileRepository::default()),
            activity: Arc::new(InMemoryActivityLog::default()),
            accounts: Arc::new(InMemoryAccountDirectory::default()),
            flags: Arc::new(InMemoryFlagRepository::default()),
            enforcement: Arc::new(InMemoryEnforcementRepository::default()),
            alerts: Arc::new(InMemoryAlertRepository::default()),
            notifications: Arc::new(InMemoryNotificationSink::default()),
        }
    }
}

pub struct EngineContext {
    pub clock: Arc<dyn Clock>,
    pub detector: Arc<PatternDetector>,
    pub ledger: Arc<AccessLedger>,
    pub enforcement: Arc<EnforcementLedger>,
    pub alerts: Arc<AlertEngine>,
    pub monitor: Arc<ActivityMonitor>,
    pub disclosure: Arc<DisclosureService>,
    pub scheduler: Arc<Scheduler>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub accounts: Arc<dyn AccountDirectory>,
}

impl EngineContext {
    /// Build the component graph in dependency order: ledger, enforcement, alerts,
    /// monitor, disclosure.
    pub fn new(stores: EngineStores, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let detector = Arc::new(PatternDetector::default());
        let ledger = Arc::new(AccessLedger::new(stores.grants.clone(), clock.clone()));
        let enforcement = Arc::new(EnforcementLedger::new(
            stores.enforcement.clone(),
            ledger.clone(),
            clock.clone(),
            config.enforcement,
        ));
        let alerts = Arc::new(AlertEngine::new(
            stores.alerts.clone(),
            stores.notifications.clone(),
            ledger.clone(),
            enforcement.clone(),
            stores.flags.clone(),
            stores.accounts.clone(),
            clock.clone(),
        ));
        let monitor = Arc::new(ActivityMonitor::new(
            detector.clone(),
            ledger.clone(),
            stores.activity.clone(),
            stores.flags.clone(),
            stores.accounts.clone(),
            enforcement.clone(),
            alerts.clone(),
            clock.clone(),
            config.monitor,
        ));
        let disclosure = Arc::new(DisclosureService::new(
            ledger.clone(),
            stores.profiles.clone(),
            stores.accounts.clone(),
            monitor.clone(),
            detector.clone(),
            clock.clone(),
            config.disclosure,
        ));
        let scheduler = Arc::new(Scheduler::new(alerts.clone(), monitor.clone(), clock.clone()));

        Self {
            clock,
            detector,
            ledger,
            enforcement,
            alerts,
            monitor,
            disclosure,
            scheduler,
            profiles: stores.profiles,
            accounts: stores.accounts,
        }
    }

    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(EngineStores::in_memory(), Arc::new(SystemClock), config)
    }
}
