use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::alerts::{AlertEngine, SweepReport, Trigger};
use crate::clock::Clock;
use crate::monitoring::ActivityMonitor;

/// What one scheduler tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    pub inactivity_flags: usize,
    pub sweeps: Vec<SweepReport>,
}

/// Fixed-interval driver for the hourly, daily and weekly sweeps.
///
/// Each trigger class keeps its own last-run time. A sweep that fails is not marked as
/// run, so the next tick retries it.
pub struct Scheduler {
    engine: Arc<AlertEngine>,
    monitor: Arc<ActivityMonitor>,
    clock: Arc<dyn Clock>,
    last_run: Mutex<HashMap<Trigger, DateTime<Utc>>>,
}

impl Scheduler {
    pub fn new(engine: Arc<AlertEngine>, monitor: Arc<ActivityMonitor>, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            monitor,
            clock,
            last_run: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_due(&self, trigger: Trigger, now: DateTime<Utc>) -> bool {
        let Some(interval) = trigger.interval() else {
            return false;
        };
        let last_run = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
        last_run
            .get(&trigger)
            .map_or(true, |previous| now - *previous >= interval)
    }

    pub fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let mut report = TickReport {
            at: now,
            inactivity_flags: 0,
            sweeps: Vec::new(),
        };

        for trigger in Trigger::scheduled() {
            if !self.is_due(trigger, now) {
                continue;
            }
            if trigger == Trigger::Hourly {
                match self.monitor.sweep_inactivity(now) {
                    Ok(flags) => report.inactivity_flags = flags.len(),
                    Err(err) => error!(error = %err, "inactivity sweep failed"),
                }
            }
            match self.engine.run_sweep(trigger) {
                Ok(sweep) => {
                    self.last_run
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(trigger, now);
                    report.sweeps.push(sweep);
                }
                Err(err) => error!(trigger = trigger.label(), error = %err, "sweep failed"),
            }
        }
        report
    }

    /// Tick forever on a tokio interval.
    pub async fn run(self: Arc<Self>, every: std::time::Duration) {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let report = self.tick();
            debug!(
                sweeps = report.sweeps.len(),
                inactivity_flags = report.inactivity_flags,
                "scheduler tick"
            );
        }
    }
}
