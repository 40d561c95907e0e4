//! Schedule monitor: promotes due `Scheduled` campaigns into sending.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use broadcast_core::clock::Clock;
use broadcast_core::types::CampaignId;

use crate::engine::DeliveryEngine;

/// Periodically scans for scheduled campaigns whose time has come and hands
/// them to the [`DeliveryEngine`].
///
/// Only campaigns still in `Scheduled` are picked up, so a campaign that has
/// already been started is never started twice.
#[derive(Debug, Clone)]
pub struct ScheduleMonitor {
    engine: DeliveryEngine,
    interval: Duration,
}

impl ScheduleMonitor {
    pub fn new(engine: DeliveryEngine, interval: Duration) -> Self {
        Self { engine, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One scan pass over a snapshot of scheduled campaign ids. Returns the
    /// campaigns that were started.
    pub fn scan(&self, now: DateTime<Utc>) -> Vec<CampaignId> {
        let due: Vec<CampaignId> = self
            .engine
            .store()
            .scheduled_campaigns()
            .into_iter()
            .filter(|(_, at)| *at <= now)
            .map(|(id, _)| id)
            .collect();

        let mut started = Vec::with_capacity(due.len());
        for id in due {
            match self.engine.start(&id) {
                Ok(()) => {
                    info!(campaign_id = %id, "Scheduled campaign is due, started sending");
                    started.push(id);
                }
                Err(e) => warn!(campaign_id = %id, error = %e, "Failed to start scheduled campaign"),
            }
        }
        started
    }

    /// Runs [`scan`](Self::scan) on a fixed interval using `clock`, until
    /// `shutdown` flips to `true` or its sender is dropped. The first scan
    /// happens immediately.
    pub fn spawn(
        self,
        clock: Arc<dyn Clock>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = self.interval.as_secs(), "Schedule monitor running");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let started = self.scan(clock.now());
                        debug!(started = started.len(), "Schedule scan complete");
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Schedule monitor stopped");
        })
    }
}
