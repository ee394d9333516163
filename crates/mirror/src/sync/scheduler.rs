//! Background scheduler
//!
//! A single spawned task wakes on a fixed interval and runs up to
//! `max_runs_per_tick` background sweeps, chosen by priority: windows
//! callers recently asked for and got stale data, then previously-swept
//! periods that have gone stale, then a fallback top-up of the most recent
//! hours. Errors during a tick are logged and swallowed; the next tick
//! starts clean.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::sync::engine::SyncEngine;

pub struct BackgroundScheduler {
    engine: Arc<SyncEngine>,
    config: SyncConfig,
}

impl BackgroundScheduler {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        let config = engine.config().clone();
        Self { engine, config }
    }

    /// Spawn the scheduler loop. It runs until `shutdown` flips to true or
    /// the sender side is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.scheduler_interval();
        info!("Background scheduler started (interval {:?})", interval);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick().await {
                        warn!("Scheduler tick failed: {:#}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Background scheduler stopped");
    }

    /// One scheduling pass. Normally driven by the interval loop in
    /// [`BackgroundScheduler::spawn`]; callable directly to force a sweep.
    pub async fn tick(&self) -> Result<()> {
        if self.engine.is_active() {
            debug!("Skipping scheduler tick, a sync is already running");
            return Ok(());
        }

        let mut windows = self.pick_windows()?;
        windows.truncate(self.config.max_runs_per_tick);

        for (start, end) in windows {
            match self.engine.background_sync(start, end).await {
                Ok(stats) => debug!(
                    "Background sweep of [{}, {}): {} discovered, {} fetched",
                    start, end, stats.discovered, stats.fetched
                ),
                // A failed sweep is retried naturally on a later tick
                Err(e) => warn!("Background sweep of [{}, {}) failed: {:#}", start, end, e),
            }
        }

        Ok(())
    }

    /// Candidate windows in priority order: demand first, then staleness,
    /// then a top-up of the recent past so an idle mirror still advances.
    fn pick_windows(&self) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let store = self.engine.store();
        let limit = self.config.max_runs_per_tick;

        let windows = store.stale_timeframes(self.config.stale_timeframe_threshold(), limit)?;
        if !windows.is_empty() {
            return Ok(windows);
        }

        let periods = store.periods_needing_sync(self.config.period_staleness(), limit)?;
        if !periods.is_empty() {
            return Ok(periods.into_iter().map(|p| (p.start, p.end)).collect());
        }

        let now = Utc::now();
        Ok(vec![(now - self.config.fallback_topup(), now)])
    }
}
