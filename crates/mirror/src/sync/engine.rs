//! Engine facade
//!
//! [`SyncEngine`] is the single entry point callers use: freshness-gated
//! reads ([`SyncEngine::sync_if_needed`]), explicit foreground syncs
//! ([`SyncEngine::trigger_sync`]), and background sweeps driven by the
//! scheduler. Foreground syncs are single-flight; a second caller is
//! rejected immediately rather than queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::limiter::RateLimiter;
use crate::models::RequestPattern;
use crate::remote::RemoteClient;
use crate::store::ConversationStore;
use crate::sync::coordinator::{SyncCoordinator, SyncOptions, SyncStats};
use crate::sync::freshness::{self, Freshness, FreshnessReport};

/// Snapshot of engine activity for status displays
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub active: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_stats: Option<SyncStats>,
}

pub struct SyncEngine {
    store: Arc<dyn ConversationStore>,
    coordinator: SyncCoordinator,
    config: SyncConfig,
    /// Guards foreground single-flight; background sweeps bypass it
    foreground_active: AtomicBool,
    /// Counts every running sync, foreground or background
    active_runs: AtomicUsize,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    last_stats: Mutex<Option<SyncStats>>,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        store: Arc<dyn ConversationStore>,
        limiter: Arc<RateLimiter>,
        config: SyncConfig,
    ) -> Self {
        let coordinator =
            SyncCoordinator::new(remote, store.clone(), limiter, config.clone());
        Self {
            store,
            coordinator,
            config,
            foreground_active: AtomicBool::new(false),
            active_runs: AtomicUsize::new(0),
            last_sync: Mutex::new(None),
            last_stats: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether any sync (foreground or background) is currently running
    pub fn is_active(&self) -> bool {
        self.active_runs.load(Ordering::SeqCst) > 0
    }

    /// Evaluate freshness for a read over `window` and sync synchronously
    /// only if the mirror is Stale. Partial and Fresh classifications
    /// return immediately; background sweeps handle the catch-up.
    pub async fn sync_if_needed(
        &self,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<FreshnessReport, SyncError> {
        let now = Utc::now();
        let last_sync = self.last_sync_time().await?;
        let mut report =
            freshness::evaluate(window, last_sync, self.config.freshness_threshold(), now);

        if report.freshness != Freshness::Stale {
            debug!(
                "Mirror is {} for {:?}, serving local data",
                report.freshness, window
            );
            self.record_pattern(&report, window, now);
            return Ok(report);
        }

        report.sync_triggered = true;
        self.record_pattern(&report, window, now);

        let (start, end) = window.unwrap_or((now - self.config.fallback_topup(), now));
        match self.foreground_sync(start, end, SyncOptions::default()).await {
            Ok(_) => {
                report.last_sync = Some(Utc::now());
                report.data_freshness_seconds = 0;
                Ok(report)
            }
            Err(e) => Err(SyncError::stale_sync_failed(
                report.freshness,
                last_sync,
                e,
            )),
        }
    }

    /// Explicit foreground sync of one window. Rejected with
    /// [`SyncError::ConcurrentSyncRejected`] if a foreground sync is
    /// already running.
    pub async fn trigger_sync(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: SyncOptions,
    ) -> Result<SyncStats, SyncError> {
        self.foreground_sync(start, end, options).await
    }

    /// Scheduler-driven sweep. Bypasses the foreground single-flight guard
    /// so a long-running user sync never starves background catch-up.
    pub async fn background_sync(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SyncStats, SyncError> {
        self.run_counted(start, end, SyncOptions::default()).await
    }

    pub async fn status(&self) -> EngineStatus {
        EngineStatus {
            active: self.is_active(),
            last_sync_time: *self.last_sync.lock().await,
            last_stats: self.last_stats.lock().await.clone(),
        }
    }

    async fn foreground_sync(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: SyncOptions,
    ) -> Result<SyncStats, SyncError> {
        if self
            .foreground_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::ConcurrentSyncRejected);
        }

        let result = self.run_counted(start, end, options).await;
        self.foreground_active.store(false, Ordering::SeqCst);
        result
    }

    async fn run_counted(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: SyncOptions,
    ) -> Result<SyncStats, SyncError> {
        self.active_runs.fetch_add(1, Ordering::SeqCst);
        let result = self.coordinator.run(start, end, options).await;
        self.active_runs.fetch_sub(1, Ordering::SeqCst);

        if let Ok(stats) = &result {
            *self.last_sync.lock().await = Some(Utc::now());
            *self.last_stats.lock().await = Some(stats.clone());
        }
        result
    }

    /// In-memory last sync time, bootstrapped from the store's sync-period
    /// history on first use so freshness survives restarts
    async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        let mut guard = self.last_sync.lock().await;
        if guard.is_none() {
            *guard = self.store.latest_sync_time()?;
        }
        Ok(*guard)
    }

    /// Request-pattern rows feed adaptive scheduling; a failed write is
    /// logged, never surfaced to the reader.
    fn record_pattern(
        &self,
        report: &FreshnessReport,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        now: DateTime<Utc>,
    ) {
        let pattern = RequestPattern {
            window_start: window.map(|(s, _)| s),
            window_end: window.map(|(_, e)| e),
            data_freshness_seconds: report.data_freshness_seconds,
            sync_triggered: report.sync_triggered,
            requested_at: now,
        };
        if let Err(e) = self.store.record_request_pattern(&pattern) {
            warn!("Failed to record request pattern: {:#}", e);
        }
    }
}
