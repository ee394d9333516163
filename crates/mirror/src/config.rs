//! Engine configuration
//!
//! [`SyncConfig`] tunes the engine; every field has a usable default so an
//! empty config file works. [`RemoteCredentials`] are loaded separately
//! (JSON file first, environment variables as fallback) so tuning values
//! never live next to secrets.

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;

/// Config filename in the mirror config directory
const SYNC_CONFIG_FILE: &str = "sync.json";

/// Credentials filename in the mirror config directory
const CREDENTIALS_FILE: &str = "remote-credentials.json";

/// Tuning knobs for the sync engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reads are Fresh if the last sync is within this many minutes of the
    /// requested window end
    pub freshness_threshold_minutes: i64,
    /// Sliding-window rate limit: calls allowed per window
    pub rate_limit_max_calls: usize,
    /// Sliding-window rate limit: window length in seconds
    pub rate_limit_window_secs: u64,
    /// Parallel per-conversation detail fetches within a batch
    pub max_concurrent_fetches: usize,
    /// Conversations per fetch batch
    pub fetch_batch_size: usize,
    /// Background scheduler wake-up interval in seconds
    pub scheduler_interval_secs: u64,
    /// Coordinator runs allowed per scheduler wake-up
    pub max_runs_per_tick: usize,
    /// A conversation needs a full re-sync after this many hours
    pub full_staleness_hours: i64,
    /// A conversation needs an incremental sync after this many minutes
    pub incremental_staleness_minutes: i64,
    /// Failed conversations are not retried within this many hours
    pub error_backoff_hours: i64,
    /// A swept period is re-swept after this many minutes
    pub period_staleness_minutes: i64,
    /// Request-pattern windows older than this many minutes count as stale
    pub stale_timeframe_threshold_minutes: i64,
    /// Width of the fallback top-up sweep in hours
    pub fallback_topup_hours: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            freshness_threshold_minutes: 5,
            rate_limit_max_calls: 10,
            rate_limit_window_secs: 60,
            max_concurrent_fetches: 5,
            fetch_batch_size: 10,
            scheduler_interval_secs: 600,
            max_runs_per_tick: 2,
            full_staleness_hours: 24,
            incremental_staleness_minutes: 30,
            error_backoff_hours: 2,
            period_staleness_minutes: 60,
            stale_timeframe_threshold_minutes: 30,
            fallback_topup_hours: 2,
        }
    }
}

impl SyncConfig {
    /// Load from ~/.config/mirror/sync.json, falling back to defaults when
    /// the file is missing
    pub fn load() -> Result<Self> {
        if config::config_exists(SYNC_CONFIG_FILE) {
            config::load_json(SYNC_CONFIG_FILE).context("Failed to load sync config")
        } else {
            Ok(Self::default())
        }
    }

    /// Write the current values to ~/.config/mirror/sync.json, creating the
    /// config directory if needed
    pub fn save(&self) -> Result<()> {
        config::save_json(SYNC_CONFIG_FILE, self).context("Failed to save sync config")
    }

    pub fn freshness_threshold(&self) -> Duration {
        Duration::minutes(self.freshness_threshold_minutes)
    }

    pub fn rate_limit_window(&self) -> StdDuration {
        StdDuration::from_secs(self.rate_limit_window_secs)
    }

    pub fn scheduler_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.scheduler_interval_secs)
    }

    pub fn full_staleness(&self) -> Duration {
        Duration::hours(self.full_staleness_hours)
    }

    pub fn incremental_staleness(&self) -> Duration {
        Duration::minutes(self.incremental_staleness_minutes)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::hours(self.error_backoff_hours)
    }

    pub fn period_staleness(&self) -> Duration {
        Duration::minutes(self.period_staleness_minutes)
    }

    pub fn stale_timeframe_threshold(&self) -> Duration {
        Duration::minutes(self.stale_timeframe_threshold_minutes)
    }

    pub fn fallback_topup(&self) -> Duration {
        Duration::hours(self.fallback_topup_hours)
    }
}

/// Access credentials for the remote conversation API
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCredentials {
    pub base_url: String,
    pub access_token: String,
}

impl RemoteCredentials {
    /// Load credentials using the following priority:
    /// 1. JSON file (~/.config/mirror/remote-credentials.json)
    /// 2. Runtime environment variables (MIRROR_API_URL, MIRROR_API_TOKEN)
    pub fn load() -> Result<Self> {
        if config::config_exists(CREDENTIALS_FILE) {
            return config::load_json(CREDENTIALS_FILE)
                .context("Failed to load remote credentials");
        }

        let base_url = std::env::var("MIRROR_API_URL")
            .context("No credentials file and MIRROR_API_URL is not set")?;
        let access_token = std::env::var("MIRROR_API_TOKEN")
            .context("No credentials file and MIRROR_API_TOKEN is not set")?;

        Ok(Self {
            base_url,
            access_token,
        })
    }
}
