//! Freshness classification for mirror reads
//!
//! Pure functions over the last completed sync time, testable without
//! storage or clocks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How current the mirror is relative to a requested window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// No sync has ever completed, or the last sync predates the requested
    /// window. A read should sync synchronously before answering.
    Stale,
    /// The last sync falls inside the requested window. Reads proceed
    /// immediately but are annotated as incomplete.
    Partial,
    /// The last sync is within the freshness threshold of the window end.
    Fresh,
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stale => f.write_str("stale"),
            Self::Partial => f.write_str("partial"),
            Self::Fresh => f.write_str("fresh"),
        }
    }
}

/// Result of a freshness evaluation, returned to callers by the engine
#[derive(Debug, Clone)]
pub struct FreshnessReport {
    pub freshness: Freshness,
    /// Last completed sync time known at evaluation
    pub last_sync: Option<DateTime<Utc>>,
    /// Age of the served data in seconds (i64::MAX if never synced)
    pub data_freshness_seconds: i64,
    /// Whether this evaluation triggered a synchronous sync
    pub sync_triggered: bool,
}

/// Classify the mirror's state relative to a requested window `[start, end)`.
///
/// Tie-break: `last_sync == start` counts as Partial, not Stale; the
/// inclusive lower bound avoids redundant re-syncs at the boundary.
/// Without a window the classification is binary fresh/partial against
/// `now - threshold` (never-synced still classifies as Stale).
pub fn classify(
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    last_sync: Option<DateTime<Utc>>,
    threshold: Duration,
    now: DateTime<Utc>,
) -> Freshness {
    let Some(last_sync) = last_sync else {
        return Freshness::Stale;
    };

    match window {
        Some((start, end)) => {
            if last_sync < start {
                Freshness::Stale
            } else if last_sync >= end - threshold {
                Freshness::Fresh
            } else {
                Freshness::Partial
            }
        }
        None => {
            if last_sync >= now - threshold {
                Freshness::Fresh
            } else {
                Freshness::Partial
            }
        }
    }
}

/// Evaluate a read request into a full [`FreshnessReport`]
pub fn evaluate(
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    last_sync: Option<DateTime<Utc>>,
    threshold: Duration,
    now: DateTime<Utc>,
) -> FreshnessReport {
    let freshness = classify(window, last_sync, threshold, now);
    let data_freshness_seconds = match last_sync {
        Some(t) => (now - t).num_seconds(),
        None => i64::MAX,
    };

    FreshnessReport {
        freshness,
        last_sync,
        data_freshness_seconds,
        sync_triggered: false,
    }
}
