//! Swept-period and request-pattern bookkeeping
//!
//! [`SyncPeriod`] rows record which time windows a discovery pass has swept,
//! so the scheduler can tell when a previously-synced window has gone stale.
//! [`RequestPattern`] rows record what callers asked for and how stale the
//! served data was, feeding adaptive background scheduling.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A time window `[start, end)` that has been swept by a discovery pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Conversations seen by the discovery pass
    pub total_conversations: usize,
    /// Of those, conversations not previously in the mirror
    pub new_conversations: usize,
    /// Of those, conversations already mirrored but updated remotely
    pub updated_conversations: usize,
    pub last_synced_at: DateTime<Utc>,
}

impl SyncPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            total_conversations: 0,
            new_conversations: 0,
            updated_conversations: 0,
            last_synced_at: Utc::now(),
        }
    }

    /// Whether this period was last swept longer than `max_age` ago
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_synced_at > max_age
    }
}

/// One caller read request, recorded for adaptive scheduling. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPattern {
    /// Requested window start (None for windowless reads)
    pub window_start: Option<DateTime<Utc>>,
    /// Requested window end (None for windowless reads)
    pub window_end: Option<DateTime<Utc>>,
    /// How stale the served data was, in seconds (i64::MAX if never synced)
    pub data_freshness_seconds: i64,
    /// Whether the request triggered a synchronous sync
    pub sync_triggered: bool,
    pub requested_at: DateTime<Utc>,
}
