//! Typed errors surfaced by the sync engine
//!
//! Rate limiting is never an error: the limiter absorbs it by delaying the
//! call. A partially-failed fetch phase is not an error either; the run
//! succeeds with a non-empty `failed_ids` list in its stats.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::sync::Freshness;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote API could not be reached or rejected our credentials.
    /// Surfaced to the caller on a synchronous stale-triggered sync;
    /// logged and retried on the next background tick otherwise.
    #[error("remote API unavailable: {0}")]
    RemoteUnavailable(String),

    /// A foreground sync was requested while another foreground sync was
    /// active. Never queued or retried; the caller decides what to do.
    #[error("a sync is already in progress")]
    ConcurrentSyncRejected,

    /// A synchronous stale-triggered sync failed. Carries the freshness
    /// classification and last-known-good sync time so the caller can
    /// choose between serving stale data and aborting.
    #[error("sync failed with {freshness} mirror (last good sync: {last_sync:?}): {source}")]
    StaleSyncFailed {
        freshness: Freshness,
        last_sync: Option<DateTime<Utc>>,
        #[source]
        source: Box<SyncError>,
    },

    /// Local store failure
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    /// Wrap a sync failure that happened while answering a stale read
    pub fn stale_sync_failed(
        freshness: Freshness,
        last_sync: Option<DateTime<Utc>>,
        source: SyncError,
    ) -> Self {
        Self::StaleSyncFailed {
            freshness,
            last_sync,
            source: Box::new(source),
        }
    }
}
