//! Per-conversation sync state tracking
//!
//! One [`ConversationSyncState`] row exists per conversation id, created
//! lazily on first sync attempt. The decision logic (does this conversation
//! need a full or incremental sync?) lives here as pure methods so it can be
//! tested without storage.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ConversationId;

/// Lifecycle status of a conversation's sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// State row exists but no sync has run yet
    Pending,
    /// A sync is currently running for this conversation
    InProgress,
    /// Last sync completed successfully
    Completed,
    /// Last sync failed
    Failed,
    /// Shallow data stored, complete thread not yet fetched
    Partial,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "partial" => Self::Partial,
            _ => Self::Pending,
        }
    }
}

/// Kind of sync attempt recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptType {
    Full,
    Incremental,
}

impl AttemptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "full" => Self::Full,
            _ => Self::Incremental,
        }
    }
}

/// Sync bookkeeping for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSyncState {
    pub conversation_id: ConversationId,
    /// When the last full (complete-thread) sync finished
    pub last_full_sync: Option<DateTime<Utc>>,
    /// When the last incremental sync finished
    pub last_incremental_sync: Option<DateTime<Utc>>,
    /// When a sync was last attempted, successful or not
    pub last_attempt: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    /// Consecutive failures since the last success
    pub error_count: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    /// How complete the mirrored thread is (0.0 - 100.0)
    pub completion_pct: f32,
}

impl ConversationSyncState {
    /// Create a fresh state row for a conversation with no sync history
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            last_full_sync: None,
            last_incremental_sync: None,
            last_attempt: None,
            status: SyncStatus::Pending,
            error_count: 0,
            last_error: None,
            last_error_at: None,
            completion_pct: 0.0,
        }
    }

    /// A full sync is needed if one never completed, the last one is older
    /// than `staleness`, or the conversation is currently in failed status.
    pub fn needs_full_sync(&self, staleness: Duration, now: DateTime<Utc>) -> bool {
        if self.status == SyncStatus::Failed {
            return true;
        }
        match self.last_full_sync {
            None => true,
            Some(t) => now - t > staleness,
        }
    }

    /// An incremental sync is needed if the incremental timestamp is missing
    /// or stale, the conversation is not already being synced, and errors
    /// (if any) are older than the retry backoff window.
    pub fn needs_incremental_sync(
        &self,
        staleness: Duration,
        error_backoff: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        if self.status == SyncStatus::InProgress {
            return false;
        }

        let stale = match self.last_incremental_sync {
            None => true,
            Some(t) => now - t > staleness,
        };
        if !stale {
            return false;
        }

        match (self.error_count, self.last_error_at) {
            (0, _) => true,
            (_, Some(at)) => now - at > error_backoff,
            (_, None) => true,
        }
    }

    /// Transition into `InProgress` for a new attempt
    pub fn start_attempt(&mut self, now: DateTime<Utc>) {
        self.status = SyncStatus::InProgress;
        self.last_attempt = Some(now);
    }

    /// Record a successful sync of the given kind, clearing error tracking
    pub fn complete(&mut self, attempt: AttemptType, now: DateTime<Utc>) {
        match attempt {
            AttemptType::Full => self.last_full_sync = Some(now),
            AttemptType::Incremental => self.last_incremental_sync = Some(now),
        }
        self.status = SyncStatus::Completed;
        self.error_count = 0;
        self.last_error = None;
        self.last_error_at = None;
        self.completion_pct = 100.0;
    }

    /// Record a failed sync. Prior progress timestamps and completion are
    /// preserved; only the error bookkeeping advances.
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = SyncStatus::Failed;
        self.error_count += 1;
        self.last_error = Some(error.into());
        self.last_error_at = Some(now);
    }

    /// Record that only shallow (discovery) data is stored so far
    pub fn mark_partial(&mut self, now: DateTime<Utc>) {
        self.status = SyncStatus::Partial;
        self.last_attempt = Some(now);
        if self.completion_pct < 50.0 {
            self.completion_pct = 50.0;
        }
    }

    /// The most recent successful sync of either kind, used for
    /// oldest-first candidate ordering.
    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        match (self.last_full_sync, self.last_incremental_sync) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// One append-only audit row per sync attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncAttempt {
    pub conversation_id: ConversationId,
    pub attempt_type: AttemptType,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub messages_before: usize,
    pub messages_after: usize,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ConversationSyncState {
        ConversationSyncState::new(ConversationId::new("c1"))
    }

    #[test]
    fn test_fresh_state_needs_full_sync() {
        let now = Utc::now();
        assert!(state().needs_full_sync(Duration::hours(24), now));
    }

    #[test]
    fn test_recent_full_sync_not_needed() {
        let now = Utc::now();
        let mut s = state();
        s.complete(AttemptType::Full, now - Duration::hours(1));
        assert!(!s.needs_full_sync(Duration::hours(24), now));
        assert!(s.needs_full_sync(Duration::minutes(30), now));
    }

    #[test]
    fn test_failed_status_always_needs_full_sync() {
        let now = Utc::now();
        let mut s = state();
        s.complete(AttemptType::Full, now);
        s.fail("boom", now);
        assert!(s.needs_full_sync(Duration::hours(24), now));
    }

    #[test]
    fn test_incremental_blocked_while_in_progress() {
        let now = Utc::now();
        let mut s = state();
        s.start_attempt(now);
        assert!(!s.needs_incremental_sync(Duration::minutes(30), Duration::hours(2), now));
    }

    #[test]
    fn test_incremental_backoff_after_failure() {
        let now = Utc::now();
        let mut s = state();
        s.fail("remote unavailable", now);

        // Inside the backoff window: no retry
        assert!(!s.needs_incremental_sync(Duration::minutes(30), Duration::hours(2), now));

        // After the backoff window elapses: retry allowed
        let later = now + Duration::hours(2) + Duration::seconds(1);
        assert!(s.needs_incremental_sync(Duration::minutes(30), Duration::hours(2), later));
    }

    #[test]
    fn test_fail_preserves_progress() {
        let now = Utc::now();
        let mut s = state();
        s.complete(AttemptType::Full, now);
        s.fail("boom", now);

        assert_eq!(s.last_full_sync, Some(now));
        assert_eq!(s.completion_pct, 100.0);
        assert_eq!(s.error_count, 1);

        s.fail("boom again", now);
        assert_eq!(s.error_count, 2);
    }

    #[test]
    fn test_complete_clears_errors() {
        let now = Utc::now();
        let mut s = state();
        s.fail("boom", now);
        s.complete(AttemptType::Incremental, now);

        assert_eq!(s.error_count, 0);
        assert!(s.last_error.is_none());
        assert_eq!(s.status, SyncStatus::Completed);
    }

    #[test]
    fn test_last_synced_picks_most_recent() {
        let now = Utc::now();
        let mut s = state();
        assert!(s.last_synced().is_none());

        s.last_full_sync = Some(now - Duration::hours(2));
        s.last_incremental_sync = Some(now - Duration::hours(1));
        assert_eq!(s.last_synced(), Some(now - Duration::hours(1)));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            SyncStatus::Pending,
            SyncStatus::InProgress,
            SyncStatus::Completed,
            SyncStatus::Failed,
            SyncStatus::Partial,
        ] {
            assert_eq!(SyncStatus::parse(status.as_str()), status);
        }
    }
}
