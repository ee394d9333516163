//! Per-conversation sync tracking over the store
//!
//! [`SyncTracker`] wraps the store's sync-state rows and the pure decision
//! logic in [`ConversationSyncState`]. State rows are created lazily on the
//! first attempt for a conversation; deletion happens only through an
//! explicit [`SyncTracker::reset`].

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::config::SyncConfig;
use crate::models::{AttemptType, ConversationId, ConversationSyncState, SyncAttempt, SyncStatus};
use crate::store::ConversationStore;

#[derive(Clone)]
pub struct SyncTracker {
    store: Arc<dyn ConversationStore>,
    full_staleness: Duration,
    incremental_staleness: Duration,
    error_backoff: Duration,
}

impl SyncTracker {
    pub fn new(store: Arc<dyn ConversationStore>, config: &SyncConfig) -> Self {
        Self {
            store,
            full_staleness: config.full_staleness(),
            incremental_staleness: config.incremental_staleness(),
            error_backoff: config.error_backoff(),
        }
    }

    fn load_or_new(&self, id: &ConversationId) -> Result<ConversationSyncState> {
        Ok(self
            .store
            .get_sync_state(id)?
            .unwrap_or_else(|| ConversationSyncState::new(id.clone())))
    }

    /// Whether a complete-thread sync is due for this conversation.
    /// A conversation with no state row always needs one.
    pub fn needs_full_sync(&self, id: &ConversationId) -> Result<bool> {
        let now = Utc::now();
        match self.store.get_sync_state(id)? {
            Some(state) => Ok(state.needs_full_sync(self.full_staleness, now)),
            None => Ok(true),
        }
    }

    /// Whether an incremental sync is due, honoring in-progress exclusion
    /// and post-failure backoff.
    pub fn needs_incremental_sync(&self, id: &ConversationId) -> Result<bool> {
        let now = Utc::now();
        match self.store.get_sync_state(id)? {
            Some(state) => {
                Ok(state.needs_incremental_sync(self.incremental_staleness, self.error_backoff, now))
            }
            None => Ok(true),
        }
    }

    /// True while a failed conversation is inside its retry backoff window
    pub fn in_error_backoff(&self, id: &ConversationId, now: DateTime<Utc>) -> Result<bool> {
        match self.store.get_sync_state(id)? {
            Some(state) => match (state.error_count, state.last_error_at) {
                (0, _) => Ok(false),
                (_, Some(at)) => Ok(now - at <= self.error_backoff),
                (_, None) => Ok(false),
            },
            None => Ok(false),
        }
    }

    /// Mark a sync attempt as started (status becomes `InProgress`)
    pub fn mark_started(&self, id: &ConversationId) -> Result<()> {
        let mut state = self.load_or_new(id)?;
        state.start_attempt(Utc::now());
        self.store.save_sync_state(&state)
    }

    /// Record a successful sync and append an audit row
    pub fn mark_completed(
        &self,
        id: &ConversationId,
        attempt_type: AttemptType,
        messages_before: usize,
        messages_after: usize,
    ) -> Result<()> {
        let now = Utc::now();
        let mut state = self.load_or_new(id)?;
        let started_at = state.last_attempt.unwrap_or(now);
        state.complete(attempt_type, now);
        self.store.save_sync_state(&state)?;

        self.store.record_sync_attempt(&SyncAttempt {
            conversation_id: id.clone(),
            attempt_type,
            status: SyncStatus::Completed,
            started_at,
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
            messages_before,
            messages_after,
            error: None,
        })
    }

    /// Record a failed sync and append an audit row. Prior sync timestamps
    /// survive; the consecutive error count advances.
    pub fn mark_failed(
        &self,
        id: &ConversationId,
        attempt_type: AttemptType,
        error: &str,
    ) -> Result<()> {
        let now = Utc::now();
        let mut state = self.load_or_new(id)?;
        let started_at = state.last_attempt.unwrap_or(now);
        state.fail(error, now);
        self.store.save_sync_state(&state)?;

        self.store.record_sync_attempt(&SyncAttempt {
            conversation_id: id.clone(),
            attempt_type,
            status: SyncStatus::Failed,
            started_at,
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
            messages_before: 0,
            messages_after: 0,
            error: Some(error.to_string()),
        })
    }

    /// Record that only shallow discovery data is stored for this
    /// conversation
    pub fn mark_partial(&self, id: &ConversationId) -> Result<()> {
        let mut state = self.load_or_new(id)?;
        state.mark_partial(Utc::now());
        self.store.save_sync_state(&state)
    }

    /// Conversations most in need of syncing: never-synced first, then
    /// oldest successful sync first
    pub fn candidates(&self, limit: usize) -> Result<Vec<ConversationId>> {
        self.store.sync_candidates(limit)
    }

    /// Drop all tracked state for a conversation so the next sync treats it
    /// as brand new
    pub fn reset(&self, id: &ConversationId) -> Result<()> {
        self.store.reset_sync_state(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryConversationStore;

    fn tracker() -> (SyncTracker, Arc<InMemoryConversationStore>) {
        let store = Arc::new(InMemoryConversationStore::new());
        let tracker = SyncTracker::new(store.clone(), &SyncConfig::default());
        (tracker, store)
    }

    #[test]
    fn test_unknown_conversation_needs_both_syncs() {
        let (tracker, _) = tracker();
        let id = ConversationId::new("c1");
        assert!(tracker.needs_full_sync(&id).unwrap());
        assert!(tracker.needs_incremental_sync(&id).unwrap());
    }

    #[test]
    fn test_completed_sync_clears_need() {
        let (tracker, _) = tracker();
        let id = ConversationId::new("c1");

        tracker.mark_started(&id).unwrap();
        tracker
            .mark_completed(&id, AttemptType::Incremental, 1, 5)
            .unwrap();

        assert!(!tracker.needs_incremental_sync(&id).unwrap());
        // No full sync has completed yet
        assert!(tracker.needs_full_sync(&id).unwrap());
    }

    #[test]
    fn test_failure_enters_backoff() {
        let (tracker, store) = tracker();
        let id = ConversationId::new("c1");

        tracker.mark_started(&id).unwrap();
        tracker
            .mark_failed(&id, AttemptType::Incremental, "remote unavailable")
            .unwrap();

        assert!(!tracker.needs_incremental_sync(&id).unwrap());
        assert!(tracker.in_error_backoff(&id, Utc::now()).unwrap());

        // Age the failure past the backoff window
        let mut state = store.get_sync_state(&id).unwrap().unwrap();
        state.last_error_at = Some(Utc::now() - Duration::hours(3));
        store.save_sync_state(&state).unwrap();

        assert!(tracker.needs_incremental_sync(&id).unwrap());
        assert!(!tracker.in_error_backoff(&id, Utc::now()).unwrap());
    }

    #[test]
    fn test_success_after_failure_resets_errors() {
        let (tracker, store) = tracker();
        let id = ConversationId::new("c1");

        tracker.mark_started(&id).unwrap();
        tracker
            .mark_failed(&id, AttemptType::Incremental, "boom")
            .unwrap();
        tracker.mark_started(&id).unwrap();
        tracker
            .mark_completed(&id, AttemptType::Incremental, 1, 4)
            .unwrap();

        let state = store.get_sync_state(&id).unwrap().unwrap();
        assert_eq!(state.error_count, 0);
        assert_eq!(state.status, SyncStatus::Completed);
    }

    #[test]
    fn test_attempts_are_audited() {
        let (tracker, store) = tracker();
        let id = ConversationId::new("c1");

        tracker.mark_started(&id).unwrap();
        tracker
            .mark_failed(&id, AttemptType::Full, "boom")
            .unwrap();
        tracker.mark_started(&id).unwrap();
        tracker.mark_completed(&id, AttemptType::Full, 0, 3).unwrap();

        assert_eq!(store.attempt_count(), 2);
    }

    #[test]
    fn test_candidates_order_never_synced_first() {
        let (tracker, store) = tracker();
        let old = ConversationId::new("old");
        let fresh = ConversationId::new("fresh");
        let never = ConversationId::new("never");

        let mut state = ConversationSyncState::new(old.clone());
        state.complete(AttemptType::Incremental, Utc::now() - Duration::hours(5));
        store.save_sync_state(&state).unwrap();

        let mut state = ConversationSyncState::new(fresh.clone());
        state.complete(AttemptType::Incremental, Utc::now());
        store.save_sync_state(&state).unwrap();

        store
            .save_sync_state(&ConversationSyncState::new(never.clone()))
            .unwrap();

        let candidates = tracker.candidates(10).unwrap();
        assert_eq!(candidates, vec![never, old, fresh]);
    }

    #[test]
    fn test_reset_forgets_history() {
        let (tracker, _) = tracker();
        let id = ConversationId::new("c1");

        tracker.mark_started(&id).unwrap();
        tracker
            .mark_completed(&id, AttemptType::Incremental, 0, 2)
            .unwrap();
        assert!(!tracker.needs_incremental_sync(&id).unwrap());

        tracker.reset(&id).unwrap();
        assert!(tracker.needs_incremental_sync(&id).unwrap());
    }
}
