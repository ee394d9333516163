//! In-memory storage implementation
//!
//! Used for testing and as a reference implementation of the store
//! contracts. Uses HashMaps protected by RwLocks for thread-safe access.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use super::{ConversationStore, SearchFilters};
use crate::models::{
    Conversation, ConversationId, ConversationSyncState, RequestPattern, SyncAttempt, SyncPeriod,
};

/// In-memory implementation of [`ConversationStore`]
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
    periods: RwLock<HashMap<(DateTime<Utc>, DateTime<Utc>), SyncPeriod>>,
    patterns: RwLock<Vec<RequestPattern>>,
    sync_states: RwLock<HashMap<String, ConversationSyncState>>,
    attempts: RwLock<Vec<SyncAttempt>>,
}

impl InMemoryConversationStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded sync attempts (test observability)
    pub fn attempt_count(&self) -> usize {
        self.attempts.read().unwrap().len()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn store_conversations(&self, conversations: &[Conversation]) -> Result<usize> {
        let mut map = self.conversations.write().unwrap();
        for conv in conversations {
            map.insert(conv.id.0.clone(), conv.clone());
        }
        Ok(conversations.len())
    }

    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        Ok(self.conversations.read().unwrap().get(&id.0).cloned())
    }

    fn stored_message_count(&self, id: &ConversationId) -> Result<usize> {
        Ok(self
            .conversations
            .read()
            .unwrap()
            .get(&id.0)
            .map(|c| c.messages.len())
            .unwrap_or(0))
    }

    fn search_conversations(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Conversation>> {
        let map = self.conversations.read().unwrap();
        let mut results: Vec<Conversation> = map
            .values()
            .filter(|c| {
                filters.updated_after.is_none_or(|t| c.updated_at >= t)
                    && filters.updated_before.is_none_or(|t| c.updated_at < t)
                    && filters
                        .customer_email
                        .as_deref()
                        .is_none_or(|email| c.customer_email.as_deref() == Some(email))
                    && filters
                        .tag
                        .as_deref()
                        .is_none_or(|tag| c.tags.iter().any(|t| t == tag))
            })
            .cloned()
            .collect();

        results.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        results.truncate(limit);
        Ok(results)
    }

    fn count_conversations(&self) -> Result<usize> {
        Ok(self.conversations.read().unwrap().len())
    }

    fn count_messages(&self) -> Result<usize> {
        Ok(self
            .conversations
            .read()
            .unwrap()
            .values()
            .map(|c| c.messages.len())
            .sum())
    }

    fn record_sync_period(&self, period: &SyncPeriod) -> Result<()> {
        self.periods
            .write()
            .unwrap()
            .insert((period.start, period.end), period.clone());
        Ok(())
    }

    fn periods_needing_sync(&self, max_age: Duration, limit: usize) -> Result<Vec<SyncPeriod>> {
        let now = Utc::now();
        let periods = self.periods.read().unwrap();
        let mut stale: Vec<SyncPeriod> = periods
            .values()
            .filter(|p| p.is_stale(max_age, now))
            .cloned()
            .collect();

        stale.sort_by_key(|p| p.last_synced_at);
        stale.truncate(limit);
        Ok(stale)
    }

    fn latest_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .periods
            .read()
            .unwrap()
            .values()
            .map(|p| p.last_synced_at)
            .max())
    }

    fn record_request_pattern(&self, pattern: &RequestPattern) -> Result<()> {
        self.patterns.write().unwrap().push(pattern.clone());
        Ok(())
    }

    fn stale_timeframes(
        &self,
        threshold: Duration,
        limit: usize,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let patterns = self.patterns.read().unwrap();
        let threshold_secs = threshold.num_seconds();

        let mut recent: Vec<&RequestPattern> = patterns
            .iter()
            .filter(|p| p.data_freshness_seconds > threshold_secs)
            .filter(|p| p.window_start.is_some() && p.window_end.is_some())
            .collect();
        recent.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));

        let mut seen = std::collections::HashSet::new();
        let mut windows = Vec::new();
        for p in recent {
            let window = (p.window_start.unwrap(), p.window_end.unwrap());
            if seen.insert(window) {
                windows.push(window);
                if windows.len() >= limit {
                    break;
                }
            }
        }
        Ok(windows)
    }

    fn get_sync_state(&self, id: &ConversationId) -> Result<Option<ConversationSyncState>> {
        Ok(self.sync_states.read().unwrap().get(&id.0).cloned())
    }

    fn save_sync_state(&self, state: &ConversationSyncState) -> Result<()> {
        self.sync_states
            .write()
            .unwrap()
            .insert(state.conversation_id.0.clone(), state.clone());
        Ok(())
    }

    fn sync_candidates(&self, limit: usize) -> Result<Vec<ConversationId>> {
        let states = self.sync_states.read().unwrap();
        let mut rows: Vec<(&ConversationSyncState, Option<DateTime<Utc>>)> =
            states.values().map(|s| (s, s.last_synced())).collect();

        // Never-synced first, then oldest sync time first
        rows.sort_by(|a, b| match (a.1, b.1) {
            (None, None) => a.0.conversation_id.cmp(&b.0.conversation_id),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y),
        });

        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(s, _)| s.conversation_id.clone())
            .collect())
    }

    fn reset_sync_state(&self, id: &ConversationId) -> Result<()> {
        self.sync_states.write().unwrap().remove(&id.0);
        Ok(())
    }

    fn record_sync_attempt(&self, attempt: &SyncAttempt) -> Result<()> {
        self.attempts.write().unwrap().push(attempt.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.conversations.write().unwrap().clear();
        self.periods.write().unwrap().clear();
        self.patterns.write().unwrap().clear();
        self.sync_states.write().unwrap().clear();
        self.attempts.write().unwrap().clear();
        Ok(())
    }
}
