//! Storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::models::{
    Conversation, ConversationId, ConversationSyncState, RequestPattern, SyncAttempt, SyncPeriod,
};

/// Filters for local conversation queries
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Only conversations updated at or after this time
    pub updated_after: Option<DateTime<Utc>>,
    /// Only conversations updated before this time
    pub updated_before: Option<DateTime<Utc>>,
    /// Exact customer email match
    pub customer_email: Option<String>,
    /// Conversations carrying this tag
    pub tag: Option<String>,
}

/// Trait for conversation mirror storage
///
/// Abstracts over storage backends (in-memory for tests, SQLite for real
/// deployments). The store owns all persisted rows; engine components read
/// and write exclusively through this contract and rely on upsert-by-id
/// semantics for idempotent writes.
pub trait ConversationStore: Send + Sync {
    // === Conversations ===

    /// Upsert conversations by id, replacing each message list wholesale.
    /// Returns the number of conversations written.
    fn store_conversations(&self, conversations: &[Conversation]) -> Result<usize>;

    /// Indexed point lookup by conversation id
    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>>;

    /// Number of messages stored for a conversation (0 if absent)
    fn stored_message_count(&self, id: &ConversationId) -> Result<usize>;

    /// Query conversations, newest-updated first
    fn search_conversations(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Conversation>>;

    /// Count all stored conversations
    fn count_conversations(&self) -> Result<usize>;

    /// Count all stored messages
    fn count_messages(&self) -> Result<usize>;

    // === Sync periods ===

    /// Record (or refresh) a swept discovery period
    fn record_sync_period(&self, period: &SyncPeriod) -> Result<()>;

    /// Periods whose last sweep is older than `max_age`, oldest first
    fn periods_needing_sync(&self, max_age: Duration, limit: usize) -> Result<Vec<SyncPeriod>>;

    /// The most recent sweep time across all periods, if any sweep ever ran
    fn latest_sync_time(&self) -> Result<Option<DateTime<Utc>>>;

    // === Request patterns ===

    /// Append a caller request-pattern row
    fn record_request_pattern(&self, pattern: &RequestPattern) -> Result<()>;

    /// Distinct requested windows that were served data staler than
    /// `threshold`, most recently requested first
    fn stale_timeframes(
        &self,
        threshold: Duration,
        limit: usize,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>>;

    // === Per-conversation sync state ===

    /// Get the sync state row for a conversation
    fn get_sync_state(&self, id: &ConversationId) -> Result<Option<ConversationSyncState>>;

    /// Upsert a sync state row
    fn save_sync_state(&self, state: &ConversationSyncState) -> Result<()>;

    /// Conversation ids ordered oldest-successful-sync-first (never-synced
    /// first), bounded by `limit`
    fn sync_candidates(&self, limit: usize) -> Result<Vec<ConversationId>>;

    /// Delete the sync state row for a conversation (explicit reset only)
    fn reset_sync_state(&self, id: &ConversationId) -> Result<()>;

    /// Append an audit row for a sync attempt
    fn record_sync_attempt(&self, attempt: &SyncAttempt) -> Result<()>;

    /// Clear all data (for testing)
    fn clear(&self) -> Result<()>;
}
