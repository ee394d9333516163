//! Remote conversation API client
//!
//! The engine consumes the remote API exclusively through the
//! [`RemoteClient`] trait; [`HttpRemoteClient`] is the production
//! implementation. Search results are shallow (metadata plus whatever
//! messages the search response carries); per-id fetches return complete
//! threads.

mod api;
mod http;
mod normalize;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Conversation, ConversationId};

pub use http::HttpRemoteClient;
pub use normalize::normalize_conversation;

/// Progress callback: (items done, total estimate; 0 when unknown)
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Contract for the remote conversation API
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Search conversations updated within `[start, end)`. Returns shallow
    /// records; pagination is handled internally.
    async fn fetch_for_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        progress: Option<&ProgressFn>,
    ) -> Result<Vec<Conversation>>;

    /// Fetch one complete conversation thread. `None` if the remote reports
    /// the conversation does not exist.
    async fn fetch_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>>;

    /// Fetch complete threads for several conversations. Ids the remote no
    /// longer knows are silently omitted from the result.
    async fn fetch_by_ids(
        &self,
        ids: &[ConversationId],
        progress: Option<&ProgressFn>,
    ) -> Result<Vec<Conversation>>;

    /// Check connectivity and credentials
    async fn test_connection(&self) -> Result<bool>;

    /// The remote account this client is bound to, if the API reports one
    async fn account_id(&self) -> Result<Option<String>>;
}
