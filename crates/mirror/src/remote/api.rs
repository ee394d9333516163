//! Wire types for the remote conversation API

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One page of search results
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub conversations: Vec<ApiConversation>,
    /// Total matching conversations, when the API reports it
    #[serde(default)]
    pub total: Option<u64>,
}

/// Account info from the identity endpoint
#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiConversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub customer: Option<ApiCustomer>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Search responses carry at most a placeholder message here; detail
    /// responses carry the complete thread
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCustomer {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    pub id: String,
    /// "customer" or "agent"
    #[serde(default)]
    pub author_type: String,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_part_kind")]
    pub part_kind: String,
}

fn default_part_kind() -> String {
    "comment".to_string()
}
