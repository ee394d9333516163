//! Conversation and message models mirrored from the remote API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a conversation (remote API conversation ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a message (remote API part/message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Who authored a message within a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorKind {
    /// The end user who opened the conversation
    Customer,
    /// A support agent (or automation acting as one)
    Agent,
}

impl AuthorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "agent" => Self::Agent,
            _ => Self::Customer,
        }
    }
}

/// A single message within a conversation
///
/// Messages are immutable once stored and owned exclusively by their
/// conversation; upserting a conversation replaces its message list
/// wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Remote message ID
    pub id: MessageId,
    /// ID of the owning conversation
    pub conversation_id: ConversationId,
    /// Author classification
    pub author: AuthorKind,
    /// Message body text
    pub body: String,
    /// When the message was created remotely
    pub created_at: DateTime<Utc>,
    /// Remote part kind (e.g. "comment", "note", "close")
    pub part_kind: String,
}

impl Message {
    pub fn new(
        id: MessageId,
        conversation_id: ConversationId,
        author: AuthorKind,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
        part_kind: impl Into<String>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            author,
            body: body.into(),
            created_at,
            part_kind: part_kind.into(),
        }
    }
}

/// A conversation mirrored from the remote API
///
/// Invariants: `updated_at >= created_at`; messages are unique by id and
/// ordered by creation time. Both are enforced by [`Conversation::normalize`]
/// when records come off the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Remote conversation ID
    pub id: ConversationId,
    /// When the conversation was created remotely
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated remotely
    pub updated_at: DateTime<Utc>,
    /// Email of the customer participant, when known
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Tags applied to the conversation
    #[serde(default)]
    pub tags: Vec<String>,
    /// Messages in creation order
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: ConversationId, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            updated_at: updated_at.max(created_at),
            customer_email: None,
            tags: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Whether the mirror holds a complete message thread for this
    /// conversation.
    ///
    /// Shallow search results carry at most one placeholder message, so
    /// anything with more than one stored message has been through a detail
    /// fetch.
    pub fn has_complete_thread(&self) -> bool {
        self.messages.len() > 1
    }

    /// Enforce model invariants on a record that came off the wire:
    /// clamp `updated_at`, drop duplicate message ids (first wins), and
    /// order messages by creation time.
    pub fn normalize(mut self) -> Self {
        if self.updated_at < self.created_at {
            self.updated_at = self.created_at;
        }

        let mut seen = std::collections::HashSet::new();
        self.messages.retain(|m| seen.insert(m.id.clone()));
        self.messages.sort_by_key(|m| m.created_at);
        self
    }
}
