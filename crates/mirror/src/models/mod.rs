//! Domain models for mirrored conversations and sync bookkeeping

mod conversation;
mod period;
mod sync_state;

pub use conversation::{AuthorKind, Conversation, ConversationId, Message, MessageId};
pub use period::{RequestPattern, SyncPeriod};
pub use sync_state::{AttemptType, ConversationSyncState, SyncAttempt, SyncStatus};
