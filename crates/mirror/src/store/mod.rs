//! Storage traits and implementations
//!
//! This module defines the storage abstraction layer for the conversation
//! mirror. The trait-based design allows swapping between in-memory and
//! SQLite-backed storage implementations.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryConversationStore;
pub use sqlite::SqliteConversationStore;
pub use traits::{ConversationStore, SearchFilters};
