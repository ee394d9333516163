//! Mirror crate - Incremental local mirror of a remote conversation API
//!
//! This crate keeps a local, queryable copy of conversations held behind a
//! rate-limited remote API:
//! - Domain models (Conversation, Message, per-conversation sync state)
//! - Remote API client behind a trait, with a shared sliding-window rate
//!   limiter
//! - Storage trait abstractions (in-memory and SQLite)
//! - Two-phase sync coordinator (discover shallow records, then fetch
//!   complete threads for the ones that need it)
//! - Freshness-gated engine facade and a background scheduler
//!
//! Reads never block on the network unless the mirror is outright stale;
//! background sweeps keep it converging toward fresh.

pub mod config;
pub mod error;
pub mod limiter;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;

pub use config::{RemoteCredentials, SyncConfig};
pub use error::SyncError;
pub use limiter::RateLimiter;
pub use models::{
    AttemptType, AuthorKind, Conversation, ConversationId, ConversationSyncState, Message,
    MessageId, RequestPattern, SyncAttempt, SyncPeriod, SyncStatus,
};
pub use remote::{HttpRemoteClient, ProgressFn, RemoteClient};
pub use store::{
    ConversationStore, InMemoryConversationStore, SearchFilters, SqliteConversationStore,
};
pub use sync::{
    BackgroundScheduler, EngineStatus, Freshness, FreshnessReport, SyncCoordinator, SyncEngine,
    SyncOptions, SyncStats, SyncStrategy, SyncTracker,
};
