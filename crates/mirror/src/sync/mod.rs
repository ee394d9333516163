//! Sync engine internals
//!
//! - [`freshness`]: pure classification of mirror currency for a read
//! - [`coordinator`]: the two-phase (discovery then fetch) sync run
//! - [`tracker`]: per-conversation sync state and retry backoff
//! - [`scheduler`]: background sweeps on a fixed interval
//! - [`engine`]: the single-flight facade callers use

pub mod coordinator;
pub mod engine;
pub mod freshness;
pub mod scheduler;
pub mod tracker;

pub use coordinator::{SyncCoordinator, SyncOptions, SyncStats, SyncStrategy};
pub use engine::{EngineStatus, SyncEngine};
pub use freshness::{Freshness, FreshnessReport, classify, evaluate};
pub use scheduler::BackgroundScheduler;
pub use tracker::SyncTracker;
