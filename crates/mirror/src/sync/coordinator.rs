//! Two-phase sync coordinator
//!
//! A run sweeps one time window in two remote-facing phases. Discovery
//! searches the window and stores shallow records immediately, so metadata
//! is queryable even if the run dies later. Fetch retrieves complete
//! threads, but only for conversations whose stored thread is missing or
//! placeholder-only. Discovery failure aborts the run; individual fetch
//! failures do not.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::Semaphore;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::limiter::RateLimiter;
use crate::models::{AttemptType, Conversation, ConversationId, SyncPeriod};
use crate::remote::RemoteClient;
use crate::store::ConversationStore;
use crate::sync::tracker::SyncTracker;

/// How a run decides which discovered conversations to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStrategy {
    /// Refetch every discovered conversation's complete thread
    FullThread,
    /// Fetch only conversations with no complete thread stored
    #[default]
    Incremental,
    /// Like `Incremental`, but skip conversations still inside their
    /// post-failure retry backoff
    Smart,
}

/// Options for a single coordinator run
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    pub strategy: SyncStrategy,
    /// Refetch threads even when a complete copy is already stored
    pub force_refetch: bool,
}

impl SyncOptions {
    pub fn force() -> Self {
        Self {
            strategy: SyncStrategy::FullThread,
            force_refetch: true,
        }
    }
}

/// Outcome of one coordinator run
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Conversations seen by the discovery search
    pub discovered: usize,
    /// Of those, not previously mirrored
    pub new_conversations: usize,
    /// Of those, already mirrored but updated remotely
    pub updated_conversations: usize,
    /// Complete threads fetched this run
    pub fetched: usize,
    /// Messages written in the final store pass
    pub messages: usize,
    /// Remote API calls observed on the shared limiter while this run was
    /// in flight. Calls made by an overlapping run land in the same window,
    /// so this is an upper bound, not an exact per-run count.
    pub api_calls: u64,
    /// Conversations whose detail fetch failed; the run still succeeds
    pub failed_ids: Vec<ConversationId>,
    pub duration_ms: u64,
}

pub struct SyncCoordinator {
    remote: Arc<dyn RemoteClient>,
    store: Arc<dyn ConversationStore>,
    limiter: Arc<RateLimiter>,
    tracker: SyncTracker,
    config: SyncConfig,
}

impl SyncCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        store: Arc<dyn ConversationStore>,
        limiter: Arc<RateLimiter>,
        config: SyncConfig,
    ) -> Self {
        let tracker = SyncTracker::new(store.clone(), &config);
        Self {
            remote,
            store,
            limiter,
            tracker,
            config,
        }
    }

    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }

    /// Run a two-phase sync over `[start, end)`.
    ///
    /// Returns `RemoteUnavailable` if discovery fails. Per-conversation
    /// fetch failures are recorded in `failed_ids` and against the
    /// conversation's sync state, and do not fail the run.
    pub async fn run(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: SyncOptions,
    ) -> Result<SyncStats, SyncError> {
        let run_start = std::time::Instant::now();
        let calls_before = self.limiter.total_calls();
        let mut stats = SyncStats::default();

        info!("Sync run starting for [{}, {})", start, end);

        // Phase 1: discovery. Failure here aborts the whole run.
        debug!("Phase: discovery");
        let mut discovered = self
            .remote
            .fetch_for_period(start, end, None)
            .await
            .map_err(|e| {
                warn!("Discovery failed for [{}, {}): {:#}", start, end, e);
                SyncError::RemoteUnavailable(format!("{e:#}"))
            })?;

        // Pagination can return the same conversation on two pages if the
        // result set shifts mid-sweep; keep the first occurrence.
        let mut seen = std::collections::HashSet::new();
        discovered.retain(|c| seen.insert(c.id.clone()));

        // Shallow search results must not clobber complete threads we
        // already hold; keep the richer stored message list.
        for conv in &mut discovered {
            match self.store.get_conversation(&conv.id)? {
                Some(existing) => {
                    stats.updated_conversations += 1;
                    if existing.messages.len() > conv.messages.len() {
                        conv.messages = existing.messages;
                    }
                }
                None => stats.new_conversations += 1,
            }
        }
        stats.discovered = discovered.len();
        self.store.store_conversations(&discovered)?;

        // Phase 2: filter. A conversation needs its thread fetched when the
        // stored copy is absent or placeholder-only, or the caller forces it.
        debug!("Phase: filter ({} discovered)", discovered.len());
        let to_fetch = self.select_for_fetch(&discovered, options)?;

        // Phase 3: fetch complete threads, batched, with a concurrency cap.
        debug!("Phase: fetch ({} candidates)", to_fetch.len());
        let attempt_type = if options.force_refetch || options.strategy == SyncStrategy::FullThread
        {
            AttemptType::Full
        } else {
            AttemptType::Incremental
        };
        let fetched = self
            .fetch_threads(&to_fetch, attempt_type, &mut stats)
            .await?;

        // Phase 4: store. One write for the merged set, complete threads
        // taking precedence over shallow records.
        debug!("Phase: store ({} fetched)", fetched.len());
        let mut merged: HashMap<ConversationId, Conversation> = discovered
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        for conv in fetched {
            merged.insert(conv.id.clone(), conv);
        }
        let merged: Vec<Conversation> = merged.into_values().collect();
        stats.messages = merged.iter().map(|c| c.messages.len()).sum();
        self.store.store_conversations(&merged)?;

        let mut period = SyncPeriod::new(start, end);
        period.total_conversations = stats.discovered;
        period.new_conversations = stats.new_conversations;
        period.updated_conversations = stats.updated_conversations;
        self.store.record_sync_period(&period)?;

        stats.api_calls = self.limiter.total_calls() - calls_before;
        stats.duration_ms = run_start.elapsed().as_millis() as u64;
        info!(
            "Sync run finished: {} discovered, {} fetched, {} failed, {} api calls in {}ms",
            stats.discovered,
            stats.fetched,
            stats.failed_ids.len(),
            stats.api_calls,
            stats.duration_ms,
        );
        Ok(stats)
    }

    fn select_for_fetch(
        &self,
        discovered: &[Conversation],
        options: SyncOptions,
    ) -> Result<Vec<ConversationId>, SyncError> {
        let force = options.force_refetch || options.strategy == SyncStrategy::FullThread;
        let now = Utc::now();
        let mut to_fetch = Vec::new();

        for conv in discovered {
            let needs = force || self.store.stored_message_count(&conv.id)? <= 1;
            if !needs {
                continue;
            }

            if !force
                && options.strategy == SyncStrategy::Smart
                && self.tracker.in_error_backoff(&conv.id, now)?
            {
                debug!("Skipping {} (inside error backoff)", conv.id);
                self.tracker.mark_partial(&conv.id)?;
                continue;
            }

            to_fetch.push(conv.id.clone());
        }

        Ok(to_fetch)
    }

    /// Fetch complete threads for `ids` in batches. Each batch runs its
    /// fetches concurrently under the semaphore cap; failures are recorded
    /// per conversation and never abort the run.
    async fn fetch_threads(
        &self,
        ids: &[ConversationId],
        attempt_type: AttemptType,
        stats: &mut SyncStats,
    ) -> Result<Vec<Conversation>, SyncError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1)));
        let mut fetched = Vec::with_capacity(ids.len());

        for batch in ids.chunks(self.config.fetch_batch_size.max(1)) {
            let mut handles = Vec::with_capacity(batch.len());

            for id in batch {
                self.tracker.mark_started(id)?;
                let remote = self.remote.clone();
                let semaphore = semaphore.clone();
                let id = id.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    remote.fetch_by_id(&id).await
                }));
            }

            let results = futures::future::join_all(handles).await;
            for (id, result) in batch.iter().cloned().zip(results) {
                let before = self.store.stored_message_count(&id)?;
                match result {
                    Ok(Ok(Some(conv))) => {
                        self.tracker.mark_completed(
                            &id,
                            attempt_type,
                            before,
                            conv.messages.len(),
                        )?;
                        stats.fetched += 1;
                        fetched.push(conv);
                    }
                    Ok(Ok(None)) => {
                        warn!("Conversation {} no longer exists remotely", id);
                        self.tracker
                            .mark_failed(&id, attempt_type, "conversation not found remotely")?;
                        stats.failed_ids.push(id);
                    }
                    Ok(Err(e)) => {
                        warn!("Fetch failed for {}: {:#}", id, e);
                        self.tracker
                            .mark_failed(&id, attempt_type, &format!("{e:#}"))?;
                        stats.failed_ids.push(id);
                    }
                    Err(e) => {
                        warn!("Fetch task for {} panicked: {}", id, e);
                        self.tracker
                            .mark_failed(&id, attempt_type, "fetch task panicked")?;
                        stats.failed_ids.push(id);
                    }
                }
            }
        }

        Ok(fetched)
    }
}
