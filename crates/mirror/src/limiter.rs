//! Sliding-window rate limiter for remote API calls
//!
//! Every outbound request to the remote API acquires a slot here first, so
//! fetch-phase parallelism raises request concurrency without ever exceeding
//! the global call-rate cap.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Bounds outbound call rate to at most `max_calls` per rolling `window`.
///
/// `acquire` delays the caller instead of failing; being rate limited is
/// never surfaced as an error. Waiting callers are served in order of
/// arrival at the slot check only; there is no stronger fairness guarantee.
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
    total_calls: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            // A zero cap would deadlock every caller
            max_calls: max_calls.max(1),
            window,
            calls: Mutex::new(VecDeque::new()),
            total_calls: AtomicU64::new(0),
        }
    }

    /// Block until a call slot is available, then claim it.
    ///
    /// Sleeps until the oldest timestamp exits the window and re-evaluates,
    /// rather than sleeping a fixed interval.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();

                while let Some(&oldest) = calls.front() {
                    if now.duration_since(oldest) >= self.window {
                        calls.pop_front();
                    } else {
                        break;
                    }
                }

                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    self.total_calls.fetch_add(1, Ordering::Relaxed);
                    return;
                }

                match calls.front() {
                    Some(&oldest) => self.window - now.duration_since(oldest),
                    None => continue,
                }
            };

            tokio::time::sleep(wait).await;
        }
    }

    /// Total slots handed out since creation. Used for per-run API call
    /// accounting in sync stats.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }
}
