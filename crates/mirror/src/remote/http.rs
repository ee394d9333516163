//! HTTP client for the remote conversation API

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::StatusCode;

use super::api::{AccountResponse, ApiConversation, SearchResponse};
use super::normalize::normalize_conversation;
use super::{ProgressFn, RemoteClient};
use crate::config::RemoteCredentials;
use crate::limiter::RateLimiter;
use crate::models::{Conversation, ConversationId};

/// Conversations requested per search page
const PAGE_SIZE: usize = 50;

/// Per-request timeout; a stuck remote call stalls its batch slot until
/// this fires
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bearer-authenticated client for the remote conversation API.
///
/// Every HTTP request acquires a slot from the shared [`RateLimiter`], so
/// callers can issue requests concurrently without bypassing the global
/// call-rate cap.
pub struct HttpRemoteClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    limiter: Arc<RateLimiter>,
}

impl HttpRemoteClient {
    pub fn new(credentials: RemoteCredentials, limiter: Arc<RateLimiter>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            access_token: credentials.access_token,
            limiter,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.limiter.acquire().await;

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("Remote returned error status for {}", url))?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    /// Fetch one search page for `[start, end)`
    async fn search_page(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: usize,
    ) -> Result<SearchResponse> {
        let url = format!(
            "{}/v1/conversations/search?updated_after={}&updated_before={}&page={}&per_page={}",
            self.base_url,
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339()),
            page,
            PAGE_SIZE,
        );
        self.get_json(&url).await
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<ApiConversation>> {
        let url = format!("{}/v1/conversations/{}", self.base_url, id.as_str());
        self.limiter.acquire().await;

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .with_context(|| format!("Remote returned error status for {}", url))?;

        Ok(Some(response.json().await.with_context(|| {
            format!("Failed to parse conversation {}", id)
        })?))
    }

    /// Fetch a conversation with exponential backoff retry
    async fn get_conversation_with_retry(
        &self,
        id: &ConversationId,
        max_retries: u32,
    ) -> Result<Option<ApiConversation>> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..max_retries {
            match self.get_conversation(id).await {
                Ok(conv) => return Ok(conv),
                Err(e) => {
                    warn!("Fetch attempt {} for {} failed: {:#}", attempt + 1, id, e);
                    last_error = Some(e);
                    if attempt < max_retries - 1 {
                        // Add jitter to delay
                        let jitter = Duration::from_millis(rand_jitter());
                        tokio::time::sleep(delay + jitter).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("fetch retries exhausted for {}", id)))
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn fetch_for_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        progress: Option<&ProgressFn>,
    ) -> Result<Vec<Conversation>> {
        let mut all = Vec::new();
        let mut page = 1;
        let mut total_estimate = 0usize;

        loop {
            let response = self.search_page(start, end, page).await?;
            let page_len = response.conversations.len();

            if let Some(total) = response.total {
                total_estimate = total as usize;
            }

            all.extend(
                response
                    .conversations
                    .into_iter()
                    .map(normalize_conversation),
            );

            if let Some(progress) = progress {
                progress(all.len(), total_estimate);
            }

            // A short page means we've seen the last of the results
            if page_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!(
            "Discovered {} conversations in [{}, {})",
            all.len(),
            start,
            end
        );
        Ok(all)
    }

    async fn fetch_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        Ok(self
            .get_conversation_with_retry(id, 3)
            .await?
            .map(normalize_conversation))
    }

    async fn fetch_by_ids(
        &self,
        ids: &[ConversationId],
        progress: Option<&ProgressFn>,
    ) -> Result<Vec<Conversation>> {
        let mut conversations = Vec::with_capacity(ids.len());

        for (i, id) in ids.iter().enumerate() {
            if let Some(conv) = self.fetch_by_id(id).await? {
                conversations.push(conv);
            } else {
                warn!("Conversation {} no longer exists remotely", id);
            }
            if let Some(progress) = progress {
                progress(i + 1, ids.len());
            }
        }

        Ok(conversations)
    }

    async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/v1/me", self.base_url);
        self.limiter.acquire().await;

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Connection test request failed")?;

        Ok(response.status().is_success())
    }

    async fn account_id(&self) -> Result<Option<String>> {
        let url = format!("{}/v1/me", self.base_url);
        let account: AccountResponse = self.get_json(&url).await?;
        Ok(account.account_id)
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
