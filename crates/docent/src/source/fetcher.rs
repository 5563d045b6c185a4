//! Resilient document acquisition
//!
//! Tries the primary URL, retrying with exponential backoff, then the
//! backup URL the same way, and finally serves the bundled fallback text.
//! Pages are reduced to their main content before use.
//! The whole sequence is bounded by a deadline. Live documents are cached
//! for a fixed interval so most questions never touch the network.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::error::{DocentError, ErrorOrigin, Result};
use crate::source::fallback::FALLBACK_TEXT;
use crate::source::extract::page_text;
use crate::source::types::{Origin, SourceDocument};

/// Browser-like identity; some government hosts refuse unknown agents
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Failure of a single GET. Never leaves this module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("source returned HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unusable body: {0}")]
    Body(String),
}

impl FetchError {
    /// Whether the same URL might succeed on another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status(code) => *code >= 500 || *code == 408 || *code == 429,
            FetchError::Transport(_) => true,
            FetchError::Body(_) => false,
        }
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    /// Delay before retrying after attempt `attempt` (0-based) failed with
    /// `error`, or `None` once the URL should be abandoned.
    pub fn next_delay(&self, attempt: u32, error: &FetchError) -> Option<Duration> {
        if attempt >= self.max_retries || !error.is_retryable() {
            return None;
        }
        Some(
            self.base_delay
                .saturating_mul(2u32.saturating_pow(attempt)),
        )
    }
}

#[derive(Debug)]
struct CachedDocument {
    document: Arc<SourceDocument>,
    fetched_at: Instant,
}

/// Fetches, sanitizes and caches the source document
#[derive(Debug)]
pub struct ContentFetcher {
    client: Client,
    urls: Vec<Url>,
    policy: RetryPolicy,
    deadline: Duration,
    cache_ttl: Duration,
    fallback_text: String,
    cache: RwLock<Option<CachedDocument>>,
    /// Refresh in progress; every caller that joins it gets its result
    inflight: Mutex<Option<Arc<OnceCell<Arc<SourceDocument>>>>>,
}

impl ContentFetcher {
    /// Create a fetcher from the source configuration
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut urls = vec![Url::parse(&config.primary_url).map_err(|e| {
            DocentError::Config(format!("Invalid source.primary_url: {e}"))
        })?];
        if let Some(ref backup) = config.backup_url {
            urls.push(
                Url::parse(backup)
                    .map_err(|e| DocentError::Config(format!("Invalid source.backup_url: {e}")))?,
            );
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.attempt_timeout_secs))
            .build()
            .map_err(|e| DocentError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            urls,
            policy: RetryPolicy::from_config(config),
            deadline: Duration::from_secs(config.deadline_secs),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            fallback_text: config
                .fallback_text
                .clone()
                .unwrap_or_else(|| FALLBACK_TEXT.to_string()),
            cache: RwLock::new(None),
            inflight: Mutex::new(None),
        })
    }

    /// The current document: cached if fresh, otherwise fetched.
    ///
    /// Concurrent callers that find the cache stale join a single refresh
    /// and share its outcome, fallback included.
    pub async fn get(&self) -> Arc<SourceDocument> {
        if let Some(document) = self.cached().await {
            return document;
        }

        let generation = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .get_or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        generation
            .get_or_init(|| self.refresh(&generation))
            .await
            .clone()
    }

    async fn refresh(
        &self,
        generation: &Arc<OnceCell<Arc<SourceDocument>>>,
    ) -> Arc<SourceDocument> {
        // A refresh that finished just before this one started
        let document = match self.cached().await {
            Some(document) => {
                debug!("Document refreshed by a concurrent request");
                document
            }
            None => {
                let document = Arc::new(self.fetch().await);
                if document.is_live() && !self.cache_ttl.is_zero() {
                    *self.cache.write().await = Some(CachedDocument {
                        document: document.clone(),
                        fetched_at: Instant::now(),
                    });
                }
                document
            }
        };

        // Later callers start a new generation
        let mut inflight = self.inflight.lock().await;
        if inflight
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, generation))
        {
            *inflight = None;
        }
        document
    }

    async fn cached(&self) -> Option<Arc<SourceDocument>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.cache_ttl)
            .map(|c| c.document.clone())
    }

    /// Fetch a fresh document, bypassing the cache. Never fails.
    pub async fn fetch(&self) -> SourceDocument {
        match tokio::time::timeout(self.deadline, self.fetch_live()).await {
            Ok(Ok(content)) => SourceDocument::new(content, Origin::Live),
            Ok(Err(e)) => {
                warn!(
                    error_origin = %ErrorOrigin::Fetch,
                    "All document sources failed, serving fallback: {e}"
                );
                self.fallback()
            }
            Err(_) => {
                warn!(
                    error_origin = %ErrorOrigin::Fetch,
                    "Document fetch exceeded {:?} deadline, serving fallback",
                    self.deadline
                );
                self.fallback()
            }
        }
    }

    /// The fallback document, exactly as configured
    pub fn fallback(&self) -> SourceDocument {
        SourceDocument::new(self.fallback_text.clone(), Origin::Fallback)
    }

    async fn fetch_live(&self) -> std::result::Result<String, FetchError> {
        let mut last_error = FetchError::Transport("no source configured".to_string());
        for url in &self.urls {
            match self.fetch_with_retries(url).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    warn!(
                        error_origin = %ErrorOrigin::Fetch,
                        "Source {url} failed: {e}"
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn fetch_with_retries(&self, url: &Url) -> std::result::Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            let error = match self.fetch_once(url).await {
                Ok(content) => {
                    info!(
                        "Fetched document from {url} ({} chars)",
                        content.chars().count()
                    );
                    return Ok(content);
                }
                Err(e) => e,
            };

            match self.policy.next_delay(attempt, &error) {
                Some(delay) => {
                    warn!(
                        "Fetch attempt {}/{} for {url} failed ({error}), retrying in {:?}",
                        attempt + 1,
                        self.policy.max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(error),
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read body: {e}")))?;

        let content = page_text(&html);
        if content.is_empty() {
            return Err(FetchError::Body("no text after sanitization".to_string()));
        }
        Ok(content)
    }
}
