//! Backend data access memoized through the TTL cache
//!
//! `ContentService` is what the reading/feed screens call. It answers from the
//! in-process [`TtlCache`] while an entry is fresh and otherwise asks its
//! [`DataSource`], storing the result under the data set's policy TTL.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheStats, DataSet, TtlCache};

/// Errors that can occur when loading a data set
#[derive(Debug, Error)]
pub enum ContentError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend returned status {status} for {set}")]
    Status { set: DataSet, status: u16 },

    /// Failed to parse the response body
    #[error("Failed to parse response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Anything that can produce the current contents of a data set
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self, set: DataSet) -> Result<Value, ContentError>;
}

/// Data source reading JSON listings from the backend data API
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    client: Client,
    base_url: String,
}

impl HttpDataSource {
    /// Creates a source rooted at `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ContentError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a source using an existing HTTP client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, set: DataSet) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), set.path())
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn load(&self, set: DataSet) -> Result<Value, ContentError> {
        let response = self.client.get(self.url_for(set)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Status {
                set,
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Memoizing front for a [`DataSource`]
pub struct ContentService<S> {
    cache: TtlCache<Value>,
    source: S,
}

impl<S: DataSource> ContentService<S> {
    /// Creates a service with a fresh cache on the system clock
    pub fn new(source: S) -> Self {
        Self::with_cache(source, TtlCache::new())
    }

    /// Creates a service around an existing cache instance
    pub fn with_cache(source: S, cache: TtlCache<Value>) -> Self {
        Self { cache, source }
    }

    /// Returns the data set, fetching it only when no fresh copy is cached
    ///
    /// Failed fetches are returned to the caller and leave the cache untouched.
    pub async fn load(&mut self, set: DataSet) -> Result<Value, ContentError> {
        if let Some(value) = self.cache.get(set.key()) {
            debug!(key = set.key(), "memoized hit");
            return Ok(value);
        }

        let value = self.source.load(set).await?;
        self.cache.set(set.key(), value.clone(), set.ttl());
        debug!(key = set.key(), ttl_ms = set.ttl().as_millis() as u64, "memoized fetch");
        Ok(value)
    }

    /// Forgets a single data set
    pub fn invalidate(&mut self, set: DataSet) {
        self.cache.invalidate(set.key());
    }

    /// Forgets every data set whose key contains `pattern`
    pub fn invalidate_family(&mut self, pattern: &str) -> usize {
        let removed = self.cache.invalidate_by_pattern(pattern);
        debug!(pattern, removed, "invalidated key family");
        removed
    }

    /// Drops everything, e.g. when the user signs out
    pub fn logout(&mut self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
