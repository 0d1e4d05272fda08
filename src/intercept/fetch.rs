//! Network capability used by the caching strategies

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method};
use std::time::Duration;
use thiserror::Error;

use super::request::{InterceptedRequest, StoredResponse};

/// Errors that can occur when fetching from the network
///
/// The strategies treat every variant the same way: as "the network failed".
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed (DNS, connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The request method is not a valid HTTP token
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Fetcher-specific failure (offline mode, test doubles)
    #[error("Network unavailable: {0}")]
    Unavailable(String),
}

/// Anything that can turn a request into a response
///
/// A non-2xx answer is still `Ok`; only transport-level failures are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<StoredResponse, FetchError>;
}

/// Fetcher backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Create a new HttpFetcher with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<StoredResponse, FetchError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| FetchError::InvalidMethod(request.method.clone()))?;

        let response = self.client.request(method, &request.url).send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(StoredResponse {
            url,
            status,
            headers,
            body,
            stored_at: Utc::now(),
        })
    }
}
