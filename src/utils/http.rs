//! HTTP client utilities with built-in rate limiting.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;

use crate::sources::SourceError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared HTTP client with sensible defaults and an optional per-client
/// request rate limit.
///
/// Each source adapter holds its own `HttpClient`, so the limiter state is
/// per provider, matching the rate limits the upstream APIs enforce.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    limiter: Option<Arc<DirectLimiter>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl HttpClient {
    /// Create a new HTTP client with the default user agent
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Create a new HTTP client with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            limiter: None,
        })
    }

    /// Limit this client to `requests_per_second` outgoing requests
    pub fn rate_limit_per_second(mut self, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32)));
        self.limiter = Some(Arc::new(RateLimiter::direct(quota)));
        self
    }

    /// Start a GET request, waiting for the rate limiter first
    pub async fn get(&self, url: &str) -> reqwest::RequestBuilder {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        self.client.get(url)
    }
}
