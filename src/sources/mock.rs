//! Configurable in-memory source for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{PaperBuilder, PaperRecord, SearchQuery, SourceType};
use crate::sources::{Source, SourceError};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What the mock should do when asked to search.
#[derive(Debug, Clone)]
enum Behavior {
    Results(Vec<PaperRecord>),
    Error(String),
    RateLimited,
}

/// A scripted source. Returns canned records, injects errors, or sleeps to
/// trigger timeouts, and counts how often it was called.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    name: String,
    behavior: Mutex<Behavior>,
    delay: Mutex<Option<Duration>>,
    search_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Create a mock that registers under the given id
    pub fn named(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: format!("Mock ({})", id),
            behavior: Mutex::new(Behavior::Results(Vec::new())),
            delay: Mutex::new(None),
            search_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            id,
        }
    }

    /// Script the records every search returns
    pub fn with_results(self, results: Vec<PaperRecord>) -> Self {
        *lock(&self.behavior) = Behavior::Results(results);
        self
    }

    /// Script every search to fail with an API error
    pub fn with_error(self, message: impl Into<String>) -> Self {
        *lock(&self.behavior) = Behavior::Error(message.into());
        self
    }

    /// Script every search to fail with a rate-limit error
    pub fn with_rate_limit(self) -> Self {
        *lock(&self.behavior) = Behavior::RateLimited;
        self
    }

    /// Sleep this long before responding
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.delay) = Some(delay);
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Build a plausible record attributed to this mock
    pub fn record(&self, idx: usize, title: impl Into<String>) -> PaperRecord {
        let paper_id = format!("{}-{}", self.id, idx);
        PaperBuilder::new(
            &paper_id,
            title,
            format!("http://example.com/{}", paper_id),
            SourceType::Other(self.id.clone()),
        )
        .authors([format!("Author {}", idx)])
        .build()
    }

    async fn respond(&self) -> Result<Vec<PaperRecord>, SourceError> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.behavior).clone() {
            Behavior::Results(results) => Ok(results),
            Behavior::Error(message) => Err(SourceError::Api(message)),
            Behavior::RateLimited => Err(SourceError::RateLimit),
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<PaperRecord>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<PaperRecord>, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let results = self.respond().await?;
        Ok(results
            .into_iter()
            .find(|record| record.paper_id == identifier || record.doi.as_deref() == Some(identifier)))
    }
}
