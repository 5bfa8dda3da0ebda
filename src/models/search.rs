//! Search request, per-source status, and aggregated response models.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::PaperRecord;

/// Query parameters passed to an individual source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Main search query string
    pub query: String,

    /// Maximum number of results the source should return
    pub max_results: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: 10,
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }
}

/// An aggregated search request handled by the fetcher
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Main search query string
    pub query: String,

    /// Source names to dispatch to; `None` means all registered sources
    pub sources: Option<Vec<String>>,

    /// Maximum number of merged results to return; `None` means the
    /// fetcher's configured default
    pub limit: Option<usize>,

    /// Per-source timeout override; falls back to the fetcher default
    pub timeout_per_source: Option<Duration>,
}

impl SearchRequest {
    /// Create a request with default limit and all registered sources
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            sources: None,
            limit: None,
            timeout_per_source: None,
        }
    }

    /// Restrict the request to specific sources
    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    /// Set the merged result limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Override the per-source timeout
    pub fn timeout_per_source(mut self, timeout: Duration) -> Self {
        self.timeout_per_source = Some(timeout);
        self
    }
}

/// Outcome of a single source dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SourceOutcome {
    /// The source returned results (possibly zero)
    Success { results: usize },
    /// The source exceeded its per-call timeout
    Timeout,
    /// The source reported a rate limit
    RateLimited,
    /// The source failed with an error
    Error,
}

impl SourceOutcome {
    /// Whether this outcome contributed records to the merge
    pub fn is_success(&self) -> bool {
        matches!(self, SourceOutcome::Success { .. })
    }
}

/// Report for one dispatched source. Created once per source per search
/// call and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    /// Source name as registered
    pub source: String,

    /// How the dispatch ended
    pub outcome: SourceOutcome,

    /// Wall-clock time spent on this source
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,

    /// Error detail for failed outcomes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SourceStatus {
    /// Status for a successful dispatch
    pub fn success(source: impl Into<String>, results: usize, elapsed: Duration) -> Self {
        Self {
            source: source.into(),
            outcome: SourceOutcome::Success { results },
            elapsed,
            detail: None,
        }
    }

    /// Status for a timed-out dispatch
    pub fn timeout(source: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            source: source.into(),
            outcome: SourceOutcome::Timeout,
            elapsed,
            detail: None,
        }
    }

    /// Status for a rate-limited dispatch
    pub fn rate_limited(source: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            source: source.into(),
            outcome: SourceOutcome::RateLimited,
            elapsed,
            detail: None,
        }
    }

    /// Whether the dispatch contributed records to the merge
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Status for a failed dispatch
    pub fn error(source: impl Into<String>, elapsed: Duration, detail: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: SourceOutcome::Error,
            elapsed,
            detail: Some(detail.into()),
        }
    }
}

/// Aggregated response for one search call. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Deduplicated, ranked records across all successful sources
    pub records: Vec<PaperRecord>,

    /// One status per dispatched source, in dispatch order
    pub statuses: Vec<SourceStatus>,

    /// Total wall-clock time for the whole call
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl SearchResponse {
    /// Create a new response
    pub fn new(records: Vec<PaperRecord>, statuses: Vec<SourceStatus>, elapsed: Duration) -> Self {
        Self {
            records,
            statuses,
            elapsed,
        }
    }

    /// Whether every dispatched source failed
    pub fn all_sources_failed(&self) -> bool {
        !self.statuses.is_empty() && self.statuses.iter().all(|s| !s.outcome.is_success())
    }
}

/// Serialize `Duration` as integer milliseconds so responses stay stable
/// across process restarts (cache entries are compared byte for byte).
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
