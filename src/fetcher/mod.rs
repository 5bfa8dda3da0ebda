//! Multi-source search orchestration.
//!
//! The [`Fetcher`] fans a query out to every requested source
//! concurrently, isolates per-source failures, merges and ranks the
//! results, and caches the final response. Source failures never fail the
//! search; they are reported in the per-source statuses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::config::Config;
use crate::models::{
    PaperRecord, SearchQuery, SearchRequest, SearchResponse, SourceStatus,
};
use crate::sources::{
    ArxivSource, CrossrefSource, PubMedSource, RegistryError, SemanticScholarSource, Source,
    SourceError, SourceRegistry, XrxivSource,
};
use crate::utils::{merge_records, AuthorityRanking, CacheStore, FileCache};

/// Errors from request validation and setup. Failures of the sources
/// themselves are reported per source inside [`SearchResponse`], not here.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A requested source is not registered
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// The result limit must be at least 1
    #[error("Invalid result limit: {0}")]
    InvalidLimit(usize),

    /// A source adapter could not be constructed
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl From<RegistryError> for FetchError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownSource(name) | RegistryError::DuplicateSource(name) => {
                FetchError::UnknownSource(name)
            }
        }
    }
}

/// Orchestrates searches across the registered sources
pub struct Fetcher {
    registry: SourceRegistry,
    config: Config,
    cache: Option<Arc<dyn CacheStore>>,
    authority: AuthorityRanking,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("sources", &self.registry.names())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl Fetcher {
    /// Create a fetcher over an explicit registry. The file cache is
    /// attached when enabled in the config.
    pub fn new(registry: SourceRegistry, config: Config) -> Self {
        let cache: Option<Arc<dyn CacheStore>> = if config.cache.enabled {
            let file_cache = FileCache::new(config.cache.directory());
            match file_cache.initialize() {
                Ok(()) => Some(Arc::new(file_cache)),
                Err(err) => {
                    tracing::warn!(error = %err, "Cache unavailable, continuing without it");
                    None
                }
            }
        } else {
            None
        };

        let authority = AuthorityRanking::new(config.fetcher.authority_order.clone());

        Self {
            registry,
            config,
            cache,
            authority,
        }
    }

    /// Create a fetcher with every built-in source registered. The xrxiv
    /// source is included only when a dump path is configured.
    pub fn from_config(config: Config) -> Result<Self, FetchError> {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(ArxivSource::new()?))?;
        registry.register(Arc::new(CrossrefSource::new(
            config.sources.crossref_mailto.as_deref(),
        )?))?;
        registry.register(Arc::new(PubMedSource::new(
            config.sources.pubmed_email.clone(),
            config.sources.pubmed_api_key.clone(),
        )?))?;
        registry.register(Arc::new(SemanticScholarSource::new(
            config.sources.semantic_api_key.clone(),
        )?))?;
        if let Some(dump_path) = &config.sources.xrxiv_dump_path {
            registry.register(Arc::new(XrxivSource::new(dump_path)))?;
        }

        Ok(Self::new(registry, config))
    }

    /// Replace the cache backend
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Drop the cache backend
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Search all requested sources concurrently.
    ///
    /// Validation failures (unknown source, zero limit) error out before
    /// anything is dispatched. After dispatch the call always succeeds:
    /// each source that fails or times out is reported in
    /// [`SearchResponse::statuses`] and contributes no records.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, FetchError> {
        let limit = request.limit.unwrap_or(self.config.fetcher.default_limit);
        if limit == 0 {
            return Err(FetchError::InvalidLimit(limit));
        }

        let sources: Vec<String> = match &request.sources {
            Some(requested) => requested.clone(),
            None => self.registry.names().to_vec(),
        };
        for name in &sources {
            if !self.registry.has(name) {
                return Err(FetchError::UnknownSource(name.clone()));
            }
        }

        let cache_key = Self::cache_key(&request.query, &sources, limit);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&cache_key).await {
                tracing::debug!(key = %cache_key, "Serving search from cache");
                return Ok(cached);
            }
        }

        let start = Instant::now();
        let per_source_timeout = request
            .timeout_per_source
            .unwrap_or_else(|| self.config.fetcher.source_timeout());
        let query = SearchQuery::new(&request.query).max_results(limit);

        let mut handles = Vec::with_capacity(sources.len());
        for name in &sources {
            // Validated above; a racing deregistration cannot happen since
            // the registry is immutable once the fetcher owns it.
            let source = match self.registry.get(name) {
                Ok(source) => Arc::clone(source),
                Err(err) => return Err(err.into()),
            };
            let query = query.clone();
            let name = name.clone();

            handles.push(tokio::spawn(async move {
                let started = Instant::now();
                match timeout(per_source_timeout, source.search(&query)).await {
                    Ok(Ok(records)) => {
                        tracing::debug!(source = %name, count = records.len(), "Source returned");
                        (
                            SourceStatus::success(&name, records.len(), started.elapsed()),
                            records,
                        )
                    }
                    Ok(Err(SourceError::RateLimit)) => {
                        tracing::warn!(source = %name, "Source rate limited");
                        (SourceStatus::rate_limited(&name, started.elapsed()), Vec::new())
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(source = %name, error = %err, "Source failed");
                        (
                            SourceStatus::error(&name, started.elapsed(), err.to_string()),
                            Vec::new(),
                        )
                    }
                    Err(_) => {
                        tracing::warn!(source = %name, "Source timed out");
                        (SourceStatus::timeout(&name, started.elapsed()), Vec::new())
                    }
                }
            }));
        }

        // One status per dispatched source, in dispatch order
        let outcomes = futures_util::future::join_all(handles).await;
        let mut statuses = Vec::with_capacity(sources.len());
        let mut collected: Vec<PaperRecord> = Vec::new();
        for (outcome, name) in outcomes.into_iter().zip(&sources) {
            match outcome {
                Ok((status, records)) => {
                    statuses.push(status);
                    collected.extend(records);
                }
                Err(err) => {
                    // The per-source clock died with the task, so no elapsed
                    // time is available for this source.
                    tracing::error!(source = %name, error = %err, "Source task panicked");
                    statuses.push(SourceStatus::error(
                        name,
                        Duration::ZERO,
                        "internal task failure",
                    ));
                }
            }
        }

        let records = merge_records(collected, &request.query, &self.authority, limit);
        let response = SearchResponse::new(records, statuses, start.elapsed());

        if let Some(cache) = &self.cache {
            cache
                .set(&cache_key, &response, self.config.cache.ttl())
                .await;
        }

        Ok(response)
    }

    /// Fetch one paper by identifier.
    ///
    /// With an explicit source the lookup goes straight there and its
    /// errors surface. Without one, sources are tried in an order inferred
    /// from the identifier's shape, skipping sources that fail, until one
    /// returns a record.
    pub async fn fetch(
        &self,
        identifier: &str,
        source: Option<&str>,
    ) -> Result<Option<PaperRecord>, FetchError> {
        if let Some(name) = source {
            let source = self.registry.get(name)?;
            return Ok(source.fetch(identifier).await?);
        }

        for name in self.prioritized_sources(identifier) {
            let source = match self.registry.get(&name) {
                Ok(source) => source,
                Err(_) => continue,
            };
            match source.fetch(identifier).await {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(source = %name, error = %err, "Fetch attempt failed, trying next source");
                    continue;
                }
            }
        }

        Ok(None)
    }

    /// Fetch several papers by identifier, in input order.
    ///
    /// Each identifier resolves independently through [`Fetcher::fetch`],
    /// so one failed lookup does not stop the rest.
    pub async fn batch_fetch(
        &self,
        identifiers: &[String],
        source: Option<&str>,
    ) -> Vec<Result<Option<PaperRecord>, FetchError>> {
        let mut results = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            results.push(self.fetch(identifier, source).await);
        }
        results
    }

    /// Order registered sources by how likely they are to resolve this
    /// identifier: bare digits look like a PMID, "NNNN.NNNNN" like an
    /// arXiv ID, a "10."-prefixed string like a DOI; anything else goes to
    /// Semantic Scholar first.
    fn prioritized_sources(&self, identifier: &str) -> Vec<String> {
        let id = identifier.trim().to_lowercase();
        let preferred = if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            "pubmed"
        } else if looks_like_arxiv_id(&id) {
            "arxiv"
        } else if id.starts_with("10.") {
            "crossref"
        } else {
            "semantic"
        };

        let mut order = Vec::with_capacity(self.registry.len());
        if self.registry.has(preferred) {
            order.push(preferred.to_string());
        }
        for name in self.registry.names() {
            if name != preferred {
                order.push(name.clone());
            }
        }
        order
    }

    /// Deterministic cache key: normalized query, sorted source names,
    /// effective limit.
    fn cache_key(query: &str, sources: &[String], limit: usize) -> String {
        let normalized = query.trim().to_lowercase();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut sorted = sources.to_vec();
        sorted.sort();
        format!("search:{}:{}:{}", normalized, sorted.join(","), limit)
    }
}

fn looks_like_arxiv_id(id: &str) -> bool {
    let stripped = id.strip_prefix("arxiv:");
    let had_prefix = stripped.is_some();
    let id = stripped.unwrap_or(id);
    match id.split_once('.') {
        Some((prefix, suffix)) => {
            let suffix = suffix.split('v').next().unwrap_or(suffix);
            prefix.len() == 4
                && prefix.chars().all(|c| c.is_ascii_digit())
                && (4..=5).contains(&suffix.len())
                && suffix.chars().all(|c| c.is_ascii_digit())
        }
        // An explicit "arxiv:" prefix is trusted even for old-style IDs
        None => had_prefix,
    }
}
