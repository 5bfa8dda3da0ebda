//! Configuration, loaded from an optional file plus `SCIPAPER_*`
//! environment variables.
//!
//! Environment variables override file values; nested fields use a double
//! underscore, e.g. `SCIPAPER_CACHE__ENABLED=false` or
//! `SCIPAPER_SOURCES__PUBMED_EMAIL=me@lab.org`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetcher: FetcherConfig,
    pub cache: CacheConfig,
    pub sources: SourcesConfig,
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Result limit applied when a request does not set one
    pub default_limit: usize,

    /// Per-source timeout in seconds
    pub source_timeout_seconds: u64,

    /// Source preference order for deduplication and ranking,
    /// most authoritative first
    pub authority_order: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            source_timeout_seconds: 30,
            authority_order: vec![
                "crossref".to_string(),
                "pubmed".to_string(),
                "semantic".to_string(),
                "arxiv".to_string(),
                "xrxiv".to_string(),
            ],
        }
    }
}

impl FetcherConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_seconds)
    }
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Cache directory; defaults to the platform cache dir
    pub directory: Option<PathBuf>,

    /// Time-to-live for cached search responses, in seconds
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            ttl_seconds: 3600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(default_cache_dir)
    }
}

/// Provider credentials and endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Contact address for Crossref's polite pool
    pub crossref_mailto: Option<String>,

    /// Contact email sent with every NCBI request (required by their
    /// usage policy)
    pub pubmed_email: String,

    pub pubmed_api_key: Option<String>,

    pub semantic_api_key: Option<String>,

    /// Path to a local xrxiv JSONL dump; the xrxiv source is only
    /// registered when this is set
    pub xrxiv_dump_path: Option<PathBuf>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            crossref_mailto: None,
            pubmed_email: "scipaper@example.com".to_string(),
            pubmed_api_key: None,
            semantic_api_key: None,
            xrxiv_dump_path: None,
        }
    }
}

/// Platform cache directory for this crate
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("scipaper")
}

impl Config {
    /// Load configuration from `scipaper.toml` (if present) and the
    /// environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from an explicit file path plus the environment
    pub fn load_from(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder.add_source(config::File::with_name("scipaper").required(false)),
        };

        builder
            .add_source(
                config::Environment::with_prefix("SCIPAPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fetcher.default_limit, 10);
        assert_eq!(config.fetcher.source_timeout(), Duration::from_secs(30));
        assert_eq!(config.fetcher.authority_order[0], "crossref");
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert!(config.sources.xrxiv_dump_path.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = serde_json::from_str(r#"{"cache": {"enabled": false}}"#).unwrap();
        assert!(!parsed.cache.enabled);
        assert_eq!(parsed.cache.ttl_seconds, 3600);
        assert_eq!(parsed.fetcher.default_limit, 10);
    }

    #[test]
    fn test_default_cache_dir_ends_with_crate_name() {
        assert!(default_cache_dir().ends_with("scipaper"));
    }
}
