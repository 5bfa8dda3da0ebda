//! Source plugins with a trait-based architecture.
//!
//! This module defines the [`Source`] trait that every data provider
//! implements. New providers implement the trait and register with the
//! [`SourceRegistry`] under a unique name; the fetcher only ever talks to
//! sources through the trait.

mod arxiv;
mod crossref;
pub mod mock;
mod pubmed;
mod registry;
mod semantic;
mod xrxiv;

pub use arxiv::ArxivSource;
pub use crossref::CrossrefSource;
pub use mock::MockSource;
pub use pubmed::PubMedSource;
pub use registry::{RegistryError, SourceRegistry};
pub use semantic::SemanticScholarSource;
pub use xrxiv::XrxivSource;

use async_trait::async_trait;

use crate::models::{PaperRecord, SearchQuery};

/// Interface implemented by every data provider adapter.
///
/// # Implementing a New Source
///
/// 1. Create a struct holding whatever client state the provider needs
/// 2. Implement `id`, `name`, `search`, and `fetch`
/// 3. Register an instance with [`SourceRegistry::register`]
///
/// Implementations must be safe to call concurrently with other sources;
/// any provider-side rate limiting lives inside the adapter.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "arxiv", "crossref")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Search for papers matching the query
    async fn search(&self, query: &SearchQuery) -> Result<Vec<PaperRecord>, SourceError>;

    /// Fetch a specific paper by its source-native identifier.
    ///
    /// Returns `Ok(None)` when the identifier is well-formed but unknown to
    /// this source.
    async fn fetch(&self, identifier: &str) -> Result<Option<PaperRecord>, SourceError>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (XML, JSON, Atom, ...)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Paper not found
    #[error("Paper not found: {0}")]
    NotFound(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// IO error (local dump access)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            SourceError::RateLimit
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
