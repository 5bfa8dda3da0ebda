//! # scipaper
//!
//! Concurrent multi-source search and retrieval of academic paper
//! metadata, with cross-source deduplication, ranking, and caching.
//!
//! ## Architecture
//!
//! - [`models`]: Core data structures (PaperRecord, SearchRequest, etc.)
//! - [`sources`]: Provider adapters behind the [`Source`] trait
//! - [`fetcher`]: Concurrent orchestration across sources
//! - [`utils`]: HTTP client, retry, result merging, and caching
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use scipaper::config::Config;
//! use scipaper::fetcher::Fetcher;
//! use scipaper::models::SearchRequest;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::from_config(Config::load()?)?;
//! let response = fetcher
//!     .search(&SearchRequest::new("graph neural networks").limit(20))
//!     .await?;
//! for record in &response.records {
//!     println!("{} ({})", record.title, record.source.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod fetcher;
pub mod models;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use fetcher::{FetchError, Fetcher};
pub use models::{PaperRecord, SearchRequest, SearchResponse};
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
