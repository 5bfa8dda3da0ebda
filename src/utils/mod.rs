//! Shared utilities: HTTP client, retry, caching, and result merging.

pub mod cache;
pub mod http;
pub mod merge;
pub mod retry;

pub use cache::{CacheStore, FileCache, MemoryCache};
pub use http::HttpClient;
pub use merge::{canonical_key, merge_records, AuthorityRanking, CanonicalKey};
pub use retry::{api_retry_config, is_transient, with_retry, RetryConfig};
