//! Core data structures: paper records, search requests, and responses.

mod paper;
mod search;

pub use paper::{PaperBuilder, PaperRecord, ParseDateError, PartialDate, SourceType};
pub use search::{SearchQuery, SearchRequest, SearchResponse, SourceOutcome, SourceStatus};
