//! Paper record model shared across all sources.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The source/repository where a paper record originated
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Arxiv,
    Crossref,
    PubMed,
    #[serde(rename = "semantic")]
    SemanticScholar,
    Xrxiv,
    #[serde(untagged)]
    Other(String),
}

impl SourceType {
    /// Returns the display name of the source
    pub fn name(&self) -> &str {
        match self {
            SourceType::Arxiv => "arXiv",
            SourceType::Crossref => "Crossref",
            SourceType::PubMed => "PubMed",
            SourceType::SemanticScholar => "Semantic Scholar",
            SourceType::Xrxiv => "xrxiv dump",
            SourceType::Other(s) => s,
        }
    }

    /// Returns the source identifier used for registry lookups and statuses
    pub fn id(&self) -> &str {
        match self {
            SourceType::Arxiv => "arxiv",
            SourceType::Crossref => "crossref",
            SourceType::PubMed => "pubmed",
            SourceType::SemanticScholar => "semantic",
            SourceType::Xrxiv => "xrxiv",
            SourceType::Other(s) => s,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A publication date with partial precision.
///
/// Providers disagree on how much of a date they report: Crossref often has
/// only a year, arXiv has full timestamps, local dumps anything in between.
/// Ordering compares year, then month, then day, with an absent component
/// treated as the earliest possible value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl PartialDate {
    /// Create a year-only date
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    /// Create a year-month date
    pub fn year_month(year: i32, month: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: None,
        }
    }

    /// Create a full date
    pub fn full(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
        }
    }
}

impl Ord for PartialDate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.year, self.month.unwrap_or(0), self.day.unwrap_or(0)).cmp(&(
            other.year,
            other.month.unwrap_or(0),
            other.day.unwrap_or(0),
        ))
    }
}

impl PartialOrd for PartialDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Error returned when a date string cannot be parsed
#[derive(Debug, thiserror::Error)]
#[error("Invalid date: {0}")]
pub struct ParseDateError(String);

impl FromStr for PartialDate {
    type Err = ParseDateError;

    /// Parses "YYYY", "YYYY-MM", and "YYYY-MM-DD". A timestamp suffix
    /// ("2023-05-17T10:00:00Z") is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let date_part = s.split('T').next().unwrap_or(s);
        let mut parts = date_part.splitn(3, '-');

        let year: i32 = parts
            .next()
            .filter(|y| y.len() == 4)
            .and_then(|y| y.parse().ok())
            .ok_or_else(|| ParseDateError(s.to_string()))?;

        let month = match parts.next() {
            Some(m) => Some(
                m.parse::<u32>()
                    .ok()
                    .filter(|m| (1..=12).contains(m))
                    .ok_or_else(|| ParseDateError(s.to_string()))?,
            ),
            None => None,
        };

        let day = match parts.next() {
            Some(d) => Some(
                d.parse::<u32>()
                    .ok()
                    .filter(|d| (1..=31).contains(d))
                    .ok_or_else(|| ParseDateError(s.to_string()))?,
            ),
            None => None,
        };

        Ok(Self { year, month, day })
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.month, self.day) {
            (Some(m), Some(d)) => write!(f, "{:04}-{:02}-{:02}", self.year, m, d),
            (Some(m), None) => write!(f, "{:04}-{:02}", self.year, m),
            _ => write!(f, "{:04}", self.year),
        }
    }
}

impl Serialize for PartialDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PartialDate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A normalized paper record from any academic source.
///
/// `paper_id` together with `source` uniquely identifies the raw record; a
/// cross-source canonical identity is derived in the merge layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Source-native identifier (DOI, PMID, arXiv ID, ...)
    pub paper_id: String,

    /// Paper title
    pub title: String,

    /// Authors in citation order
    pub authors: Vec<String>,

    /// Abstract text, if the source provides one
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,

    /// Digital Object Identifier
    pub doi: Option<String>,

    /// Publication date (possibly partial)
    pub published: Option<PartialDate>,

    /// Journal or venue
    pub journal: Option<String>,

    /// Source-native page URL
    pub url: String,

    /// Direct PDF URL when known
    pub pdf_url: Option<String>,

    /// Which source produced this record
    pub source: SourceType,

    /// Opaque source payload, kept for downstream consumers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl PaperRecord {
    /// Create a record with required fields only
    pub fn new(paper_id: String, title: String, url: String, source: SourceType) -> Self {
        Self {
            paper_id,
            title,
            authors: Vec::new(),
            abstract_text: None,
            doi: None,
            published: None,
            journal: None,
            url,
            pdf_url: None,
            source,
            raw: None,
        }
    }

    /// Returns the strongest identifier available (DOI if present, else paper_id)
    pub fn primary_id(&self) -> &str {
        self.doi.as_deref().unwrap_or(&self.paper_id)
    }

    /// First author, if any
    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }
}

/// Builder for constructing `PaperRecord` values
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    record: PaperRecord,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(
        paper_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        source: SourceType,
    ) -> Self {
        Self {
            record: PaperRecord::new(paper_id.into(), title.into(), url.into(), source),
        }
    }

    /// Set authors from an iterator of names
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Set abstract text; empty strings are treated as absent
    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.record.abstract_text = Some(text);
        }
        self
    }

    /// Set DOI; empty strings are treated as absent
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        let doi = doi.into();
        if !doi.is_empty() {
            self.record.doi = Some(doi);
        }
        self
    }

    /// Set publication date from a string, ignoring unparseable values
    pub fn published_str(mut self, date: &str) -> Self {
        self.record.published = date.parse().ok();
        self
    }

    /// Set publication date
    pub fn published(mut self, date: PartialDate) -> Self {
        self.record.published = Some(date);
        self
    }

    /// Set journal/venue; empty strings are treated as absent
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        let journal = journal.into();
        if !journal.is_empty() {
            self.record.journal = Some(journal);
        }
        self
    }

    /// Set PDF URL
    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.record.pdf_url = Some(url.into());
        self
    }

    /// Attach the raw source payload
    pub fn raw(mut self, raw: serde_json::Value) -> Self {
        self.record.raw = Some(raw);
        self
    }

    /// Build the record
    pub fn build(self) -> PaperRecord {
        self.record
    }
}
