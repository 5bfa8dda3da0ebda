//! Preprint source backed by a local bioRxiv/medRxiv dump.
//!
//! The dump is a JSON Lines file, one paper per line, as produced by the
//! usual xrxiv snapshot tooling. Lines that fail to parse are skipped.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::models::{PaperBuilder, PaperRecord, SearchQuery, SourceType};
use crate::sources::{Source, SourceError};

/// Local preprint dump adapter. No network access; searching is a linear
/// scan with case-insensitive substring matching on title and abstract.
#[derive(Debug, Clone)]
pub struct XrxivSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct DumpEntry {
    id: Option<String>,
    doi: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    date: Option<String>,
    #[serde(default)]
    abstract_text: Option<String>,
    // Older dumps use "abstract" for the same field
    #[serde(rename = "abstract")]
    abstract_alt: Option<String>,
    venue: Option<String>,
    url: Option<String>,
}

impl DumpEntry {
    fn abstract_text(&self) -> Option<&str> {
        self.abstract_text
            .as_deref()
            .or(self.abstract_alt.as_deref())
    }

    fn record_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or(self.doi.as_deref())
            .filter(|id| !id.is_empty())
    }

    fn to_record(&self) -> Option<PaperRecord> {
        let id = self.record_id()?;
        let url = self
            .url
            .clone()
            .unwrap_or_else(|| format!("https://doi.org/{}", id));

        let mut builder = PaperBuilder::new(id, &self.title, url, SourceType::Xrxiv)
            .authors(self.authors.clone());

        if let Some(doi) = &self.doi {
            builder = builder.doi(doi);
        }
        if let Some(text) = self.abstract_text() {
            builder = builder.abstract_text(text);
        }
        if let Some(date) = &self.date {
            builder = builder.published_str(date);
        }
        if let Some(venue) = &self.venue {
            builder = builder.journal(venue);
        }

        Some(builder.build())
    }
}

impl XrxivSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream the dump line by line, applying `select` until it has
    /// collected enough records or the file ends.
    async fn scan<F>(&self, mut select: F, limit: usize) -> Result<Vec<PaperRecord>, SourceError>
    where
        F: FnMut(&DumpEntry) -> bool,
    {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut results = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if results.len() >= limit {
                break;
            }
            let entry: DumpEntry = match serde_json::from_str(&line) {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "Skipping malformed dump line");
                    continue;
                }
            };
            if select(&entry) {
                if let Some(record) = entry.to_record() {
                    results.push(record);
                }
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl Source for XrxivSource {
    fn id(&self) -> &str {
        "xrxiv"
    }

    fn name(&self) -> &str {
        "xrxiv (local dump)"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<PaperRecord>, SourceError> {
        let needle = query.query.to_lowercase();
        self.scan(
            |entry| {
                entry.title.to_lowercase().contains(&needle)
                    || entry
                        .abstract_text()
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
            },
            query.max_results,
        )
        .await
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<PaperRecord>, SourceError> {
        let results = self
            .scan(
                |entry| {
                    entry.id.as_deref() == Some(identifier)
                        || entry.doi.as_deref() == Some(identifier)
                },
                1,
            )
            .await?;
        Ok(results.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_dump(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    const ENTRY_A: &str = r#"{"id": "10.1101/2023.01.01.000001", "doi": "10.1101/2023.01.01.000001", "title": "Protein Folding at Scale", "authors": ["A. Biologist"], "date": "2023-01-05", "abstract": "We fold proteins.", "venue": "bioRxiv"}"#;
    const ENTRY_B: &str = r#"{"id": "10.1101/2022.12.12.000002", "title": "Viral Genomics Survey", "authors": [], "date": "2022-12-12", "abstract": "Genome sequences."}"#;

    #[tokio::test]
    async fn test_search_matches_title_and_abstract() {
        let dump = write_dump(&[ENTRY_A, ENTRY_B]);
        let source = XrxivSource::new(dump.path());

        let by_title = source
            .search(&SearchQuery::new("protein folding"))
            .await
            .unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].title, "Protein Folding at Scale");
        assert_eq!(by_title[0].source, SourceType::Xrxiv);

        let by_abstract = source
            .search(&SearchQuery::new("genome"))
            .await
            .unwrap();
        assert_eq!(by_abstract.len(), 1);
        assert_eq!(by_abstract[0].title, "Viral Genomics Survey");
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let dump = write_dump(&[ENTRY_A, ENTRY_B]);
        let source = XrxivSource::new(dump.path());

        let results = source
            .search(&SearchQuery::new("").max_results(1))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let dump = write_dump(&["not json at all", ENTRY_A]);
        let source = XrxivSource::new(dump.path());

        let results = source.search(&SearchQuery::new("protein")).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_by_doi() {
        let dump = write_dump(&[ENTRY_A, ENTRY_B]);
        let source = XrxivSource::new(dump.path());

        let record = source
            .fetch("10.1101/2023.01.01.000001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.title, "Protein Folding at Scale");
        assert!(source.fetch("10.1101/none").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_dump_is_io_error() {
        let source = XrxivSource::new("/nonexistent/dump.jsonl");
        let err = source.search(&SearchQuery::new("q")).await.unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }
}
