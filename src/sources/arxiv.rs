//! arXiv source, backed by the public Atom query API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use feed_rs::parser;

use crate::models::{PaperBuilder, PaperRecord, PartialDate, SearchQuery, SourceType};
use crate::sources::{Source, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

/// arXiv adapter. Searches via the Atom API and fetches single papers by
/// arXiv ID.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl ArxivSource {
    pub fn new() -> Result<Self, SourceError> {
        // arXiv asks for no more than one request per three seconds from
        // automated clients, but one per second is tolerated for bursts.
        Ok(Self {
            client: Arc::new(HttpClient::new()?.rate_limit_per_second(1)),
            base_url: ARXIV_API_URL.to_string(),
        })
    }

    /// Point the adapter at a different endpoint (for testing)
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Normalize an arXiv ID from its common spellings.
    ///
    /// Accepts "2301.12345", "2301.12345v2", "arxiv:2301.12345", and
    /// abstract URLs; the version suffix is always stripped.
    pub fn parse_id(id: &str) -> Result<String, SourceError> {
        let id = id.trim().to_lowercase();

        if let Some(abs_pos) = id.find("/abs/") {
            let after = &id[abs_pos + 5..];
            let id = after.split('/').next().unwrap_or(after);
            return Ok(id.split('v').next().unwrap_or(id).to_string());
        }

        let id = id.strip_prefix("arxiv:").unwrap_or(&id);
        let id = id.split('v').next().unwrap_or(id);

        if id.is_empty() {
            return Err(SourceError::InvalidRequest("Empty arXiv ID".to_string()));
        }

        Ok(id.to_string())
    }

    fn parse_entry(entry: &feed_rs::model::Entry) -> Result<PaperRecord, SourceError> {
        // Entry IDs look like http://arxiv.org/abs/2301.12345v1
        let paper_id = entry
            .id
            .split("/abs/")
            .last()
            .and_then(|s| s.split('v').next())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SourceError::Parse("Missing arXiv entry ID".to_string()))?
            .to_string();

        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .unwrap_or_default();

        let authors = entry.authors.iter().map(|a| a.name.clone());

        let mut builder = PaperBuilder::new(&paper_id, title, entry.id.clone(), SourceType::Arxiv)
            .authors(authors)
            .pdf_url(format!("{}/{}.pdf", ARXIV_PDF_URL, paper_id));

        if let Some(summary) = &entry.summary {
            builder = builder.abstract_text(summary.content.trim());
        }
        if let Some(published) = entry.published {
            builder = builder.published(PartialDate::full(
                published.year(),
                published.month(),
                published.day(),
            ));
        }

        Ok(builder.build())
    }

    async fn query_feed(&self, url: String) -> Result<feed_rs::model::Feed, SourceError> {
        let client = Arc::clone(&self.client);
        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client
                    .get(&url)
                    .await
                    .header("Accept", "application/atom+xml")
                    .send()
                    .await?;

                if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "arXiv returned status {}",
                        response.status()
                    )));
                }

                let bytes = response.bytes().await?;
                parser::parse(bytes.as_ref())
                    .map_err(|e| SourceError::Parse(format!("Atom feed: {}", e)))
            }
        })
        .await
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<PaperRecord>, SourceError> {
        // arXiv caps a single page at 200 entries
        let max_results = query.max_results.min(200);
        let url = format!(
            "{}?search_query={}&max_results={}&sortBy=relevance&sortOrder=descending",
            self.base_url,
            urlencoding::encode(&format!("all:{}", query.query)),
            max_results,
        );

        let feed = self.query_feed(url).await?;
        feed.entries.iter().map(Self::parse_entry).collect()
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<PaperRecord>, SourceError> {
        let paper_id = Self::parse_id(identifier)?;
        let url = format!("{}?id_list={}&max_results=1", self.base_url, paper_id);

        let feed = self.query_feed(url).await?;
        match feed.entries.first() {
            Some(entry) => Ok(Some(Self::parse_entry(entry)?)),
            None => Ok(None),
        }
    }
}
