//! Semantic Scholar source, backed by the Graph API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{PaperBuilder, PaperRecord, PartialDate, SearchQuery, SourceType};
use crate::sources::{Source, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const SEMANTIC_API_URL: &str = "https://api.semanticscholar.org";
const SEARCH_FIELDS: &str = "paperId,externalIds,title,authors,year,venue,abstract,openAccessPdf";

/// Semantic Scholar adapter. Anonymous access is throttled hard; an API
/// key raises the shared-pool limit.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    data: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authors: Vec<EntryAuthor>,
    year: Option<i32>,
    venue: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "externalIds")]
    external_ids: Option<ExternalIds>,
    #[serde(rename = "openAccessPdf")]
    open_access_pdf: Option<OpenAccessPdf>,
}

#[derive(Debug, Deserialize)]
struct EntryAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAccessPdf {
    url: Option<String>,
}

impl SemanticScholarSource {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        // The anonymous pool allows roughly 1 request per second
        let rps = if api_key.is_some() { 10 } else { 1 };
        Ok(Self {
            client: Arc::new(HttpClient::new()?.rate_limit_per_second(rps)),
            base_url: SEMANTIC_API_URL.to_string(),
            api_key,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_entry(entry: &Entry) -> Option<PaperRecord> {
        let paper_id = entry.paper_id.as_deref().filter(|id| !id.is_empty())?;
        let title = entry.title.clone().unwrap_or_default();

        let authors = entry.authors.iter().filter_map(|a| a.name.clone());

        let url = format!("https://www.semanticscholar.org/paper/{}", paper_id);
        let mut builder =
            PaperBuilder::new(paper_id, title, url, SourceType::SemanticScholar).authors(authors);

        if let Some(year) = entry.year {
            builder = builder.published(PartialDate::year(year));
        }
        if let Some(venue) = &entry.venue {
            builder = builder.journal(venue);
        }
        if let Some(text) = &entry.abstract_text {
            builder = builder.abstract_text(text);
        }
        if let Some(doi) = entry.external_ids.as_ref().and_then(|ids| ids.doi.clone()) {
            builder = builder.doi(doi);
        }
        if let Some(pdf) = entry
            .open_access_pdf
            .as_ref()
            .and_then(|pdf| pdf.url.clone())
        {
            builder = builder.pdf_url(pdf);
        }

        Some(builder.build())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<T, SourceError> {
        let client = Arc::clone(&self.client);
        let api_key = self.api_key.clone();
        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let api_key = api_key.clone();
            let url = url.clone();
            async move {
                let mut request = client.get(&url).await;
                if let Some(key) = &api_key {
                    request = request.header("x-api-key", key);
                }
                let response = request.send().await?;

                if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(SourceError::NotFound(url.clone()));
                }
                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "Semantic Scholar returned status {}",
                        response.status()
                    )));
                }

                let body = response.text().await?;
                Ok(serde_json::from_str(&body)?)
            }
        })
        .await
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<PaperRecord>, SourceError> {
        // The graph search endpoint caps limit at 100
        let limit = query.max_results.min(100);
        let url = format!(
            "{}/graph/v1/paper/search?query={}&limit={}&fields={}",
            self.base_url,
            urlencoding::encode(&query.query),
            limit,
            SEARCH_FIELDS,
        );

        let body: SearchBody = self.get_json(url).await?;
        Ok(body.data.iter().filter_map(Self::parse_entry).collect())
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<PaperRecord>, SourceError> {
        // The endpoint also accepts DOI:... and ARXIV:... prefixed ids
        let paper_id = identifier.trim();
        if paper_id.is_empty() {
            return Err(SourceError::InvalidRequest("Empty paper ID".to_string()));
        }

        let url = format!(
            "{}/graph/v1/paper/{}?fields={}",
            self.base_url,
            urlencoding::encode(paper_id),
            SEARCH_FIELDS,
        );

        match self.get_json::<Entry>(url).await {
            Ok(entry) => Ok(Self::parse_entry(&entry)),
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"{
        "total": 1,
        "data": [{
            "paperId": "abc123",
            "externalIds": {"DOI": "10.18653/v1/test", "ArXiv": "2301.00001"},
            "title": "Neural Ranking Models",
            "abstract": "We rank things.",
            "venue": "ACL",
            "year": 2019,
            "openAccessPdf": {"url": "https://aclanthology.org/test.pdf"},
            "authors": [{"authorId": "1", "name": "Grace Hopper"}]
        }]
    }"#;

    #[tokio::test]
    async fn test_search_parses_entries() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(SEARCH_BODY)
            .create_async()
            .await;

        let source = SemanticScholarSource::new(None)
            .unwrap()
            .with_base_url(server.url());
        let results = source.search(&SearchQuery::new("ranking")).await.unwrap();

        assert_eq!(results.len(), 1);
        let record = &results[0];
        assert_eq!(record.paper_id, "abc123");
        assert_eq!(record.doi.as_deref(), Some("10.18653/v1/test"));
        assert_eq!(record.authors, vec!["Grace Hopper"]);
        assert_eq!(record.published, Some(PartialDate::year(2019)));
        assert_eq!(record.source, SourceType::SemanticScholar);
        assert_eq!(
            record.pdf_url.as_deref(),
            Some("https://aclanthology.org/test.pdf")
        );
    }

    #[tokio::test]
    async fn test_api_key_header_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await;

        let source = SemanticScholarSource::new(Some("secret".to_string()))
            .unwrap()
            .with_base_url(server.url());
        source.search(&SearchQuery::new("q")).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let source = SemanticScholarSource::new(None)
            .unwrap()
            .with_base_url(server.url());
        assert!(source.fetch("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_entry_without_id_skipped() {
        let body: SearchBody =
            serde_json::from_str(r#"{"data": [{"title": "No ID"}]}"#).unwrap();
        assert!(SemanticScholarSource::parse_entry(&body.data[0]).is_none());
    }
}
