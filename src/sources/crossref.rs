//! Crossref source, backed by the public works API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{PaperBuilder, PaperRecord, PartialDate, SearchQuery, SourceType};
use crate::sources::{Source, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const CROSSREF_API_URL: &str = "https://api.crossref.org";

/// Crossref adapter. Searches the works index and fetches single works by
/// DOI. A contact address in the user agent opts in to Crossref's polite
/// pool, which gets better rate limits.
#[derive(Debug, Clone)]
pub struct CrossrefSource {
    client: Arc<HttpClient>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorksMessage {
    List { items: Vec<Work> },
    Single(Box<Work>),
}

#[derive(Debug, Deserialize, Default)]
struct Work {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<WorkAuthor>,
    issued: Option<WorkDate>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(default)]
    link: Vec<WorkLink>,
}

#[derive(Debug, Deserialize)]
struct WorkAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i64>>>,
}

#[derive(Debug, Deserialize)]
struct WorkLink {
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "content-type")]
    content_type: Option<String>,
}

impl CrossrefSource {
    pub fn new(mailto: Option<&str>) -> Result<Self, SourceError> {
        let user_agent = match mailto {
            Some(mailto) => format!("scipaper/0.1 (mailto:{})", mailto),
            None => "scipaper/0.1".to_string(),
        };
        Ok(Self {
            client: Arc::new(HttpClient::with_user_agent(&user_agent)?.rate_limit_per_second(10)),
            base_url: CROSSREF_API_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_work(work: &Work) -> Option<PaperRecord> {
        let doi = work.doi.as_deref().filter(|d| !d.is_empty())?;
        let title = work.title.first().cloned().unwrap_or_default();

        let authors = work.author.iter().filter_map(|a| {
            match (a.given.as_deref(), a.family.as_deref()) {
                (Some(given), Some(family)) => Some(format!("{} {}", given, family)),
                (Some(given), None) => Some(given.to_string()),
                (None, Some(family)) => Some(family.to_string()),
                (None, None) => None,
            }
        });

        let pdf_url = work.link.iter().find_map(|link| {
            (link.content_type.as_deref() == Some("application/pdf"))
                .then(|| link.url.clone())
                .flatten()
        });

        let url = work
            .url
            .clone()
            .unwrap_or_else(|| format!("https://doi.org/{}", doi));

        let mut builder = PaperBuilder::new(doi, title, url, SourceType::Crossref)
            .doi(doi)
            .authors(authors);

        if let Some(date) = Self::parse_issued(work.issued.as_ref()) {
            builder = builder.published(date);
        }
        if let Some(journal) = work.container_title.first() {
            builder = builder.journal(journal);
        }
        if let Some(abstract_text) = &work.abstract_text {
            builder = builder.abstract_text(abstract_text);
        }
        if let Some(pdf_url) = pdf_url {
            builder = builder.pdf_url(pdf_url);
        }

        Some(builder.build())
    }

    /// Crossref dates come as nested "date-parts": [[year, month, day]]
    /// with trailing parts optional.
    fn parse_issued(issued: Option<&WorkDate>) -> Option<PartialDate> {
        let parts = issued?.date_parts.first()?;
        let year = (*parts.first()?)? as i32;
        let month = parts.get(1).copied().flatten().map(|m| m as u32);
        let day = parts.get(2).copied().flatten().map(|d| d as u32);
        match (month, day) {
            (Some(m), Some(d)) if (1..=12).contains(&m) && (1..=31).contains(&d) => {
                Some(PartialDate::full(year, m, d))
            }
            (Some(m), _) if (1..=12).contains(&m) => Some(PartialDate::year_month(year, m)),
            _ => Some(PartialDate::year(year)),
        }
    }

    async fn get_json(&self, url: String) -> Result<WorksResponse, SourceError> {
        let client = Arc::clone(&self.client);
        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client.get(&url).await.send().await?;

                if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(SourceError::NotFound(url.clone()));
                }
                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "Crossref returned status {}",
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
impl Source for CrossrefSource {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "Crossref"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<PaperRecord>, SourceError> {
        // Crossref caps rows at 100 per request
        let rows = query.max_results.min(100);
        let url = format!(
            "{}/works?query={}&rows={}",
            self.base_url,
            urlencoding::encode(&query.query),
            rows,
        );

        let response = self.get_json(url).await?;
        let works = match response.message {
            WorksMessage::List { items } => items,
            WorksMessage::Single(work) => vec![*work],
        };

        Ok(works.iter().filter_map(Self::parse_work).collect())
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<PaperRecord>, SourceError> {
        let doi = identifier.trim().trim_start_matches("doi:");
        if doi.is_empty() {
            return Err(SourceError::InvalidRequest("Empty DOI".to_string()));
        }

        let url = format!("{}/works/{}", self.base_url, urlencoding::encode(doi));
        match self.get_json(url).await {
            Ok(response) => {
                let work = match response.message {
                    WorksMessage::Single(work) => Some(*work),
                    WorksMessage::List { items } => items.into_iter().next(),
                };
                Ok(work.as_ref().and_then(Self::parse_work))
            }
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
