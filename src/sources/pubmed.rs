//! PubMed source, backed by the NCBI E-utilities API.
//!
//! Searching is a two-step protocol: esearch returns matching PMIDs as
//! JSON, efetch returns full article metadata as XML.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{PaperBuilder, PaperRecord, PartialDate, SearchQuery, SourceType};
use crate::sources::{Source, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const PUBMED_API_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const TOOL_NAME: &str = "scipaper";

/// PubMed adapter. NCBI requires a contact email with every request and
/// allows 3 requests per second without an API key, 10 with one.
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: Arc<HttpClient>,
    base_url: String,
    email: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(rename = "MedlineCitation")]
    citation: MedlineCitation,
    #[serde(rename = "PubmedData")]
    pubmed_data: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
struct MedlineCitation {
    #[serde(rename = "PMID")]
    pmid: TextValue,
    #[serde(rename = "Article")]
    article: ArticleMeta,
}

#[derive(Debug, Deserialize)]
struct ArticleMeta {
    #[serde(rename = "ArticleTitle")]
    title: Option<TextValue>,
    #[serde(rename = "Abstract")]
    abstract_section: Option<AbstractSection>,
    #[serde(rename = "AuthorList")]
    author_list: Option<AuthorList>,
    #[serde(rename = "Journal")]
    journal: Option<Journal>,
}

#[derive(Debug, Deserialize)]
struct AbstractSection {
    #[serde(rename = "AbstractText", default)]
    text: Vec<TextValue>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(rename = "LastName")]
    last_name: Option<TextValue>,
    #[serde(rename = "ForeName")]
    fore_name: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    #[serde(rename = "Title")]
    title: Option<TextValue>,
    #[serde(rename = "JournalIssue")]
    issue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
struct JournalIssue {
    #[serde(rename = "PubDate")]
    pub_date: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
struct PubDate {
    #[serde(rename = "Year")]
    year: Option<TextValue>,
    #[serde(rename = "Month")]
    month: Option<TextValue>,
    #[serde(rename = "Day")]
    day: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct PubmedData {
    #[serde(rename = "ArticleIdList")]
    article_ids: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType")]
    id_type: Option<String>,
    #[serde(rename = "$text")]
    value: Option<String>,
}

/// An XML element whose attributes we ignore, keeping only the text
#[derive(Debug, Deserialize)]
struct TextValue {
    #[serde(rename = "$text")]
    value: Option<String>,
}

impl TextValue {
    fn text(&self) -> &str {
        self.value.as_deref().unwrap_or("").trim()
    }
}

impl PubMedSource {
    pub fn new(email: impl Into<String>, api_key: Option<String>) -> Result<Self, SourceError> {
        let rps = if api_key.is_some() { 10 } else { 3 };
        Ok(Self {
            client: Arc::new(HttpClient::new()?.rate_limit_per_second(rps)),
            base_url: PUBMED_API_URL.to_string(),
            email: email.into(),
            api_key,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn identify_params(&self) -> String {
        let mut params = format!(
            "email={}&tool={}",
            urlencoding::encode(&self.email),
            TOOL_NAME
        );
        if let Some(key) = &self.api_key {
            params.push_str("&api_key=");
            params.push_str(key);
        }
        params
    }

    fn parse_article(article: &Article) -> Option<PaperRecord> {
        let pmid = article.citation.pmid.text();
        if pmid.is_empty() {
            return None;
        }

        let meta = &article.citation.article;
        let title = meta.title.as_ref().map(TextValue::text).unwrap_or_default();

        let authors: Vec<String> = meta
            .author_list
            .iter()
            .flat_map(|list| &list.authors)
            .filter_map(|author| {
                match (
                    author.fore_name.as_ref().map(TextValue::text),
                    author.last_name.as_ref().map(TextValue::text),
                ) {
                    (Some(fore), Some(last)) => Some(format!("{} {}", fore, last)),
                    (None, Some(last)) => Some(last.to_string()),
                    _ => None,
                }
            })
            .collect();

        let abstract_text = meta.abstract_section.as_ref().map(|section| {
            section
                .text
                .iter()
                .map(TextValue::text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        });

        let doi = article
            .pubmed_data
            .as_ref()
            .and_then(|data| data.article_ids.as_ref())
            .and_then(|list| {
                list.ids.iter().find_map(|id| {
                    (id.id_type.as_deref() == Some("doi"))
                        .then(|| id.value.clone())
                        .flatten()
                })
            });

        let mut builder = PaperBuilder::new(
            pmid,
            title,
            format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
            SourceType::PubMed,
        )
        .authors(authors);

        if let Some(text) = abstract_text {
            builder = builder.abstract_text(text);
        }
        if let Some(doi) = doi {
            builder = builder.doi(doi);
        }
        if let Some(journal) = &meta.journal {
            if let Some(title) = &journal.title {
                builder = builder.journal(title.text());
            }
            if let Some(date) = journal
                .issue
                .as_ref()
                .and_then(|issue| issue.pub_date.as_ref())
                .and_then(Self::parse_pub_date)
            {
                builder = builder.published(date);
            }
        }

        Some(builder.build())
    }

    fn parse_pub_date(date: &PubDate) -> Option<PartialDate> {
        let year: i32 = date.year.as_ref()?.text().parse().ok()?;
        let month = date
            .month
            .as_ref()
            .and_then(|m| Self::parse_month(m.text()));
        let day = date
            .day
            .as_ref()
            .and_then(|d| d.text().parse::<u32>().ok())
            .filter(|d| (1..=31).contains(d));
        match (month, day) {
            (Some(m), Some(d)) => Some(PartialDate::full(year, m, d)),
            (Some(m), None) => Some(PartialDate::year_month(year, m)),
            _ => Some(PartialDate::year(year)),
        }
    }

    /// PubMed months are either numeric or English abbreviations
    fn parse_month(month: &str) -> Option<u32> {
        if let Ok(m) = month.parse::<u32>() {
            return (1..=12).contains(&m).then_some(m);
        }
        let prefix: String = month.to_lowercase().chars().take(3).collect();
        let m = match prefix.as_str() {
            "jan" => 1,
            "feb" => 2,
            "mar" => 3,
            "apr" => 4,
            "may" => 5,
            "jun" => 6,
            "jul" => 7,
            "aug" => 8,
            "sep" => 9,
            "oct" => 10,
            "nov" => 11,
            "dec" => 12,
            _ => return None,
        };
        Some(m)
    }

    async fn get_text(&self, url: String) -> Result<String, SourceError> {
        let client = Arc::clone(&self.client);
        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client.get(&url).await.send().await?;

                if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !response.status().is_success() {
                    return Err(SourceError::Api(format!(
                        "PubMed returned status {}",
                        response.status()
                    )));
                }

                Ok(response.text().await?)
            }
        })
        .await
    }

    async fn efetch(&self, pmids: &[String]) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml&rettype=abstract&{}",
            self.base_url,
            pmids.join(","),
            self.identify_params(),
        );
        let xml = self.get_text(url).await?;
        let set: ArticleSet = quick_xml::de::from_str(&xml)?;
        Ok(set.articles.iter().filter_map(Self::parse_article).collect())
    }
}

#[async_trait]
impl Source for PubMedSource {
    fn id(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<PaperRecord>, SourceError> {
        // NCBI caps retmax at 100 for our use
        let retmax = query.max_results.min(100);
        let url = format!(
            "{}/esearch.fcgi?db=pubmed&term={}&retmax={}&retmode=json&{}",
            self.base_url,
            urlencoding::encode(&query.query),
            retmax,
            self.identify_params(),
        );

        let body = self.get_text(url).await?;
        let esearch: EsearchResponse = serde_json::from_str(&body)?;

        if esearch.esearchresult.idlist.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = self.efetch(&esearch.esearchresult.idlist).await?;
        records.truncate(query.max_results);
        Ok(records)
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<PaperRecord>, SourceError> {
        let pmid = identifier
            .trim()
            .trim_start_matches("PMID:")
            .trim()
            .to_string();
        if pmid.is_empty() || !pmid.chars().all(|c| c.is_ascii_digit()) {
            return Err(SourceError::InvalidRequest(format!(
                "Not a PMID: {}",
                identifier
            )));
        }

        let records = self.efetch(&[pmid]).await?;
        Ok(records.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EFETCH_XML: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">12345678</PMID>
      <Article>
        <Journal>
          <JournalIssue>
            <PubDate>
              <Year>2021</Year>
              <Month>Mar</Month>
              <Day>15</Day>
            </PubDate>
          </JournalIssue>
          <Title>Journal of Testing</Title>
        </Journal>
        <ArticleTitle>A Biomedical Study</ArticleTitle>
        <Abstract>
          <AbstractText>Background text.</AbstractText>
          <AbstractText>Results text.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author>
            <LastName>Curie</LastName>
            <ForeName>Marie</ForeName>
          </Author>
          <Author>
            <LastName>Pasteur</LastName>
          </Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">12345678</ArticleId>
        <ArticleId IdType="doi">10.1000/test.2021</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_efetch_xml() {
        let set: ArticleSet = quick_xml::de::from_str(EFETCH_XML).unwrap();
        let record = PubMedSource::parse_article(&set.articles[0]).unwrap();

        assert_eq!(record.paper_id, "12345678");
        assert_eq!(record.title, "A Biomedical Study");
        assert_eq!(record.authors, vec!["Marie Curie", "Pasteur"]);
        assert_eq!(
            record.abstract_text.as_deref(),
            Some("Background text. Results text.")
        );
        assert_eq!(record.doi.as_deref(), Some("10.1000/test.2021"));
        assert_eq!(record.journal.as_deref(), Some("Journal of Testing"));
        assert_eq!(record.published, Some(PartialDate::full(2021, 3, 15)));
        assert_eq!(record.url, "https://pubmed.ncbi.nlm.nih.gov/12345678/");
    }

    #[test]
    fn test_parse_month_names() {
        assert_eq!(PubMedSource::parse_month("Jan"), Some(1));
        assert_eq!(PubMedSource::parse_month("December"), Some(12));
        assert_eq!(PubMedSource::parse_month("7"), Some(7));
        assert_eq!(PubMedSource::parse_month("13"), None);
        assert_eq!(PubMedSource::parse_month("Smarch"), None);
    }

    #[tokio::test]
    async fn test_search_two_step() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex("esearch".to_string()))
            .with_status(200)
            .with_body(r#"{"esearchresult": {"idlist": ["12345678"]}}"#)
            .create_async()
            .await;
        server
            .mock("GET", mockito::Matcher::Regex("efetch".to_string()))
            .with_status(200)
            .with_body(EFETCH_XML)
            .create_async()
            .await;

        let source = PubMedSource::new("dev@example.com", None)
            .unwrap()
            .with_base_url(server.url());
        let results = source.search(&SearchQuery::new("biomedical")).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, SourceType::PubMed);
    }

    #[tokio::test]
    async fn test_search_no_hits_skips_efetch() {
        let mut server = mockito::Server::new_async().await;
        let esearch = server
            .mock("GET", mockito::Matcher::Regex("esearch".to_string()))
            .with_status(200)
            .with_body(r#"{"esearchresult": {"idlist": []}}"#)
            .create_async()
            .await;
        let efetch = server
            .mock("GET", mockito::Matcher::Regex("efetch".to_string()))
            .expect(0)
            .create_async()
            .await;

        let source = PubMedSource::new("dev@example.com", None)
            .unwrap()
            .with_base_url(server.url());
        let results = source.search(&SearchQuery::new("nothing")).await.unwrap();

        esearch.assert_async().await;
        efetch.assert_async().await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_pmid() {
        let source = PubMedSource::new("dev@example.com", None).unwrap();
        let err = source.fetch("10.1234/doi").await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidRequest(_)));
    }
}
