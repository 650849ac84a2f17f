//! Search backend set (Component B).
//!
//! Each backend is a function `query -> {results, source_tag}` going through
//! the rate limiter's `"search"` bucket. Backends: Serper (primary JSON),
//! SerpApi (fallback JSON), Bing (paid web search), and a scraping fallback
//! driven by the page pool when no API key is configured.

use crate::error::{Error, ResearchError, Result};
use crate::research::model::{SearchResult, SourceKind};
use crate::research::page_pool::PagePool;
use crate::research::rate_limiter::RateLimiter;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Uniform contract every search backend implements.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend tag used in `ConsensusResult::source` (e.g. `"serper"`).
    fn tag(&self) -> &'static str;

    /// Runs a plain web search. An empty `Vec` is not an error.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// Primary JSON search backend: `google.serper.dev`.
pub struct SerperBackend {
    client: reqwest::Client,
    api_key: String,
    limiter: Arc<RateLimiter>,
}

impl SerperBackend {
    /// Creates a new Serper backend with the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.into(),
            limiter,
        }
    }

    /// Runs a specialized search against one of Serper's sub-endpoints
    /// (`news`, `shopping`, `places`, `images`).
    ///
    /// # Errors
    ///
    /// Returns `ResearchError::HttpStatus` or `ResearchError::Parse` on
    /// failure.
    pub async fn search_specialized(
        &self,
        endpoint: &str,
        query: &str,
        num: u32,
        kind: SourceKind,
    ) -> Result<Vec<SearchResult>> {
        self.limiter.acquire("search").await?;
        let url = format!("https://google.serper.dev/{endpoint}");

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "q": query, "num": num }))
            .send()
            .await
            .map_err(|e| Error::Research(ResearchError::HttpStatus {
                status: e.status().map_or(0, |s| s.as_u16()),
                url: url.clone(),
            }))?;

        if !response.status().is_success() {
            return Err(Error::Research(ResearchError::HttpStatus {
                status: response.status().as_u16(),
                url,
            }));
        }

        let body: SerperResponse = response.json().await.map_err(|e| {
            Error::Research(ResearchError::Parse {
                source: "serper".to_string(),
                message: e.to_string(),
            })
        })?;

        Ok(body.into_results(kind))
    }
}

#[async_trait]
impl SearchBackend for SerperBackend {
    fn tag(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.search_specialized("search", query, 8, SourceKind::Organic)
            .await
    }
}

#[derive(Debug, Deserialize, Default)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperItem>,
    #[serde(default)]
    news: Vec<SerperItem>,
    #[serde(default)]
    shopping: Vec<SerperItem>,
    #[serde(default)]
    places: Vec<SerperItem>,
    #[serde(default)]
    images: Vec<SerperItem>,
}

#[derive(Debug, Deserialize)]
struct SerperItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
}

impl SerperResponse {
    fn into_results(self, kind: SourceKind) -> Vec<SearchResult> {
        let items = match kind {
            SourceKind::News => self.news,
            SourceKind::Shopping => self.shopping,
            SourceKind::Places => self.places,
            SourceKind::Images => self.images,
            SourceKind::Organic | SourceKind::SearchResults => self.organic,
        };
        items
            .into_iter()
            .enumerate()
            .map(|(rank, item)| SearchResult {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
                source_kind: Some(kind),
                rank: Some(rank as u32),
                date: item.date,
            })
            .collect()
    }
}

/// Fallback JSON search backend: `serpapi.com`.
pub struct SerpApiBackend {
    client: reqwest::Client,
    api_key: String,
    limiter: Arc<RateLimiter>,
}

impl SerpApiBackend {
    /// Creates a new `SerpApi` backend with the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.into(),
            limiter,
        }
    }
}

#[async_trait]
impl SearchBackend for SerpApiBackend {
    fn tag(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.limiter.acquire("search").await?;
        let url = "https://serpapi.com/search.json";

        let response = self
            .client
            .get(url)
            .query(&[
                ("q", query),
                ("engine", "google"),
                ("num", "8"),
                ("api_key", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| Error::Research(ResearchError::HttpStatus {
                status: e.status().map_or(0, |s| s.as_u16()),
                url: url.to_string(),
            }))?;

        if !response.status().is_success() {
            return Err(Error::Research(ResearchError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            }));
        }

        let body: SerpApiResponse = response.json().await.map_err(|e| {
            Error::Research(ResearchError::Parse {
                source: "serpapi".to_string(),
                message: e.to_string(),
            })
        })?;

        Ok(body
            .organic_results
            .into_iter()
            .enumerate()
            .map(|(rank, item)| SearchResult {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
                source_kind: Some(SourceKind::Organic),
                rank: Some(rank as u32),
                date: None,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize, Default)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiItem>,
}

#[derive(Debug, Deserialize)]
struct SerpApiItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Paid web search fallback: `api.bing.microsoft.com`.
pub struct BingBackend {
    client: reqwest::Client,
    api_key: String,
    limiter: Arc<RateLimiter>,
}

impl BingBackend {
    /// Creates a new Bing backend with the given subscription key.
    #[must_use]
    pub fn new(api_key: impl Into<String>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.into(),
            limiter,
        }
    }
}

#[async_trait]
impl SearchBackend for BingBackend {
    fn tag(&self) -> &'static str {
        "bing"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.limiter.acquire("search").await?;
        let url = "https://api.bing.microsoft.com/v7.0/search";

        let response = self
            .client
            .get(url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&[("q", query), ("count", "8")])
            .send()
            .await
            .map_err(|e| Error::Research(ResearchError::HttpStatus {
                status: e.status().map_or(0, |s| s.as_u16()),
                url: url.to_string(),
            }))?;

        if !response.status().is_success() {
            return Err(Error::Research(ResearchError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            }));
        }

        let body: BingResponse = response.json().await.map_err(|e| {
            Error::Research(ResearchError::Parse {
                source: "bing".to_string(),
                message: e.to_string(),
            })
        })?;

        Ok(body
            .web_pages
            .value
            .into_iter()
            .enumerate()
            .map(|(rank, item)| SearchResult {
                title: item.name,
                url: item.url,
                snippet: item.snippet,
                source_kind: Some(SourceKind::Organic),
                rank: Some(rank as u32),
                date: None,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize, Default)]
struct BingResponse {
    #[serde(rename = "webPages", default)]
    web_pages: BingWebPages,
}

#[derive(Debug, Deserialize, Default)]
struct BingWebPages {
    #[serde(default)]
    value: Vec<BingItem>,
}

#[derive(Debug, Deserialize)]
struct BingItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: String,
}

/// Scraping fallback, used when no API key is configured. Drives Google's
/// SERP through the page pool's `search_google` operation.
pub struct ScrapingBackend {
    pool: Arc<PagePool>,
}

impl ScrapingBackend {
    /// Creates a scraping backend over the given page pool.
    #[must_use]
    pub fn new(pool: Arc<PagePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchBackend for ScrapingBackend {
    fn tag(&self) -> &'static str {
        "scrape"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        debug!(query, "falling back to scraping backend");
        self.pool.search_google(query).await
    }
}

/// Runs `search` and logs a warning on failure rather than propagating,
/// returning `None` so callers can race multiple backends without one
/// failure aborting the whole race.
pub async fn search_or_warn(backend: &dyn SearchBackend, query: &str) -> Option<Vec<SearchResult>> {
    match backend.search(query).await {
        Ok(results) => Some(results),
        Err(err) => {
            warn!(backend = backend.tag(), error = %err, "search backend failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serper_response_routes_specialized_lists() {
        let body = SerperResponse {
            organic: vec![],
            news: vec![SerperItem {
                title: "Headline".into(),
                link: "https://news.example.com".into(),
                snippet: "snippet".into(),
                date: Some("2026-01-01".into()),
            }],
            shopping: vec![],
            places: vec![],
            images: vec![],
        };
        let results = body.into_results(SourceKind::News);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_kind, Some(SourceKind::News));
        assert_eq!(results[0].date.as_deref(), Some("2026-01-01"));
    }
}
