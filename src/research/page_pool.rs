//! Page Pool (Component E).
//!
//! A bounded set of headless browser views split into two categories:
//! `discovery` (SERP loads) and `evidence` (article reads). `acquire`
//! blocks when all slots of the requested category are in use; there is no
//! stealing across categories. Release is guaranteed on every exit path via
//! an RAII guard.

use crate::error::{Error, ResearchError, Result};
use crate::research::browser::{Browser, ViewHandle};
use crate::research::model::{PagePoolCategory, SearchResult, SourceKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

const LOAD_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_BATCH_SIZE: usize = 10;
const MAX_COMPRESSED_CHARS: usize = 6_000;

/// Kind of operation a batch request performs. Only `Extract` is required
/// by the research core; the rest exist for completeness of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOpKind {
    /// Extracts and compresses page text.
    Extract,
    /// Captures a screenshot.
    Screenshot,
    /// Renders the page to PDF bytes (not implemented by any `Browser`
    /// impl shipped here; reserved for the contract).
    Pdf,
    /// Records network requests made while loading (reserved).
    InterceptNetwork,
}

/// A single batch operation request.
#[derive(Debug, Clone)]
pub struct PageOp {
    /// URL to visit.
    pub url: String,
    /// What to do once loaded.
    pub kind: PageOpKind,
}

/// A semantic fragment extracted from page content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentKind {
    /// A heading.
    Headline,
    /// A paragraph of body text.
    Paragraph,
    /// A block quote.
    Quote,
    /// A list item or block.
    List,
}

/// A single semantic fragment.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// What kind of content this fragment is.
    pub kind: FragmentKind,
    /// The fragment's text.
    pub text: String,
}

/// Outcome of a single batch operation.
pub enum PageOpResult {
    /// The operation succeeded.
    Success {
        /// URL that was visited.
        url: String,
        /// Page title, if available.
        title: String,
        /// Compressed content (at most 6,000 characters).
        content: String,
        /// Optional semantic fragments.
        fragments: Vec<Fragment>,
    },
    /// The operation failed; the batch continues regardless.
    Failure {
        /// URL that failed.
        url: String,
        /// Error description.
        error: String,
    },
}

/// Bounded-concurrency headless browser pool.
pub struct PagePool {
    browser: Arc<dyn Browser>,
    discovery: Arc<Semaphore>,
    evidence: Arc<Semaphore>,
    batch_concurrency: Arc<Semaphore>,
}

impl PagePool {
    /// Creates a pool with the given slot counts per category and batch
    /// worker concurrency.
    #[must_use]
    pub fn new(
        browser: Arc<dyn Browser>,
        discovery_slots: usize,
        evidence_slots: usize,
        max_concurrency: usize,
    ) -> Self {
        Self {
            browser,
            discovery: Arc::new(Semaphore::new(discovery_slots.max(1))),
            evidence: Arc::new(Semaphore::new(evidence_slots.max(1))),
            batch_concurrency: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    async fn acquire_view(&self, category: PagePoolCategory) -> Result<(ViewHandle, tokio::sync::OwnedSemaphorePermit)> {
        let sem = match category {
            PagePoolCategory::Discovery => self.discovery.clone(),
            PagePoolCategory::Evidence => self.evidence.clone(),
        };
        let permit = sem.acquire_owned().await.map_err(|_| {
            Error::Research(ResearchError::Cancelled {
                operation: "page_pool_acquire".to_string(),
            })
        })?;
        let view = self.browser.acquire(category).await?;
        Ok((view, permit))
    }

    /// Runs a SERP search through a `discovery` view, returning up to 4
    /// results.
    ///
    /// # Errors
    ///
    /// Returns an error if a discovery view cannot be acquired or the page
    /// fails to load.
    pub async fn search_google(&self, query: &str) -> Result<Vec<SearchResult>> {
        let (view, _permit) = self.acquire_view(PagePoolCategory::Discovery).await?;
        let result = self.run_search(view, query).await;
        self.browser.release(view).await;
        result
    }

    async fn run_search(&self, view: ViewHandle, query: &str) -> Result<Vec<SearchResult>> {
        let url = google_serp_url(query);

        let load = tokio::time::timeout(LOAD_TIMEOUT, self.browser.load_url(view, &url)).await;
        if load.is_err() {
            warn!(query, "google search page load timed out");
        } else {
            load.unwrap()?;
        }

        let scraped = self
            .browser
            .eval_js(view, SERP_SCRAPE_SCRIPT)
            .await?;

        let items = scraped.as_array().cloned().unwrap_or_default();
        let results = items
            .into_iter()
            .take(4)
            .enumerate()
            .filter_map(|(rank, item)| {
                Some(SearchResult {
                    title: item.get("title")?.as_str()?.to_string(),
                    url: item.get("url")?.as_str()?.to_string(),
                    snippet: item.get("snippet").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    source_kind: Some(SourceKind::Organic),
                    rank: Some(rank as u32),
                    date: None,
                })
            })
            .collect();

        Ok(results)
    }

    /// Loads `url` through an `evidence` view and extracts its inner text.
    ///
    /// # Errors
    ///
    /// Returns an error if an evidence view cannot be acquired. A page load
    /// timeout still returns whatever text is available rather than
    /// erroring.
    pub async fn fetch_page_text(&self, url: &str) -> Result<String> {
        let (view, _permit) = self.acquire_view(PagePoolCategory::Evidence).await?;
        let result = self.run_fetch(view, url).await;
        self.browser.release(view).await;
        result
    }

    async fn run_fetch(&self, view: ViewHandle, url: &str) -> Result<String> {
        let load = tokio::time::timeout(LOAD_TIMEOUT, self.browser.load_url(view, url)).await;
        if load.is_err() {
            warn!(url, "page load soft-timed out, attempting partial read");
        } else {
            load.unwrap()?;
        }

        let value = self
            .browser
            .eval_js(view, "document.body.innerText || document.documentElement.innerText")
            .await?;

        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Runs up to 10 operations through the batch worker pool, bounded by
    /// `max_concurrency`. Never aborts the batch on a single failure.
    pub async fn execute(&self, ops: Vec<PageOp>) -> Vec<PageOpResult> {
        let ops: Vec<PageOp> = ops.into_iter().take(MAX_BATCH_SIZE).collect();
        let mut handles = Vec::with_capacity(ops.len());

        for op in ops {
            let permit = self.batch_concurrency.clone().acquire_owned().await;
            let browser = self.browser.clone();
            let evidence = self.evidence.clone();
            handles.push(tokio::spawn(async move {
                let _batch_permit = permit;
                run_op(browser, evidence, op).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(PageOpResult::Failure {
                    url: String::new(),
                    error: e.to_string(),
                }),
            }
        }
        results
    }
}

async fn run_op(browser: Arc<dyn Browser>, evidence: Arc<Semaphore>, op: PageOp) -> PageOpResult {
    let _permit = match evidence.acquire_owned().await {
        Ok(p) => p,
        Err(_) => {
            return PageOpResult::Failure {
                url: op.url,
                error: "cancelled".to_string(),
            };
        }
    };

    let view = match browser.acquire(PagePoolCategory::Evidence).await {
        Ok(v) => v,
        Err(e) => {
            return PageOpResult::Failure {
                url: op.url,
                error: e.to_string(),
            };
        }
    };

    let outcome = match op.kind {
        PageOpKind::Extract => extract(browser.as_ref(), view, &op.url).await,
        PageOpKind::Screenshot | PageOpKind::Pdf | PageOpKind::InterceptNetwork => {
            Err(Error::Research(ResearchError::Validation {
                reason: "operation kind not implemented".to_string(),
            }))
        }
    };

    browser.release(view).await;

    match outcome {
        Ok((title, content, fragments)) => PageOpResult::Success {
            url: op.url,
            title,
            content,
            fragments,
        },
        Err(e) => PageOpResult::Failure {
            url: op.url,
            error: e.to_string(),
        },
    }
}

async fn extract(
    browser: &dyn Browser,
    view: ViewHandle,
    url: &str,
) -> Result<(String, String, Vec<Fragment>)> {
    let load = tokio::time::timeout(LOAD_TIMEOUT, browser.load_url(view, url)).await;
    if load.is_ok() {
        load.unwrap()?;
    }

    let text = browser
        .eval_js(view, "document.body.innerText || document.documentElement.innerText")
        .await?
        .as_str()
        .unwrap_or_default()
        .to_string();

    let title = browser
        .eval_js(view, "document.title")
        .await
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    let (content, fragments) = compress_content(&text);
    Ok((title, content, fragments))
}

/// Compresses raw extracted text to at most 6,000 characters, preserving
/// paragraph boundaries, and splits it into semantic fragments.
#[must_use]
pub fn compress_content(raw: &str) -> (String, Vec<Fragment>) {
    let paragraphs: Vec<&str> = raw.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).collect();

    let mut compressed = String::new();
    for paragraph in &paragraphs {
        if compressed.len() + paragraph.len() + 2 > MAX_COMPRESSED_CHARS {
            break;
        }
        if !compressed.is_empty() {
            compressed.push_str("\n\n");
        }
        compressed.push_str(paragraph);
    }
    if compressed.is_empty() && !raw.is_empty() {
        compressed = raw.chars().take(MAX_COMPRESSED_CHARS).collect();
    }

    let fragments = paragraphs
        .iter()
        .map(|p| Fragment {
            kind: classify_fragment(p),
            text: (*p).to_string(),
        })
        .collect();

    (compressed, fragments)
}

fn classify_fragment(paragraph: &str) -> FragmentKind {
    let trimmed = paragraph.trim();
    if trimmed.len() < 80 && !trimmed.ends_with('.') {
        FragmentKind::Headline
    } else if trimmed.starts_with('>') || trimmed.starts_with('"') {
        FragmentKind::Quote
    } else if trimmed.starts_with('-') || trimmed.starts_with('*') {
        FragmentKind::List
    } else {
        FragmentKind::Paragraph
    }
}

/// Builds the Google SERP URL used by both the scrape fallback and progress
/// previews.
#[must_use]
pub(crate) fn google_serp_url(query: &str) -> String {
    format!("https://www.google.com/search?q={}&hl=en&num=5", urlencoding_encode(query))
}

/// Minimal percent-encoding sufficient for query strings (no external crate
/// needed for this single call site).
fn urlencoding_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

const SERP_SCRAPE_SCRIPT: &str = r"
(() => {
  const items = [];
  document.querySelectorAll('div.g, div[data-hveid]').forEach((el) => {
    if (items.length >= 4) return;
    const link = el.querySelector('a');
    const titleEl = el.querySelector('h3');
    const snippetEl = el.querySelector('div[data-sncf], span.aCOpRe, div.VwiC3b');
    if (link && titleEl) {
      items.push({
        url: link.href,
        title: titleEl.innerText,
        snippet: snippetEl ? snippetEl.innerText : '',
      });
    }
  });
  return items;
})()
";
