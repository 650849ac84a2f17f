//! Browser capability (consumed).
//!
//! The research core consumes a headless-browser capability; it does not
//! implement one. This module defines the trait boundary
//! (`acquire`/`release`/`load_url`/`eval_js`/`screenshot`) the Page Pool
//! builds on, plus a deterministic in-memory double used by tests and by
//! the CLI when no real browser is wired in.

use crate::error::Result;
use crate::research::model::PagePoolCategory;
use async_trait::async_trait;

/// Opaque handle to a checked-out browser view. Carries no state itself;
/// the concrete `Browser` implementation maps it back to a real view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub usize);

/// Headless browser capability: navigate a URL, scrape with a script, or
/// grab a screenshot. Modeled as acquire/release handles so release is
/// guaranteed on every exit path, including errors; the trait is
/// object-safe so it can be shared as `Arc<dyn Browser>`.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Checks out a view from the given category's pool. Blocks when all
    /// slots of that category are in use.
    async fn acquire(&self, category: PagePoolCategory) -> Result<ViewHandle>;

    /// Returns a view to its pool.
    async fn release(&self, view: ViewHandle);

    /// Navigates the view to `url`. Has a soft timeout; a partial read is
    /// still returned if text is already available when it fires.
    async fn load_url(&self, view: ViewHandle, url: &str) -> Result<()>;

    /// Evaluates `script` in the page and returns its JSON-serializable
    /// result.
    async fn eval_js(&self, view: ViewHandle, script: &str) -> Result<serde_json::Value>;

    /// Captures a screenshot of the current page.
    async fn screenshot(&self, view: ViewHandle) -> Result<Vec<u8>>;
}

/// Deterministic test double: serves canned DOM text keyed by exact URL
/// match, without any real network or browser process.
pub mod fake {
    use super::{Browser, ViewHandle};
    use crate::error::{Error, ResearchError, Result};
    use crate::research::model::PagePoolCategory;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory browser double keyed by exact URL match.
    pub struct FakeBrowser {
        pages: HashMap<String, String>,
        next_id: AtomicUsize,
        loaded: Mutex<HashMap<usize, String>>,
    }

    impl FakeBrowser {
        /// Creates an empty fake browser.
        #[must_use]
        pub fn new() -> Self {
            Self {
                pages: HashMap::new(),
                next_id: AtomicUsize::new(0),
                loaded: Mutex::new(HashMap::new()),
            }
        }

        /// Registers the `innerText` a given URL should resolve to.
        #[must_use]
        pub fn with_page(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
            self.pages.insert(url.into(), text.into());
            self
        }
    }

    impl Default for FakeBrowser {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Browser for FakeBrowser {
        async fn acquire(&self, _category: PagePoolCategory) -> Result<ViewHandle> {
            Ok(ViewHandle(self.next_id.fetch_add(1, Ordering::Relaxed)))
        }

        async fn release(&self, view: ViewHandle) {
            self.loaded.lock().expect("fake browser mutex poisoned").remove(&view.0);
        }

        async fn load_url(&self, view: ViewHandle, url: &str) -> Result<()> {
            self.loaded
                .lock()
                .expect("fake browser mutex poisoned")
                .insert(view.0, url.to_string());
            Ok(())
        }

        async fn eval_js(&self, view: ViewHandle, _script: &str) -> Result<serde_json::Value> {
            let url = self
                .loaded
                .lock()
                .expect("fake browser mutex poisoned")
                .get(&view.0)
                .cloned();
            let Some(url) = url else {
                return Err(Error::Research(ResearchError::Empty {
                    source: "fake_browser".to_string(),
                }));
            };
            let text = self.pages.get(&url).cloned().unwrap_or_default();
            Ok(serde_json::Value::String(text))
        }

        async fn screenshot(&self, _view: ViewHandle) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }
}
