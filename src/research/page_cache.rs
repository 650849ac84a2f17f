//! Page Cache (Component F).
//!
//! Persistent, content-addressed store of fetched pages plus a record of
//! searches, backed by `SQLite` in WAL mode with an FTS5 index over page
//! content. Grounded in the inherited storage layer's schema/migration/CRUD
//! conventions.
//!
//! Initialization is retry-bounded: after `cache_open_retries` consecutive
//! open failures the cache reports itself `unavailable` and every
//! subsequent read/write becomes a no-op, so the executor can fall back to
//! inline content instead of propagating an error.

use crate::research::model::CachedPage;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, warn};

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS pages (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    summary TEXT NOT NULL,
    fetched_at INTEGER NOT NULL,
    content_length INTEGER NOT NULL,
    compressed_length INTEGER NOT NULL,
    content_type TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url);
CREATE INDEX IF NOT EXISTS idx_pages_fetched_at ON pages(fetched_at);

CREATE VIRTUAL TABLE IF NOT EXISTS pages_fts USING fts5(
    content,
    content='pages',
    content_rowid='rowid',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS pages_ai AFTER INSERT ON pages BEGIN
    INSERT INTO pages_fts(rowid, content) VALUES (new.rowid, new.content);
END;

CREATE TRIGGER IF NOT EXISTS pages_ad AFTER DELETE ON pages BEGIN
    INSERT INTO pages_fts(pages_fts, rowid, content) VALUES('delete', old.rowid, old.content);
END;

CREATE TRIGGER IF NOT EXISTS pages_au AFTER UPDATE ON pages BEGIN
    INSERT INTO pages_fts(pages_fts, rowid, content) VALUES('delete', old.rowid, old.content);
    INSERT INTO pages_fts(rowid, content) VALUES (new.rowid, new.content);
END;

CREATE TABLE IF NOT EXISTS searches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    results_json TEXT NOT NULL,
    searched_at INTEGER NOT NULL,
    source TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_searches_query ON searches(query);
CREATE INDEX IF NOT EXISTS idx_searches_searched_at ON searches(searched_at);
";

/// Computes the content-addressed page id: first 12 hex chars of
/// `sha256(url)`.
#[must_use]
pub fn page_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{digest:x}").chars().take(12).collect()
}

enum State {
    Open(Connection),
    Unavailable,
}

/// Snapshot of page cache occupancy, returned by [`PageCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCacheStats {
    /// Rows in the `pages` table.
    pub page_count: i64,
    /// Rows in the `searches` table.
    pub search_count: i64,
    /// Oldest `fetched_at` (Unix epoch seconds) across all pages, if any.
    pub oldest_fetched_at: Option<i64>,
}

/// Persistent, content-addressed page + search cache.
pub struct PageCache {
    state: Mutex<State>,
    open_retries: u32,
}

impl PageCache {
    /// Opens (creating if needed) a page cache database at `path`, retrying
    /// up to `open_retries` times before degrading to `unavailable`.
    #[must_use]
    pub fn open<P: AsRef<Path>>(path: P, open_retries: u32) -> Self {
        let path = path.as_ref();
        let mut last_err = None;
        for attempt in 1..=open_retries.max(1) {
            match Self::try_open(path) {
                Ok(conn) => return Self { state: Mutex::new(State::Open(conn)), open_retries },
                Err(e) => {
                    warn!(attempt, error = %e, "page cache open attempt failed");
                    last_err = Some(e);
                }
            }
        }
        error!(error = ?last_err, "page cache unavailable after exhausting open retries");
        Self {
            state: Mutex::new(State::Unavailable),
            open_retries,
        }
    }

    /// Opens an in-memory page cache, for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("in-memory sqlite open cannot fail");
        conn.execute_batch(SCHEMA_SQL).expect("schema is valid sql");
        Self {
            state: Mutex::new(State::Open(conn)),
            open_retries: 1,
        }
    }

    fn try_open(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        let _: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(conn)
    }

    /// True once the cache has degraded to `unavailable` and stopped doing
    /// real I/O.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(*self.state.lock().expect("page cache mutex poisoned"), State::Unavailable)
    }

    /// Stores (or replaces) a page, keyed by `page_id(url)`. Returns `None`
    /// when the cache is unavailable.
    #[must_use]
    pub fn store_page(&self, url: &str, title: &str, content: &str, content_type: &str) -> Option<String> {
        let id = page_id(url);
        let summary = make_summary(content);
        let fetched_at = now();

        self.with_open(|conn| {
            conn.execute(
                r"
                INSERT INTO pages (id, url, title, content, summary, fetched_at, content_length, compressed_length, content_type)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    url = excluded.url,
                    title = excluded.title,
                    content = excluded.content,
                    summary = excluded.summary,
                    fetched_at = excluded.fetched_at,
                    content_length = excluded.content_length,
                    compressed_length = excluded.compressed_length,
                    content_type = excluded.content_type
                ",
                params![id, url, title, content, summary, fetched_at, content.len() as i64, content_type],
            )
        })?;

        Some(id)
    }

    /// Fetches a page by id.
    #[must_use]
    pub fn get_page(&self, id: &str) -> Option<CachedPage> {
        self.with_open(|conn| {
            conn.query_row(
                "SELECT id, url, title, content, summary, fetched_at, content_type FROM pages WHERE id = ?1",
                params![id],
                row_to_page,
            )
            .optional()
        })
        .flatten()
    }

    /// Fetches a page by URL, optionally rejecting entries older than
    /// `max_age_ms`.
    #[must_use]
    pub fn get_page_by_url(&self, url: &str, max_age_ms: Option<i64>) -> Option<CachedPage> {
        let page = self.with_open(|conn| {
            conn.query_row(
                "SELECT id, url, title, content, summary, fetched_at, content_type FROM pages WHERE url = ?1",
                params![url],
                row_to_page,
            )
            .optional()
        })
        .flatten()?;

        if let Some(max_age_ms) = max_age_ms {
            let age_ms = (now() - page.fetched_at) * 1000;
            if age_ms > max_age_ms {
                return None;
            }
        }
        Some(page)
    }

    /// Returns a window of up to `max_chars` around the first
    /// case-insensitive occurrence of `keyword`, snapped to paragraph
    /// boundaries when within 500 chars, with `[...]` markers on
    /// truncation. Falls back to the leading window when absent.
    #[must_use]
    pub fn get_page_section(&self, id: &str, keyword: &str, max_chars: usize) -> Option<String> {
        let page = self.get_page(id)?;
        Some(extract_section(&page.content, keyword, max_chars))
    }

    /// Builds the cache reference string that crosses the LLM boundary:
    /// `[cached:<id>] "<title>" (<host>) — <summary>`.
    #[must_use]
    pub fn get_page_reference(&self, id: &str) -> Option<String> {
        let page = self.get_page(id)?;
        let host = crate::research::router::extract_host(&page.url);
        Some(format!("[cached:{}] \"{}\" ({}) — {}", page.id, page.title, host, page.summary))
    }

    /// Deletes pages and searches older than `cutoff_ms` (Unix epoch
    /// milliseconds).
    pub fn prune_older_than(&self, cutoff_ms: i64) {
        let cutoff_s = cutoff_ms / 1000;
        self.with_open(|conn| {
            conn.execute("DELETE FROM pages WHERE fetched_at < ?1", params![cutoff_s])?;
            conn.execute("DELETE FROM searches WHERE searched_at < ?1", params![cutoff_s])
        });
    }

    /// Records a search's raw result JSON for audit/replay purposes.
    pub fn record_search(&self, query: &str, results_json: &str, source: &str) {
        let searched_at = now();
        self.with_open(|conn| {
            conn.execute(
                "INSERT INTO searches (query, results_json, searched_at, source) VALUES (?1, ?2, ?3, ?4)",
                params![query, results_json, searched_at, source],
            )
        });
    }

    /// Snapshot of cache occupancy. `None` when the cache is unavailable.
    #[must_use]
    pub fn stats(&self) -> Option<PageCacheStats> {
        self.with_open(|conn| {
            let page_count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
            let search_count: i64 = conn.query_row("SELECT COUNT(*) FROM searches", [], |row| row.get(0))?;
            let oldest_fetched_at: Option<i64> =
                conn.query_row("SELECT MIN(fetched_at) FROM pages", [], |row| row.get(0))?;
            Ok(PageCacheStats {
                page_count,
                search_count,
                oldest_fetched_at,
            })
        })
    }

    fn with_open<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Option<T> {
        let mut state = self.state.lock().expect("page cache mutex poisoned");
        match &mut *state {
            State::Open(conn) => match f(conn) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "page cache operation failed, returning null");
                    None
                }
            },
            State::Unavailable => None,
        }
    }
}

fn row_to_page(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedPage> {
    Ok(CachedPage {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        summary: row.get(4)?,
        fetched_at: row.get(5)?,
        content_type: row.get(6)?,
    })
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

fn make_summary(content: &str) -> String {
    content.chars().take(200).collect()
}

/// Walks `idx` back to the nearest preceding UTF-8 char boundary in `s`.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Walks `idx` forward to the nearest following UTF-8 char boundary in `s`.
fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn extract_section(content: &str, keyword: &str, max_chars: usize) -> String {
    let lower = content.to_lowercase();
    let keyword_lower = keyword.to_lowercase();

    let Some(pos) = lower.find(&keyword_lower) else {
        let window: String = content.chars().take(max_chars).collect();
        return if window.len() < content.len() {
            format!("{window}[…]")
        } else {
            window
        };
    };
    let pos = floor_char_boundary(content, pos.min(content.len()));

    let half = max_chars / 2;
    let mut start = floor_char_boundary(content, pos.saturating_sub(half));
    let mut end = ceil_char_boundary(content, (pos + keyword.len() + half).min(content.len()));

    if pos.saturating_sub(start) <= 500 {
        if let Some(boundary) = content[..start].rfind("\n\n") {
            start = floor_char_boundary(content, boundary + 2);
        }
    }
    if end.saturating_sub(pos) <= 500 {
        if let Some(offset) = content[end..].find("\n\n") {
            end = ceil_char_boundary(content, end + offset);
        }
    }

    let mut window = content[start..end].to_string();
    if start > 0 {
        window = format!("[…]{window}");
    }
    if end < content.len() {
        window = format!("{window}[…]");
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_id_is_deterministic_from_url() {
        let a = page_id("https://example.com/a");
        let b = page_id("https://example.com/a");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
    }

    #[test]
    fn store_page_twice_replaces_the_row() {
        let cache = PageCache::in_memory();
        let id1 = cache.store_page("https://example.com", "T1", "content one", "article").unwrap();
        let id2 = cache.store_page("https://example.com", "T2", "content two", "article").unwrap();
        assert_eq!(id1, id2);

        let page = cache.get_page(&id1).unwrap();
        assert_eq!(page.title, "T2");
        assert_eq!(page.content, "content two");
    }

    #[test]
    fn get_page_reference_round_trips() {
        let cache = PageCache::in_memory();
        let id = cache
            .store_page("https://example.com/page", "My Title", "Body text here.", "article")
            .unwrap();
        let reference = cache.get_page_reference(&id).unwrap();
        assert!(reference.starts_with(&format!("[cached:{id}]")));
        assert!(reference.contains("My Title"));

        let stored = cache.get_page(&id).unwrap();
        assert_eq!(stored.content, "Body text here.");
    }

    #[test]
    fn get_page_section_falls_back_to_leading_window_when_keyword_absent() {
        let content = "alpha beta gamma delta".repeat(5);
        let section = extract_section(&content, "not-present-keyword", 20);
        assert!(section.starts_with("alpha"));
        assert!(section.ends_with("[…]"));
    }

    #[test]
    fn get_page_section_centers_on_keyword() {
        let content = format!("{}NEEDLE{}", "a".repeat(300), "b".repeat(300));
        let section = extract_section(&content, "needle", 100);
        assert!(section.to_lowercase().contains("needle"));
    }

    #[test]
    fn get_page_section_does_not_panic_on_multi_byte_boundaries() {
        // "café" / em dash / smart quotes put multi-byte chars right at the
        // byte offsets a naive half-window split would slice through.
        let filler = "café — “quoted” café — ".repeat(40);
        let content = format!("{filler}NEEDLE{filler}");
        let section = extract_section(&content, "needle", 37);
        assert!(section.to_lowercase().contains("needle"));
    }

    #[test]
    fn stats_counts_pages_and_searches() {
        let cache = PageCache::in_memory();
        cache.store_page("https://example.com/a", "A", "content a", "article");
        cache.store_page("https://example.com/b", "B", "content b", "article");
        cache.record_search("query", "[]", "serper");

        let stats = cache.stats().unwrap();
        assert_eq!(stats.page_count, 2);
        assert_eq!(stats.search_count, 1);
        assert!(stats.oldest_fetched_at.is_some());
    }

    #[test]
    fn stats_is_none_when_unavailable() {
        let cache = PageCache {
            state: Mutex::new(State::Unavailable),
            open_retries: 3,
        };
        assert!(cache.stats().is_none());
    }

    #[test]
    fn unavailable_cache_is_a_no_op() {
        let cache = PageCache {
            state: Mutex::new(State::Unavailable),
            open_retries: 3,
        };
        assert!(cache.is_unavailable());
        assert!(cache.store_page("https://x.com", "t", "c", "article").is_none());
        assert!(cache.get_page("anything").is_none());
    }
}
