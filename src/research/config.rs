//! Settings for the research core.
//!
//! Mirrors the inherited agent config's builder + `from_env()` pattern:
//! defaults live as `DEFAULT_*` constants, every field has an environment
//! variable, and `build()` validates before producing a usable value.

use crate::error::{Error, ResearchError, Result};

/// Which search backend to prefer when more than one API key is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackendKind {
    /// `google.serper.dev`.
    Serper,
    /// `serpapi.com`.
    SerpApi,
    /// `api.bing.microsoft.com`.
    Bing,
    /// Headless-browser scraping fallback, no API key required.
    Playwright,
}

impl SearchBackendKind {
    /// Parses a backend name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `ResearchError::Validation` for unrecognized names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "serper" => Ok(Self::Serper),
            "serpapi" => Ok(Self::SerpApi),
            "bing" => Ok(Self::Bing),
            "playwright" => Ok(Self::Playwright),
            other => Err(Error::Research(ResearchError::Validation {
                reason: format!("unknown search_backend: {other}"),
            })),
        }
    }
}

/// Autonomy level for the fast-path gate's output-directory whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutonomyMode {
    /// Output directories must resolve within the whitelisted roots.
    Restricted,
    /// The whitelist check is bypassed.
    Unrestricted,
}

/// Default rate-limiter bucket capacity, shared by every named bucket.
pub const DEFAULT_BUCKET_CAPACITY: f64 = 5.0;
/// Default rate-limiter refill rate, tokens per second.
pub const DEFAULT_REFILL_RATE_PER_SEC: f64 = 0.5;
/// Default max queue depth before `acquire` rejects with `queue_full`.
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 20;
/// Default max wait in milliseconds before `acquire` rejects with `timeout`.
pub const DEFAULT_MAX_WAIT_MS: u64 = 30_000;
/// Default discovery-category page pool slot count.
pub const DEFAULT_DISCOVERY_SLOTS: usize = 3;
/// Default evidence-category page pool slot count.
pub const DEFAULT_EVIDENCE_SLOTS: usize = 5;
/// Default page cache prune horizon, in days.
pub const DEFAULT_PRUNE_DAYS: i64 = 7;
/// Default page cache open-failure threshold before going `unavailable`.
pub const DEFAULT_CACHE_OPEN_RETRIES: u32 = 3;
/// Default search result cache capacity (distinct normalized queries).
pub const DEFAULT_RESULT_CACHE_CAPACITY: usize = 100;
/// Default page cache database path, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "search-cache.db";

/// Env-backed settings consumed by the research core.
///
/// Covers the "Settings keys consumed" list: API keys per provider, the
/// preferred backend, autonomy mode, and the sizing knobs the spec leaves to
/// configuration (pool slots, cache capacity, prune horizon).
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    /// `anthropicApiKey` — forwarded to the LLM capability, not used here
    /// directly but kept so the settings provider is complete.
    pub anthropic_api_key: Option<String>,
    /// `selectedModel` — forwarded to the LLM capability.
    pub selected_model: Option<String>,
    /// `serper_api_key`.
    pub serper_api_key: Option<String>,
    /// `serpapi_api_key`.
    pub serpapi_api_key: Option<String>,
    /// `bing_api_key`.
    pub bing_api_key: Option<String>,
    /// `search_backend`.
    pub search_backend: SearchBackendKind,
    /// `autonomyMode`.
    pub autonomy_mode: AutonomyMode,
    /// Page cache database path.
    pub db_path: std::path::PathBuf,
    /// Rate limiter bucket capacity.
    pub bucket_capacity: f64,
    /// Rate limiter refill rate, tokens/sec.
    pub refill_rate_per_sec: f64,
    /// Rate limiter max queue depth.
    pub max_queue_depth: usize,
    /// Rate limiter max wait, milliseconds.
    pub max_wait_ms: u64,
    /// Page pool discovery-category slot count.
    pub discovery_slots: usize,
    /// Page pool evidence-category slot count.
    pub evidence_slots: usize,
    /// Page cache prune horizon, in days.
    pub prune_days: i64,
    /// Page cache open-failure threshold before degrading to `unavailable`.
    pub cache_open_retries: u32,
    /// Search result cache capacity.
    pub result_cache_capacity: usize,
}

impl ResearchSettings {
    /// Starts a builder seeded with defaults.
    #[must_use]
    pub fn builder() -> ResearchSettingsBuilder {
        ResearchSettingsBuilder::default()
    }

    /// Builds settings from environment variables, falling back to defaults
    /// for anything unset.
    ///
    /// # Errors
    ///
    /// Returns an error if `RESEARCH_SEARCH_BACKEND` is set to an
    /// unrecognized value.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Ok(v) = std::env::var("ANTHROPIC_API_KEY") {
            builder = builder.anthropic_api_key(v);
        }
        if let Ok(v) = std::env::var("RESEARCH_SELECTED_MODEL") {
            builder = builder.selected_model(v);
        }
        if let Ok(v) = std::env::var("SERPER_API_KEY") {
            builder = builder.serper_api_key(v);
        }
        if let Ok(v) = std::env::var("SERPAPI_API_KEY") {
            builder = builder.serpapi_api_key(v);
        }
        if let Ok(v) = std::env::var("BING_API_KEY") {
            builder = builder.bing_api_key(v);
        }
        if let Ok(v) = std::env::var("RESEARCH_SEARCH_BACKEND") {
            builder = builder.search_backend(SearchBackendKind::parse(&v)?);
        }
        if let Ok(v) = std::env::var("RESEARCH_AUTONOMY_MODE") {
            builder = builder.autonomy_mode(if v.eq_ignore_ascii_case("unrestricted") {
                AutonomyMode::Unrestricted
            } else {
                AutonomyMode::Restricted
            });
        }
        if let Ok(v) = std::env::var("RESEARCH_DB_PATH") {
            builder = builder.db_path(std::path::PathBuf::from(v));
        }

        builder.build()
    }
}

/// Builder for [`ResearchSettings`].
#[derive(Debug, Clone)]
pub struct ResearchSettingsBuilder {
    anthropic_api_key: Option<String>,
    selected_model: Option<String>,
    serper_api_key: Option<String>,
    serpapi_api_key: Option<String>,
    bing_api_key: Option<String>,
    search_backend: SearchBackendKind,
    autonomy_mode: AutonomyMode,
    db_path: std::path::PathBuf,
    bucket_capacity: f64,
    refill_rate_per_sec: f64,
    max_queue_depth: usize,
    max_wait_ms: u64,
    discovery_slots: usize,
    evidence_slots: usize,
    prune_days: i64,
    cache_open_retries: u32,
    result_cache_capacity: usize,
}

impl Default for ResearchSettingsBuilder {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            selected_model: None,
            serper_api_key: None,
            serpapi_api_key: None,
            bing_api_key: None,
            search_backend: SearchBackendKind::Serper,
            autonomy_mode: AutonomyMode::Restricted,
            db_path: std::path::PathBuf::from(DEFAULT_DB_PATH),
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            refill_rate_per_sec: DEFAULT_REFILL_RATE_PER_SEC,
            max_queue_depth: DEFAULT_MAX_QUEUE_DEPTH,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
            discovery_slots: DEFAULT_DISCOVERY_SLOTS,
            evidence_slots: DEFAULT_EVIDENCE_SLOTS,
            prune_days: DEFAULT_PRUNE_DAYS,
            cache_open_retries: DEFAULT_CACHE_OPEN_RETRIES,
            result_cache_capacity: DEFAULT_RESULT_CACHE_CAPACITY,
        }
    }
}

impl ResearchSettingsBuilder {
    /// Sets `anthropicApiKey`.
    #[must_use]
    pub fn anthropic_api_key(mut self, key: impl Into<String>) -> Self {
        self.anthropic_api_key = Some(key.into());
        self
    }

    /// Sets `selectedModel`.
    #[must_use]
    pub fn selected_model(mut self, model: impl Into<String>) -> Self {
        self.selected_model = Some(model.into());
        self
    }

    /// Sets `serper_api_key`.
    #[must_use]
    pub fn serper_api_key(mut self, key: impl Into<String>) -> Self {
        self.serper_api_key = Some(key.into());
        self
    }

    /// Sets `serpapi_api_key`.
    #[must_use]
    pub fn serpapi_api_key(mut self, key: impl Into<String>) -> Self {
        self.serpapi_api_key = Some(key.into());
        self
    }

    /// Sets `bing_api_key`.
    #[must_use]
    pub fn bing_api_key(mut self, key: impl Into<String>) -> Self {
        self.bing_api_key = Some(key.into());
        self
    }

    /// Sets `search_backend`.
    #[must_use]
    pub fn search_backend(mut self, backend: SearchBackendKind) -> Self {
        self.search_backend = backend;
        self
    }

    /// Sets `autonomyMode`.
    #[must_use]
    pub fn autonomy_mode(mut self, mode: AutonomyMode) -> Self {
        self.autonomy_mode = mode;
        self
    }

    /// Sets the page cache database path.
    #[must_use]
    pub fn db_path(mut self, path: std::path::PathBuf) -> Self {
        self.db_path = path;
        self
    }

    /// Validates and produces [`ResearchSettings`].
    ///
    /// # Errors
    ///
    /// Returns `ResearchError::Validation` if `search_backend` requires an
    /// API key that was not supplied.
    pub fn build(self) -> Result<ResearchSettings> {
        let missing_key = match self.search_backend {
            SearchBackendKind::Serper if self.serper_api_key.is_none() => Some("serper"),
            SearchBackendKind::SerpApi if self.serpapi_api_key.is_none() => Some("serpapi"),
            SearchBackendKind::Bing if self.bing_api_key.is_none() => Some("bing"),
            _ => None,
        };
        if let Some(service) = missing_key {
            return Err(Error::Research(ResearchError::NoKey {
                service: service.to_string(),
            }));
        }

        Ok(ResearchSettings {
            anthropic_api_key: self.anthropic_api_key,
            selected_model: self.selected_model,
            serper_api_key: self.serper_api_key,
            serpapi_api_key: self.serpapi_api_key,
            bing_api_key: self.bing_api_key,
            search_backend: self.search_backend,
            autonomy_mode: self.autonomy_mode,
            db_path: self.db_path,
            bucket_capacity: self.bucket_capacity,
            refill_rate_per_sec: self.refill_rate_per_sec,
            max_queue_depth: self.max_queue_depth,
            max_wait_ms: self.max_wait_ms,
            discovery_slots: self.discovery_slots,
            evidence_slots: self.evidence_slots,
            prune_days: self.prune_days,
            cache_open_retries: self.cache_open_retries,
            result_cache_capacity: self.result_cache_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_requires_serper_key() {
        let err = ResearchSettings::builder().build().unwrap_err();
        assert!(matches!(
            err,
            Error::Research(ResearchError::NoKey { service }) if service == "serper"
        ));
    }

    #[test]
    fn build_succeeds_once_matching_key_supplied() {
        let settings = ResearchSettings::builder()
            .serper_api_key("sk-test")
            .build()
            .unwrap();
        assert_eq!(settings.serper_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn scraping_backend_needs_no_key() {
        let settings = ResearchSettings::builder()
            .search_backend(SearchBackendKind::Playwright)
            .build()
            .unwrap();
        assert_eq!(settings.search_backend, SearchBackendKind::Playwright);
    }

    #[test]
    fn parse_backend_rejects_unknown_names() {
        assert!(SearchBackendKind::parse("altavista").is_err());
        assert_eq!(
            SearchBackendKind::parse("SERPER").unwrap(),
            SearchBackendKind::Serper
        );
    }
}
