//! Research core: query routing, concurrent multi-provider search with
//! consensus scoring, a headless-browser page pool, a content-addressed page
//! cache, a safety-gated fast-path tool registry, and the executor that ties
//! them together into a coverage/gate-driven research loop.

pub mod backends;
pub mod browser;
pub mod config;
pub mod consensus;
pub mod executor;
pub mod fast_path;
pub mod followup;
pub mod model;
pub mod page_cache;
pub mod page_pool;
pub mod progress;
pub mod rate_limiter;
pub mod result_cache;
pub mod router;

pub use backends::{BingBackend, ScrapingBackend, SearchBackend, SerpApiBackend, SerperBackend};
pub use browser::{Browser, ViewHandle};
pub use config::{AutonomyMode, ResearchSettings, ResearchSettingsBuilder, SearchBackendKind, DEFAULT_DB_PATH};
pub use consensus::ConsensusEngine;
pub use executor::{ActionExecutionStatus, ActionResult, EvidenceItem, ExecutionSummary, Executor};
pub use fast_path::{FastPathCommand, FastPathEntry, FastPathGate, ToolAvailability, WhichAvailability};
pub use followup::{build_follow_up_queries, derive_criterion_keywords, sanitize_query, sanitize_query_for_domain};
pub use model::{
    Budget, CachedPage, Confidence, ConsensusResult, CoverageState, Domain, GateStatus, PagePoolCategory,
    PagePoolSlot, PlannedAction, SearchResult, SourceKind, SourcePreview, SourceTier, TaskSpec,
};
pub use page_cache::{PageCache, PageCacheStats};
pub use page_pool::{PageOp, PageOpKind, PageOpResult, PagePool};
pub use progress::{ProgressEvent, ProgressPhase, ProgressSink};
pub use rate_limiter::RateLimiter;
pub use result_cache::ResultCache;
pub use router::{Planner, Router, RouterResult, TimeIntent};
