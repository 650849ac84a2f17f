//! Data model for the research core.
//!
//! Pure domain types shared by every component: search results, consensus
//! results, cached pages, source previews, task specs, coverage state, gate
//! status, and the token-bucket/page-pool primitives. No I/O lives here.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Which kind of result list a `SearchResult` came from.
///
/// `SearchResults` marks a SERP preview row used only to show "what was
/// searched" in progress UI; it is never eligible for synthesis and must be
/// filtered out of gate computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Organic web search result.
    Organic,
    /// News search result.
    News,
    /// Shopping search result.
    Shopping,
    /// Places/local search result.
    Places,
    /// Image search result.
    Images,
    /// SERP-only preview row, ineligible for synthesis or primary claims.
    SearchResults,
}

/// A single normalized search result.
///
/// Invariant: `url` is absolute HTTP(S) when eligible for fetch; otherwise
/// the result is SERP-only and not eligible for primary claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Result snippet text.
    pub snippet: String,
    /// Which backend list this came from.
    pub source_kind: Option<SourceKind>,
    /// Rank within its result list, 0-based.
    pub rank: Option<u32>,
    /// Publication date, if the provider supplied one.
    pub date: Option<String>,
}

impl SearchResult {
    /// Returns true when `url` looks like an absolute HTTP(S) URL.
    #[must_use]
    pub fn is_fetchable(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }
}

/// Agreement confidence assigned by the consensus engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Both backends agreed on an extracted fact.
    High,
    /// Only one backend succeeded, or snippet overlap was moderate.
    Medium,
    /// No agreement found, or both backends failed and a later one in
    /// preference order recovered.
    Low,
}

/// The result of racing two search backends and scoring their agreement.
///
/// Invariant: `confidence == High` implies `consensus_text` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Results from the preferred backend.
    pub primary: Vec<SearchResult>,
    /// Results from the partner backend (empty if it failed or was skipped).
    pub secondary: Vec<SearchResult>,
    /// Backend pairing tag, e.g. `"serper+serpapi"`.
    pub source: String,
    /// Extracted agreeing text, when confidence allows it.
    pub consensus_text: Option<String>,
    /// Assigned confidence.
    pub confidence: Confidence,
}

/// A page persisted in the content-addressed page cache.
///
/// `id` is a pure function of `url`: storing the same URL twice replaces the
/// row rather than creating a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPage {
    /// First 12 hex characters of `sha256(url)`.
    pub id: String,
    /// Source URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Full extracted (and compressed) content.
    pub content: String,
    /// Short summary, used by `get_page_reference`.
    pub summary: String,
    /// Unix timestamp (seconds) the page was fetched.
    pub fetched_at: i64,
    /// MIME-ish content type tag (`"article"`, `"news"`, `"search"`, ...).
    pub content_type: String,
}

/// Ordinal trust ranking derived from host and domain at classification
/// time. `A` is most trusted, `D` least. Never mutated after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceTier {
    /// Authoritative: official docs, `.gov`/`.edu`, standards bodies.
    A,
    /// Reputable secondary source.
    B,
    /// General web source.
    C,
    /// Low-trust or unclassified source.
    D,
}

/// A search result that was visited, extracted, and classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePreview {
    /// Stable identifier, used as the coverage hit key.
    pub source_id: String,
    /// Source URL.
    pub url: String,
    /// Host extracted from `url`.
    pub host: String,
    /// Page or result title.
    pub title: String,
    /// Collapsed-whitespace snippet, capped at 300 chars + an ellipsis.
    pub snippet: String,
    /// Which result list this preview came from.
    pub source_kind: SourceKind,
    /// Trust tier assigned at classification time.
    pub source_tier: SourceTier,
    /// True iff extracted text is long enough to synthesize from.
    pub eligible_for_synthesis: bool,
    /// True iff this source can substantiate claims directly.
    pub eligible_for_primary_claims: bool,
    /// Why this source was excluded from synthesis, if it was.
    pub discard_reason: Option<String>,
}

impl SourcePreview {
    /// True for previews that should be skipped by gate/coverage math: SERP
    /// rows exist only to show what was searched.
    #[must_use]
    pub fn is_serp_only(&self) -> bool {
        self.source_kind == SourceKind::SearchResults
    }
}

/// Domain classification used to pick planner strategies and host tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Domain {
    /// Code, apps, APIs, SDKs.
    Software,
    /// Manufacturing, assembly, food production.
    PhysicalProcess,
    /// Everything else.
    General,
}

impl Domain {
    /// Returns the glossary-style upper-case tag for this domain.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Software => "SOFTWARE",
            Self::PhysicalProcess => "PHYSICAL_PROCESS",
            Self::General => "GENERAL",
        }
    }
}

/// Resource budget for a single research execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum number of planned actions across the whole execution.
    pub max_actions: usize,
    /// Maximum number of action batches (follow-up rounds included).
    pub max_batches: usize,
    /// Wall-clock budget in seconds.
    pub max_time_seconds: u64,
}

/// A single planned search action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAction {
    /// Unique id within the execution.
    pub id: String,
    /// Action type; currently only `"search"`.
    pub action_type: String,
    /// Action source; currently only `"google"`.
    pub source: String,
    /// The query to run.
    pub query: String,
    /// Scheduling priority; follow-up actions use `1`.
    pub priority: u8,
    /// Why this action was planned, for progress display.
    pub reason: Option<String>,
}

impl PlannedAction {
    /// Builds a plain web search action with the default priority.
    #[must_use]
    pub fn search(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action_type: "search".to_string(),
            source: "google".to_string(),
            query: query.into(),
            priority: 0,
            reason: None,
        }
    }
}

/// A task spec produced by the planner: the goal, success criteria, budget,
/// and the initial action queue.
///
/// Invariant: `planned_actions.len() <= budget.max_actions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// The user's goal in their own words.
    pub user_goal: String,
    /// Criteria the final answer must satisfy.
    pub success_criteria: Vec<String>,
    /// Optional schema describing the expected deliverable shape.
    pub deliverable_schema: Option<serde_json::Value>,
    /// Resource budget.
    pub budget: Budget,
    /// Initial actions to execute.
    pub planned_actions: Vec<PlannedAction>,
    /// Domain classification driving strategy choice and host tiers.
    pub domain: Domain,
}

/// Tracks, per success criterion, which sources have satisfied it.
///
/// A criterion is missing iff its hit set is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageState {
    /// Criterion -> derived keyword list, computed once at reset.
    pub keywords: HashMap<String, Vec<String>>,
    /// Criterion -> set of source_ids whose text satisfied it.
    pub hits: HashMap<String, HashSet<String>>,
}

impl CoverageState {
    /// Resets coverage for a fresh set of success criteria, deriving keywords
    /// for each via `callback`.
    pub fn reset<F>(&mut self, criteria: &[String], mut derive_keywords: F)
    where
        F: FnMut(&str) -> Vec<String>,
    {
        self.keywords.clear();
        self.hits.clear();
        for criterion in criteria {
            let kws = derive_keywords(criterion);
            self.keywords.insert(criterion.clone(), kws);
            self.hits.insert(criterion.clone(), HashSet::new());
        }
    }

    /// Records that `source_id`'s lower-cased text satisfied `criterion`,
    /// iff at least `min(2, |keywords|)` of its derived keywords are
    /// present in `lower_text`.
    pub fn record_hit(&mut self, criterion: &str, source_id: &str, lower_text: &str) {
        let Some(kws) = self.keywords.get(criterion) else {
            return;
        };
        let needed = kws.len().min(2);
        let present = kws.iter().filter(|kw| lower_text.contains(kw.as_str())).count();
        if present >= needed {
            self.hits
                .entry(criterion.to_string())
                .or_default()
                .insert(source_id.to_string());
        }
    }

    /// Criteria whose hit set is still empty.
    #[must_use]
    pub fn missing_criteria(&self) -> Vec<String> {
        self.hits
            .iter()
            .filter(|(_, hits)| hits.is_empty())
            .map(|(criterion, _)| criterion.clone())
            .collect()
    }
}

/// Pass/fail verdict on whether current evidence is sufficient to
/// synthesize an answer.
///
/// Contract: `ok == (eligible_count >= 2 && host_count >= 2)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateStatus {
    /// Whether the gate passed.
    pub ok: bool,
    /// Human-readable reasons for each failed conjunct.
    pub reasons: Vec<String>,
    /// Count of synthesis-eligible sources.
    pub eligible_count: usize,
    /// Count of distinct hosts among eligible sources.
    pub host_count: usize,
    /// Whether at least one eligible source is primary-eligible.
    pub has_primary: bool,
}

impl GateStatus {
    /// Evaluates gate status from a set of source previews, considering
    /// only synthesis-eligible ones.
    #[must_use]
    pub fn evaluate<'a>(previews: impl IntoIterator<Item = &'a SourcePreview>) -> Self {
        let eligible: Vec<&SourcePreview> = previews
            .into_iter()
            .filter(|p| p.eligible_for_synthesis && !p.is_serp_only())
            .collect();

        let eligible_count = eligible.len();
        let host_count = eligible
            .iter()
            .map(|p| p.host.as_str())
            .collect::<HashSet<_>>()
            .len();
        let has_primary = eligible.iter().any(|p| p.eligible_for_primary_claims);

        let mut reasons = Vec::new();
        if eligible_count < 2 {
            reasons.push("Need at least two eligible sources".to_string());
        }
        if host_count < 2 {
            reasons.push("Need at least two hosts".to_string());
        }

        Self {
            ok: eligible_count >= 2 && host_count >= 2,
            reasons,
            eligible_count,
            host_count,
            has_primary,
        }
    }
}

/// A single queued waiter on a token bucket, used for FIFO ordering.
#[derive(Debug)]
pub struct QueuedWaiter {
    /// Monotonically increasing sequence number, for FIFO tie-breaking.
    pub sequence: u64,
}

/// State of a single named token bucket.
///
/// Invariant: `0.0 <= tokens <= capacity`; `queue` is FIFO.
#[derive(Debug)]
pub struct TokenBucketState {
    /// Maximum tokens the bucket can hold.
    pub capacity: f64,
    /// Tokens added per second.
    pub refill_rate_per_sec: f64,
    /// Current token count.
    pub tokens: f64,
    /// Monotonic nanosecond timestamp of the last refill computation.
    pub last_refill_ns: u64,
    /// FIFO queue of waiters blocked on this bucket.
    pub queue: VecDeque<QueuedWaiter>,
    /// Maximum queue depth before `acquire` rejects synchronously.
    pub max_queue_depth: usize,
    /// Maximum time a waiter may wait before `acquire` times out.
    pub max_wait_ms: u64,
}

/// Which pool of browser views a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagePoolCategory {
    /// Used for SERP loads.
    Discovery,
    /// Used for article reads.
    Evidence,
}

/// A single slot in the page pool.
///
/// Exactly one concurrent user per slot.
#[derive(Debug, Clone)]
pub struct PagePoolSlot {
    /// Slot identifier, unique within its category.
    pub slot_id: usize,
    /// Which category this slot belongs to.
    pub category: PagePoolCategory,
    /// Whether the slot is currently checked out.
    pub in_use: bool,
    /// Identifier of the task currently holding the slot, if any.
    pub owner_task: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tier_orders_a_as_most_trusted() {
        assert!(SourceTier::A < SourceTier::B);
        assert!(SourceTier::B < SourceTier::C);
        assert!(SourceTier::C < SourceTier::D);
    }

    #[test]
    fn search_result_is_fetchable_requires_absolute_http() {
        let fetchable = SearchResult {
            title: "t".into(),
            url: "https://example.com".into(),
            snippet: "s".into(),
            source_kind: None,
            rank: None,
            date: None,
        };
        assert!(fetchable.is_fetchable());

        let not_fetchable = SearchResult {
            url: "example.com".into(),
            ..fetchable
        };
        assert!(!not_fetchable.is_fetchable());
    }

    #[test]
    fn coverage_state_single_keyword_needs_one_hit() {
        let mut coverage = CoverageState::default();
        coverage.reset(&["food safety".to_string()], |_| vec!["safety".to_string()]);
        coverage.record_hit("food safety", "src-1", "this covers worker safety rules");
        assert!(coverage.missing_criteria().is_empty());
    }

    #[test]
    fn coverage_state_two_keywords_need_two_hits_in_one_snippet() {
        let mut coverage = CoverageState::default();
        coverage.reset(&["criterion".to_string()], |_| {
            vec!["alpha".to_string(), "beta".to_string()]
        });
        coverage.record_hit("criterion", "src-1", "mentions alpha only");
        assert_eq!(coverage.missing_criteria(), vec!["criterion".to_string()]);

        coverage.record_hit("criterion", "src-2", "mentions alpha and beta together");
        assert!(coverage.missing_criteria().is_empty());
    }

    #[test]
    fn gate_status_requires_two_eligible_sources_and_two_hosts() {
        let make = |host: &str, eligible: bool| SourcePreview {
            source_id: format!("id-{host}"),
            url: format!("https://{host}"),
            host: host.to_string(),
            title: "t".into(),
            snippet: "s".into(),
            source_kind: SourceKind::Organic,
            source_tier: SourceTier::B,
            eligible_for_synthesis: eligible,
            eligible_for_primary_claims: false,
            discard_reason: None,
        };

        let same_host = vec![make("a.com", true), make("a.com", true)];
        let gate = GateStatus::evaluate(&same_host);
        assert!(!gate.ok);
        assert!(gate.reasons.iter().any(|r| r.contains("two hosts")));

        let two_hosts = vec![make("a.com", true), make("b.com", true)];
        let gate = GateStatus::evaluate(&two_hosts);
        assert!(gate.ok);
        assert!(gate.reasons.is_empty());
    }

    #[test]
    fn gate_status_ignores_serp_only_previews() {
        let serp = SourcePreview {
            source_id: "serp".into(),
            url: "https://www.google.com/search?q=x".into(),
            host: "www.google.com".into(),
            title: "t".into(),
            snippet: "s".into(),
            source_kind: SourceKind::SearchResults,
            source_tier: SourceTier::D,
            eligible_for_synthesis: true,
            eligible_for_primary_claims: false,
            discard_reason: None,
        };
        assert!(serp.is_serp_only());

        let organic_a = SourcePreview {
            source_id: "a".into(),
            url: "https://a.com".into(),
            host: "a.com".into(),
            title: "t".into(),
            snippet: "s".into(),
            source_kind: SourceKind::Organic,
            source_tier: SourceTier::B,
            eligible_for_synthesis: true,
            eligible_for_primary_claims: false,
            discard_reason: None,
        };
        let organic_b = SourcePreview {
            source_id: "b".into(),
            url: "https://b.com".into(),
            host: "b.com".into(),
            ..organic_a.clone()
        };

        // Three synthesis-eligible previews, one of them SERP-only across a
        // third host; the gate must still only see the two organic ones.
        let mixed = vec![serp.clone(), organic_a, organic_b];
        let gate = GateStatus::evaluate(&mixed);
        assert_eq!(gate.eligible_count, 2);
        assert_eq!(gate.host_count, 2);
        assert!(gate.ok);

        // A single organic source plus a SERP-only one must not pass the gate,
        // even though both report `eligible_for_synthesis: true`.
        let mostly_serp = vec![serp];
        let gate = GateStatus::evaluate(&mostly_serp);
        assert_eq!(gate.eligible_count, 0);
        assert!(!gate.ok);
    }
}
