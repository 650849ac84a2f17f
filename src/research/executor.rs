//! Research Executor (Component J).
//!
//! Drives plan execution: pops planned actions off a queue, visits their top
//! results through the Page Pool, records source previews, updates coverage,
//! and — once, when the initial queue first empties — asks the Follow-up
//! Generator for more queries if the gate hasn't passed yet. Grounded in the
//! inherited agent orchestrator's plan → fan-out → collect → gate shape.

use crate::research::followup::{build_follow_up_queries, derive_criterion_keywords};
use crate::research::model::{
    CoverageState, Domain, GateStatus, PlannedAction, SourceKind, SourcePreview, TaskSpec,
};
use crate::research::page_pool::{google_serp_url, PagePool};
use crate::research::progress::{ProgressEvent, ProgressPhase, ProgressSink};
use crate::research::router::{classify_source, extract_host};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::warn;

const MAX_RESULTS_PER_ACTION: usize = 3;
const MAX_SNIPPET_CHARS: usize = 300;
const MIN_ELIGIBLE_TEXT_LEN: usize = 500;
const MAX_FOLLOW_UP_QUERIES: usize = 2;

/// Outcome of a single planned action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionExecutionStatus {
    /// At least one result was visited and recorded.
    Succeeded,
    /// The search step itself failed (search backend/page pool error).
    Failed,
    /// The search ran but returned nothing usable.
    Discarded,
}

/// A fetched, classified piece of evidence.
#[derive(Debug, Clone)]
pub struct EvidenceItem {
    /// The classified source preview.
    pub preview: SourcePreview,
    /// Full extracted text, used for coverage keyword matching.
    pub extracted_text: String,
}

/// Result of executing a single planned action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// Human-readable terminal status.
    pub status: String,
    /// Every preview produced while executing this action, including the
    /// initial "running" preview.
    pub previews: Vec<SourcePreview>,
    /// Evidence items with text long enough to drive coverage.
    pub evidence: Vec<EvidenceItem>,
    /// URLs actually visited.
    pub visited_links: Vec<String>,
    /// Terminal execution status.
    pub execution_status: ActionExecutionStatus,
    /// Reason, populated for `failed`/`discarded`.
    pub reason: Option<String>,
}

/// Final output of a research execution.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Every action result, in execution order.
    pub results: Vec<ActionResult>,
    /// Final gate verdict.
    pub gate_status: GateStatus,
    /// Success criteria still unmet at the end of the run.
    pub missing_criteria: Vec<String>,
    /// All recorded source previews, deduplicated by `source_id`.
    pub sources: Vec<SourcePreview>,
}

/// Orchestrates plan execution against a page pool, emitting progress events
/// along the way.
pub struct Executor {
    page_pool: Arc<PagePool>,
    progress: ProgressSink,
}

impl Executor {
    /// Creates an executor over a shared page pool, emitting events on
    /// `progress`.
    #[must_use]
    pub fn new(page_pool: Arc<PagePool>, progress: ProgressSink) -> Self {
        Self { page_pool, progress }
    }

    /// Runs the full executor protocol for `spec`, returning a well-formed
    /// `ExecutionSummary` even when zero evidence is gathered.
    pub async fn run(&self, spec: &TaskSpec) -> ExecutionSummary {
        let mut coverage = CoverageState::default();
        coverage.reset(&spec.success_criteria, |criterion| {
            derive_criterion_keywords(spec.domain, criterion)
        });

        let mut source_map: HashMap<String, SourcePreview> = HashMap::new();
        let mut queue: VecDeque<PlannedAction> = spec.planned_actions.iter().cloned().collect();
        let mut results = Vec::new();
        let mut follow_up_round = 0u32;
        let mut actions_run = 0usize;

        self.progress.emit(ProgressEvent {
            actions: Some(queue.iter().map(|a| a.id.clone()).collect()),
            ..ProgressEvent::new(ProgressPhase::Intake, "plan ready")
        });

        while let Some(action) = queue.pop_front() {
            actions_run += 1;
            let result = self.execute_action(&action, spec.domain).await;

            for evidence in &result.evidence {
                source_map
                    .entry(evidence.preview.source_id.clone())
                    .or_insert_with(|| evidence.preview.clone());
            }
            for preview in &result.previews {
                if !source_map.contains_key(&preview.source_id) {
                    source_map.insert(preview.source_id.clone(), preview.clone());
                }
            }

            for evidence in &result.evidence {
                let lower_text = evidence.extracted_text.to_lowercase();
                for criterion in &spec.success_criteria {
                    coverage.record_hit(criterion, &evidence.preview.source_id, &lower_text);
                }
            }

            let eligible_previews: Vec<&SourcePreview> = source_map.values().collect();
            let gate = GateStatus::evaluate(eligible_previews.iter().copied());

            self.progress.emit(ProgressEvent {
                sources: Some(source_map.keys().cloned().collect()),
                gate_status: Some(gate.clone()),
                ..ProgressEvent::new(ProgressPhase::Executing, format!("action {} finished", action.id))
            });

            results.push(result);

            if queue.is_empty() && follow_up_round == 0 {
                let missing = coverage.missing_criteria();
                let remaining = spec.budget.max_actions.saturating_sub(actions_run);
                if (!missing.is_empty() || !gate.ok) && remaining > 0 {
                    let existing_hosts: Vec<String> =
                        source_map.values().map(|p| p.host.clone()).collect();
                    let limit = MAX_FOLLOW_UP_QUERIES.min(remaining);
                    let follow_ups = build_follow_up_queries(spec.domain, &missing, &existing_hosts, limit);

                    for (i, query) in follow_ups.into_iter().enumerate() {
                        let mut action = PlannedAction::search(format!("followup-{i}"), query);
                        action.priority = 1;
                        queue.push_back(action);
                    }
                    follow_up_round = 1;
                }
            }
        }

        let final_sources: Vec<SourcePreview> = source_map.into_values().collect();
        let gate_status = GateStatus::evaluate(&final_sources);
        let missing_criteria = coverage.missing_criteria();

        self.progress.emit(ProgressEvent {
            gate_status: Some(gate_status.clone()),
            checkpoint_number: Some(1),
            ..ProgressEvent::new(ProgressPhase::Checkpoint, "execution complete")
        });
        self.progress.emit(ProgressEvent::new(ProgressPhase::Done, "done"));

        ExecutionSummary {
            results,
            gate_status,
            missing_criteria,
            sources: final_sources,
        }
    }

    async fn execute_action(&self, action: &PlannedAction, domain: Domain) -> ActionResult {
        let serp_url = google_serp_url(&action.query);
        self.progress.emit(ProgressEvent {
            active_source_url: Some(serp_url.clone()),
            ..ProgressEvent::new(ProgressPhase::Executing, format!("running {}", action.query))
        });

        let running_preview = serp_preview(&action.query, &serp_url);

        let search_results = match self.page_pool.search_google(&action.query).await {
            Ok(results) => results,
            Err(e) => {
                warn!(action = action.id, error = %e, "search step failed");
                return ActionResult {
                    status: "failed".to_string(),
                    previews: vec![running_preview],
                    evidence: Vec::new(),
                    visited_links: Vec::new(),
                    execution_status: ActionExecutionStatus::Failed,
                    reason: Some(e.to_string()),
                };
            }
        };

        if search_results.is_empty() {
            return ActionResult {
                status: "discarded".to_string(),
                previews: vec![running_preview],
                evidence: Vec::new(),
                visited_links: Vec::new(),
                execution_status: ActionExecutionStatus::Discarded,
                reason: Some("No results returned".to_string()),
            };
        }

        let mut previews = vec![running_preview];
        let mut evidence = Vec::new();
        let mut visited_links = Vec::new();

        for result in search_results.into_iter().take(MAX_RESULTS_PER_ACTION) {
            if !result.is_fetchable() {
                continue;
            }

            let text = match self.page_pool.fetch_page_text(&result.url).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(url = result.url, error = %e, "evidence fetch failed, skipping");
                    continue;
                }
            };
            visited_links.push(result.url.clone());

            let host = extract_host(&result.url);
            let (tier, primary_eligible) = classify_source(domain, &result.url, &host);
            let eligible_for_synthesis = text.len() >= MIN_ELIGIBLE_TEXT_LEN;

            let preview = SourcePreview {
                source_id: result.url.clone(),
                url: result.url.clone(),
                host,
                title: result.title.clone(),
                snippet: make_snippet(&text),
                source_kind: result.source_kind.unwrap_or(SourceKind::Organic),
                source_tier: tier,
                eligible_for_synthesis,
                eligible_for_primary_claims: primary_eligible,
                discard_reason: if eligible_for_synthesis {
                    None
                } else {
                    Some("Content too compact".to_string())
                },
            };

            previews.push(preview.clone());
            evidence.push(EvidenceItem {
                preview,
                extracted_text: text,
            });
        }

        ActionResult {
            status: "succeeded".to_string(),
            previews,
            evidence,
            visited_links,
            execution_status: ActionExecutionStatus::Succeeded,
            reason: None,
        }
    }
}

fn serp_preview(query: &str, serp_url: &str) -> SourcePreview {
    let host = extract_host(serp_url);
    SourcePreview {
        source_id: serp_url.to_string(),
        url: serp_url.to_string(),
        host,
        title: format!("Search: {query}"),
        snippet: String::new(),
        source_kind: SourceKind::SearchResults,
        source_tier: crate::research::model::SourceTier::D,
        eligible_for_synthesis: false,
        eligible_for_primary_claims: false,
        discard_reason: None,
    }
}

fn make_snippet(text: &str) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_SNIPPET_CHARS {
        collapsed
    } else {
        let truncated: String = collapsed.chars().take(MAX_SNIPPET_CHARS).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::browser::fake::FakeBrowser;
    use crate::research::model::Budget;

    fn spec(success_criteria: Vec<String>, actions: Vec<PlannedAction>) -> TaskSpec {
        TaskSpec {
            user_goal: "goal".to_string(),
            success_criteria,
            deliverable_schema: None,
            budget: Budget {
                max_actions: 10,
                max_batches: 2,
                max_time_seconds: 120,
            },
            planned_actions: actions,
            domain: Domain::General,
        }
    }

    #[tokio::test]
    async fn zero_evidence_still_returns_well_formed_summary() {
        let browser: Arc<dyn crate::research::browser::Browser> = Arc::new(FakeBrowser::new());
        let pool = Arc::new(PagePool::new(browser, 2, 2, 2));
        let (sink, _rx) = ProgressSink::channel();
        let executor = Executor::new(pool, sink);

        let task_spec = spec(vec!["criterion".to_string()], vec![]);
        let summary = executor.run(&task_spec).await;

        assert!(summary.sources.is_empty());
        assert!(!summary.gate_status.ok);
        assert_eq!(summary.missing_criteria, vec!["criterion".to_string()]);
    }

    #[tokio::test]
    async fn action_with_no_search_results_is_discarded() {
        let browser: Arc<dyn crate::research::browser::Browser> = Arc::new(FakeBrowser::new());
        let pool = Arc::new(PagePool::new(browser, 2, 2, 2));
        let (sink, _rx) = ProgressSink::channel();
        let executor = Executor::new(pool, sink);

        let action = PlannedAction::search("action-0", "anything");
        let task_spec = spec(vec![], vec![action]);
        let summary = executor.run(&task_spec).await;

        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.results[0].execution_status, ActionExecutionStatus::Discarded);
        assert!(!summary.gate_status.ok);
    }

    #[tokio::test]
    async fn running_preview_is_recorded_as_serp_only() {
        let browser: Arc<dyn crate::research::browser::Browser> = Arc::new(FakeBrowser::new());
        let pool = Arc::new(PagePool::new(browser, 2, 2, 2));
        let (sink, _rx) = ProgressSink::channel();
        let executor = Executor::new(pool, sink);

        let action = PlannedAction::search("action-0", "best pesto recipe");
        let result = executor.execute_action(&action, Domain::General).await;

        assert_eq!(result.previews.len(), 1);
        assert!(result.previews[0].is_serp_only());
    }

    #[test]
    fn make_snippet_truncates_and_collapses_whitespace() {
        let text = "word ".repeat(100);
        let snippet = make_snippet(&text);
        assert!(snippet.ends_with('…'));
        assert!(snippet.chars().count() <= MAX_SNIPPET_CHARS + 1);
    }
}
