//! Query Router & Planner (Component H).
//!
//! `classify` turns a raw prompt into `{domain, time_intent, entity_hint}`;
//! `plan` turns that classification into a `TaskSpec` whose action list
//! comes from the strategy pack matching `(domain, intent_flags)`.

use crate::research::followup::sanitize_query_for_domain;
use crate::research::model::{Budget, Domain, PlannedAction, TaskSpec};
use std::sync::LazyLock;

const SOFTWARE_KEYWORDS: &[&str] = &[
    "code", "app", "api", "sdk", "library", "framework", "repository", "package", "cli", "backend", "frontend",
];
const PHYSICAL_PROCESS_KEYWORDS: &[&str] =
    &["manufacturing", "assembly", "factory", "production line", "bottling", "packaging"];

const IMMEDIATE_KEYWORDS: &[&str] = &["today", "now", "currently", "right now", "at the moment"];
const FUTURE_KEYWORDS: &[&str] = &["tomorrow", "next", "upcoming", "soon", "later this"];

const PURCHASE_TROUBLESHOOTING_KEYWORDS: &[&str] =
    &["buy", "purchase", "price", "cost", "broken", "not working", "error", "fix", "troubleshoot"];
const LOCAL_KEYWORDS: &[&str] = &["near me", "nearby", "local", "in my area"];
const SAFETY_KEYWORDS: &[&str] = &["security", "safety", "permissions", "sandbox", "vulnerability"];

/// Urgency signal extracted from a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeIntent {
    /// "today", "now", "currently", ...
    Immediate,
    /// "tomorrow", "next", "upcoming", ...
    Future,
    /// No urgency signal detected.
    Unknown,
}

/// Result of classifying a raw user prompt.
#[derive(Debug, Clone)]
pub struct RouterResult {
    /// Domain classification.
    pub domain: Domain,
    /// Urgency signal.
    pub time_intent: TimeIntent,
    /// Up to 6 CamelCase / capitalized-token candidates found in the prompt.
    pub entity_hint: Vec<String>,
}

/// Classifies raw prompts into domain, time intent, and entity hints.
pub struct Router;

impl Router {
    /// Classifies `message`.
    #[must_use]
    pub fn classify(message: &str) -> RouterResult {
        let lower = message.to_lowercase();

        let domain = if SOFTWARE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            Domain::Software
        } else if PHYSICAL_PROCESS_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            Domain::PhysicalProcess
        } else {
            Domain::General
        };

        let time_intent = if IMMEDIATE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            TimeIntent::Immediate
        } else if FUTURE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            TimeIntent::Future
        } else {
            TimeIntent::Unknown
        };

        RouterResult {
            domain,
            time_intent,
            entity_hint: extract_entity_hints(message),
        }
    }
}

fn extract_entity_hints(message: &str) -> Vec<String> {
    static CAMEL_OR_CAPITALIZED: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"\b[A-Z][a-zA-Z0-9]*(?:[A-Z][a-zA-Z0-9]*)*\b").expect("valid regex"));

    CAMEL_OR_CAPITALIZED
        .find_iter(message)
        .map(|m| m.as_str().to_string())
        .take(6)
        .collect()
}

/// Derives the task spec's action list from a prompt and its routing
/// result.
pub struct Planner;

impl Planner {
    /// Produces a task spec for `prompt`, with `success_criteria` carried
    /// through unmodified and a default budget.
    #[must_use]
    pub fn plan(prompt: &str, router_result: &RouterResult, success_criteria: Vec<String>) -> TaskSpec {
        let lower = prompt.to_lowercase();
        let domain = router_result.domain;
        let mut queries = match domain {
            Domain::Software => tech_strategy(prompt, router_result, &lower),
            Domain::PhysicalProcess | Domain::General if LOCAL_KEYWORDS.iter().any(|kw| lower.contains(kw)) => {
                local_strategy(prompt, router_result, &lower, domain)
            }
            Domain::PhysicalProcess | Domain::General => general_strategy(prompt, &lower, domain),
        };

        if queries.is_empty() {
            queries = vec![sanitize_query_for_domain(prompt, domain)];
        }

        let budget = Budget {
            max_actions: 10,
            max_batches: 2,
            max_time_seconds: 120,
        };

        let planned_actions: Vec<PlannedAction> = queries
            .into_iter()
            .take(budget.max_actions)
            .enumerate()
            .map(|(i, q)| PlannedAction::search(format!("action-{i}"), q))
            .collect();

        TaskSpec {
            user_goal: prompt.to_string(),
            success_criteria,
            deliverable_schema: None,
            budget,
            planned_actions,
            domain: router_result.domain,
        }
    }
}

fn general_strategy(prompt: &str, lower: &str, domain: Domain) -> Vec<String> {
    let overview = if PURCHASE_TROUBLESHOOTING_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        format!("how to {prompt}")
    } else {
        format!("{prompt} overview")
    };
    vec![
        sanitize_query_for_domain(prompt, domain),
        sanitize_query_for_domain(&overview, domain),
    ]
}

fn local_strategy(prompt: &str, router_result: &RouterResult, lower: &str, domain: Domain) -> Vec<String> {
    let place = router_result.entity_hint.first().cloned().unwrap_or_else(|| "me".to_string());
    let near = format!("{prompt} near {place}");
    let hours = if FUTURE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        format!("{prompt} hours reviews this weekend")
    } else {
        format!("{prompt} hours reviews")
    };
    vec![
        sanitize_query_for_domain(&near, domain),
        sanitize_query_for_domain(&hours, domain),
    ]
}

fn tech_strategy(prompt: &str, router_result: &RouterResult, lower: &str) -> Vec<String> {
    let Some(entity) = router_result.entity_hint.first() else {
        return Vec::new();
    };

    let mut queries = vec![
        sanitize_query_for_domain(&format!("site:docs.* {entity} (install OR docs OR getting started)"), Domain::Software),
        sanitize_query_for_domain(&format!("site:github.com {entity} README"), Domain::Software),
    ];

    if SAFETY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        queries.push(sanitize_query_for_domain(
            &format!("{prompt} (security OR sandbox OR permissions)"),
            Domain::Software,
        ));
    }

    queries
}

/// Extracts the host portion of a URL, lower-cased, without scheme or
/// path. Returns the raw input if it doesn't parse as a URL.
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| url.to_lowercase())
}

fn is_github_repo_path(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .map(|u| u.path().trim_matches('/').split('/').filter(|s| !s.is_empty()).count() >= 2)
        .unwrap_or(false)
}

/// Classifies `(host, domain)` into a trust tier and primary-claims
/// eligibility. Deterministic: identical inputs always produce identical
/// output.
#[must_use]
pub fn classify_source(domain: Domain, url: &str, host: &str) -> (crate::research::model::SourceTier, bool) {
    use crate::research::model::SourceTier;

    match domain {
        Domain::Software => {
            if host.contains("docs.") || host.contains("developer") || host.contains("readthedocs") {
                (SourceTier::A, true)
            } else if host == "github.com" && is_github_repo_path(url) {
                (SourceTier::A, true)
            } else if host.ends_with("github.com") || host == "github.com" {
                (SourceTier::B, false)
            } else {
                (SourceTier::C, false)
            }
        }
        Domain::PhysicalProcess => {
            if host.ends_with(".edu") || host.ends_with(".gov") || host.contains("extension") || host.contains("standards") {
                (SourceTier::A, true)
            } else if host.contains("wikipedia") {
                (SourceTier::A, true)
            } else if host.contains("news") {
                (SourceTier::B, false)
            } else {
                (SourceTier::C, false)
            }
        }
        Domain::General => {
            if host.ends_with(".edu") || host.ends_with(".gov") || host.contains("wikipedia") {
                (SourceTier::A, true)
            } else if host.contains("docs") || host.contains("help") || host.contains("learn") {
                (SourceTier::B, false)
            } else {
                (SourceTier::C, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_software_domain() {
        let result = Router::classify("Security review process for the OpenClaw SDK");
        assert_eq!(result.domain, Domain::Software);
    }

    #[test]
    fn classify_detects_physical_process_domain() {
        let result = Router::classify("How do I start a small olive oil bottling line?");
        assert_eq!(result.domain, Domain::PhysicalProcess);
    }

    #[test]
    fn classify_extracts_entity_hints() {
        let result = Router::classify("Security review process for OpenClaw");
        assert!(result.entity_hint.contains(&"OpenClaw".to_string()));
    }

    #[test]
    fn classify_detects_immediate_time_intent() {
        let result = Router::classify("what's the weather right now");
        assert_eq!(result.time_intent, TimeIntent::Immediate);
    }

    #[test]
    fn tech_strategy_builds_three_queries_with_safety_keyword() {
        let result = Router::classify("Security review process for OpenClaw");
        let spec = Planner::plan(
            "Security review process for OpenClaw",
            &result,
            vec!["security review process".to_string()],
        );
        assert_eq!(spec.planned_actions.len(), 3);
        assert!(spec.planned_actions[0].query.contains("docs"));
        assert!(spec.planned_actions[1].query.contains("github"));
        assert!(spec.planned_actions[2].query.contains("sandbox"));
    }

    #[test]
    fn general_strategy_falls_back_to_raw_goal_when_empty() {
        let result = Router::classify("best practices for X");
        let spec = Planner::plan("best practices for X", &result, vec!["best practices".to_string()]);
        assert!(!spec.planned_actions.is_empty());
    }

    #[test]
    fn extract_host_lowercases_and_strips_scheme() {
        assert_eq!(extract_host("https://Docs.Example.COM/path"), "docs.example.com");
    }

    #[test]
    fn classify_source_is_deterministic() {
        use crate::research::model::SourceTier;
        let a = classify_source(Domain::Software, "https://docs.rs/foo", "docs.rs");
        let b = classify_source(Domain::Software, "https://docs.rs/foo", "docs.rs");
        assert_eq!(a, b);
        assert_eq!(a, (SourceTier::A, true));
    }

    #[test]
    fn classify_source_distinguishes_github_repo_from_other_github_paths() {
        use crate::research::model::SourceTier;
        let repo = classify_source(Domain::Software, "https://github.com/owner/repo", "github.com");
        assert_eq!(repo, (SourceTier::A, true));

        let other = classify_source(Domain::Software, "https://github.com/about", "github.com");
        assert_eq!(other, (SourceTier::B, false));
    }
}
