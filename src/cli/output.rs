//! Output formatting for the research core CLI.
//!
//! Three formats: `text` (human-readable), `json` (single pretty object),
//! `ndjson` (one compact JSON object per line, for streaming progress).

use crate::research::{ConsensusResult, ExecutionSummary, PageCacheStats};
use serde::Serialize;

/// Selected output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// A single pretty-printed JSON object.
    Json,
    /// One compact JSON object per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name, defaulting to `Text` for anything unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// True for formats meant to be consumed line-by-line as events arrive.
    #[must_use]
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Ndjson)
    }
}

/// Serializes `value` as pretty JSON, falling back to an inline error object
/// if serialization itself fails (it shouldn't, for these types).
#[must_use]
pub fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}

/// Formats page cache occupancy for `status`.
#[must_use]
pub fn format_status(db_path: &str, stats: Option<PageCacheStats>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Ndjson => {
            let body = serde_json::json!({
                "db_path": db_path,
                "available": stats.is_some(),
                "page_count": stats.map(|s| s.page_count),
                "search_count": stats.map(|s| s.search_count),
                "oldest_fetched_at": stats.and_then(|s| s.oldest_fetched_at),
            });
            if format.is_streaming() {
                body.to_string()
            } else {
                format_json(&body)
            }
        }
        OutputFormat::Text => match stats {
            Some(stats) => format!(
                "Page cache: {db_path}\n  pages:    {}\n  searches: {}\n  oldest:   {}",
                stats.page_count,
                stats.search_count,
                stats.oldest_fetched_at.map_or_else(|| "n/a".to_string(), |t| t.to_string()),
            ),
            None => format!("Page cache: {db_path}\n  unavailable (degraded after repeated open failures)"),
        },
    }
}

/// Formats a one-shot consensus search result.
#[must_use]
pub fn format_consensus(query: &str, result: &ConsensusResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(result),
        OutputFormat::Ndjson => serde_json::to_string(result).unwrap_or_default(),
        OutputFormat::Text => {
            let mut out = format!("Query: {query}\nSource: {}\nConfidence: {:?}\n", result.source, result.confidence);
            if let Some(text) = &result.consensus_text {
                out.push_str(&format!("Consensus: {text}\n"));
            }
            out.push_str(&format!("\nTop results ({}):\n", result.primary.len()));
            for (i, r) in result.primary.iter().take(5).enumerate() {
                out.push_str(&format!("  {}. {} — {}\n     {}\n", i + 1, r.title, r.url, r.snippet));
            }
            out
        }
    }
}

/// Formats a full research execution summary.
#[must_use]
pub fn format_research_summary(prompt: &str, summary: &ExecutionSummary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "prompt": prompt,
                "gate_ok": summary.gate_status.ok,
                "gate_reasons": summary.gate_status.reasons,
                "missing_criteria": summary.missing_criteria,
                "sources": summary.sources,
            });
            format_json(&body)
        }
        OutputFormat::Ndjson => {
            let body = serde_json::json!({
                "prompt": prompt,
                "gate_ok": summary.gate_status.ok,
                "missing_criteria": summary.missing_criteria,
                "source_count": summary.sources.len(),
            });
            body.to_string()
        }
        OutputFormat::Text => {
            let mut out = format!("Research: {prompt}\n\n");
            out.push_str(&format!("Actions run: {}\n", summary.results.len()));
            for r in &summary.results {
                let reason = r.reason.as_deref().map_or_else(String::new, |r| format!(" ({r})"));
                out.push_str(&format!("  - {:?}{reason}\n", r.execution_status));
            }
            out.push_str(&format!(
                "\nGate: {} ({} eligible sources, {} hosts{})\n",
                if summary.gate_status.ok { "PASS" } else { "FAIL" },
                summary.gate_status.eligible_count,
                summary.gate_status.host_count,
                if summary.gate_status.has_primary { ", has primary source" } else { "" },
            ));
            if !summary.gate_status.reasons.is_empty() {
                out.push_str(&format!("  reasons: {}\n", summary.gate_status.reasons.join("; ")));
            }
            if !summary.missing_criteria.is_empty() {
                out.push_str(&format!("Missing criteria: {}\n", summary.missing_criteria.join(", ")));
            }
            out.push_str(&format!("\nSources ({}):\n", summary.sources.len()));
            for s in &summary.sources {
                if s.is_serp_only() {
                    continue;
                }
                out.push_str(&format!("  [{:?}] {} ({}) — {}\n", s.source_tier, s.title, s.host, s.url));
            }
            out
        }
    }
}

/// Formats a top-level error for display, with a remediation hint where one
/// applies.
#[must_use]
pub fn format_error(error: &crate::Error, format: OutputFormat) -> String {
    let (kind, suggestion) = get_error_details(error);

    match format {
        OutputFormat::Json | OutputFormat::Ndjson => {
            let body = serde_json::json!({
                "error": error.to_string(),
                "kind": kind,
                "suggestion": suggestion,
            });
            if format.is_streaming() {
                body.to_string()
            } else {
                format_json(&body)
            }
        }
        OutputFormat::Text => match suggestion {
            Some(hint) => format!("{error}\nHint: {hint}"),
            None => error.to_string(),
        },
    }
}

fn get_error_details(error: &crate::Error) -> (&'static str, Option<&'static str>) {
    match error {
        crate::Error::Storage(crate::StorageError::NotInitialized) => {
            ("StorageError", Some("Run 'clawdia-research init' first"))
        }
        crate::Error::Storage(_) => ("StorageError", None),
        crate::Error::Command(_) => ("CommandError", None),
        crate::Error::InvalidState { .. } => ("InvalidState", None),
        crate::Error::Config { .. } => ("ConfigError", None),
        crate::Error::Research(research_err) => get_research_error_details(research_err),
    }
}

fn get_research_error_details(error: &crate::ResearchError) -> (&'static str, Option<&'static str>) {
    match error {
        crate::ResearchError::NoKey { .. } => {
            ("NoKey", Some("set the matching API key env var, or pass --search-backend playwright"))
        }
        crate::ResearchError::RateLimited { reason, .. } if reason == "queue_full" => {
            ("RateLimited", Some("too many concurrent searches; retry shortly"))
        }
        crate::ResearchError::RateLimited { .. } => ("RateLimited", Some("rate limit wait exceeded; retry later")),
        crate::ResearchError::Timeout { .. } => ("Timeout", Some("the operation took too long; retry")),
        crate::ResearchError::HttpStatus { .. } => ("HttpStatus", None),
        crate::ResearchError::Parse { .. } => ("Parse", None),
        crate::ResearchError::Empty { .. } => ("Empty", None),
        crate::ResearchError::Unavailable { .. } => {
            ("Unavailable", Some("the page cache is degraded; reads/writes are no-ops until it recovers"))
        }
        crate::ResearchError::Validation { .. } => ("Validation", None),
        crate::ResearchError::Cancelled { .. } => ("Cancelled", None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_to_text_for_unknown_values() {
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
    }

    #[test]
    fn ndjson_is_the_only_streaming_format() {
        assert!(OutputFormat::Ndjson.is_streaming());
        assert!(!OutputFormat::Json.is_streaming());
        assert!(!OutputFormat::Text.is_streaming());
    }

    #[test]
    fn format_status_reports_unavailable_without_stats() {
        let text = format_status("search-cache.db", None, OutputFormat::Text);
        assert!(text.contains("unavailable"));
    }

    #[test]
    fn format_status_reports_counts_when_available() {
        let stats = PageCacheStats {
            page_count: 3,
            search_count: 1,
            oldest_fetched_at: Some(100),
        };
        let text = format_status("search-cache.db", Some(stats), OutputFormat::Text);
        assert!(text.contains("pages:    3"));
    }

    #[test]
    fn get_error_details_handles_research_no_key() {
        let error = crate::Error::Research(crate::ResearchError::NoKey { service: "serper".to_string() });
        let (kind, suggestion) = get_error_details(&error);
        assert_eq!(kind, "NoKey");
        assert!(suggestion.unwrap().contains("API key"));
    }

    #[test]
    fn get_error_details_points_at_init_when_not_initialized() {
        let error = crate::Error::Storage(crate::StorageError::NotInitialized);
        let (_, suggestion) = get_error_details(&error);
        assert!(suggestion.unwrap().contains("clawdia-research init"));
    }
}
