//! Consensus Engine (Component C).
//!
//! Races a primary and secondary search backend, or falls back sequentially
//! through the remaining backends in preference order, then scores
//! agreement between the two successful result sets.

use crate::error::{Error, ResearchError, Result};
use crate::research::backends::SearchBackend;
use crate::research::model::{Confidence, ConsensusResult, SearchResult};
use crate::research::result_cache::ResultCache;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

/// TTL for general search consensus results.
pub const TTL_GENERAL: Duration = Duration::from_secs(5 * 60);
/// TTL for specialized search (news/shopping/places/images).
pub const TTL_SPECIALIZED: Duration = Duration::from_secs(30 * 60);
/// TTL for news results specifically.
pub const TTL_NEWS: Duration = Duration::from_secs(60 * 60);

static NUMERIC_TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\$\d+(?:\.\d+)?(?:/\w+)?").expect("valid regex"),
        Regex::new(r"\d+(?:\.\d+)?%").expect("valid regex"),
        Regex::new(r"\b\d{1,2}:\d{2}\s?(?:am|pm)?\b").expect("valid regex"),
        Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid regex"),
        Regex::new(r"\b\d+(?:,\d{3})*(?:\.\d+)?\b").expect("valid regex"),
    ]
});

static KEY_FACT_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(is|are|was|were|costs?|opens?|closes?|starts?|launched)\b").expect("valid regex")
});

/// Races two backends and returns their agreement, consulting and updating
/// `cache` along the way.
pub struct ConsensusEngine {
    backends: Vec<Arc<dyn SearchBackend>>,
    cache: Arc<ResultCache>,
}

impl ConsensusEngine {
    /// Creates an engine over an ordered backend preference list. Index 0
    /// is preferred primary, index 1 is the default secondary partner.
    #[must_use]
    pub fn new(backends: Vec<Arc<dyn SearchBackend>>, cache: Arc<ResultCache>) -> Self {
        Self { backends, cache }
    }

    /// Resolves a query to a consensus result, consulting the cache first.
    ///
    /// # Errors
    ///
    /// Returns `ResearchError::Empty` if every configured backend fails.
    pub async fn resolve(&self, query: &str) -> Result<ConsensusResult> {
        let normalized = ResultCache::normalize(query);
        if let Some(cached) = self.cache.get(&normalized, TTL_GENERAL) {
            debug!(query, "consensus cache hit");
            return Ok(cached);
        }

        let result = self.compute(query).await?;
        self.cache.put(normalized, result.clone());
        Ok(result)
    }

    async fn compute(&self, query: &str) -> Result<ConsensusResult> {
        let Some(primary) = self.backends.first() else {
            return Err(Error::Research(ResearchError::Empty {
                source: "consensus_engine".to_string(),
            }));
        };
        let secondary = self.backends.get(1);

        let (primary_res, secondary_res) = match secondary {
            Some(secondary) => tokio::join!(primary.search(query), secondary.search(query)),
            None => (primary.search(query).await, Ok(Vec::new())),
        };

        match (primary_res, secondary_res) {
            (Ok(p), Ok(s)) if secondary.is_some() => Ok(self.score_agreement(primary.tag(), secondary.unwrap().tag(), p, s)),
            (Ok(p), _) => Ok(ConsensusResult {
                primary: p,
                secondary: Vec::new(),
                source: primary.tag().to_string(),
                consensus_text: None,
                confidence: Confidence::Medium,
            }),
            (Err(_), secondary_res) => {
                // The secondary backend already fired concurrently with the primary;
                // if it succeeded, it's the first fallback candidate in preference
                // order (spec §4.C.3), not a result to discard.
                if let (Some(secondary), Ok(results)) = (secondary, secondary_res) {
                    info!(backend = secondary.tag(), "consensus fell back to concurrently-fetched secondary");
                    return Ok(ConsensusResult {
                        primary: results,
                        secondary: Vec::new(),
                        source: secondary.tag().to_string(),
                        consensus_text: None,
                        confidence: Confidence::Low,
                    });
                }
                self.fallback_sequential(query).await
            }
        }
    }

    async fn fallback_sequential(&self, query: &str) -> Result<ConsensusResult> {
        for backend in self.backends.iter().skip(2) {
            if let Ok(results) = backend.search(query).await {
                info!(backend = backend.tag(), "consensus fell back sequentially");
                return Ok(ConsensusResult {
                    primary: results,
                    secondary: Vec::new(),
                    source: backend.tag().to_string(),
                    consensus_text: None,
                    confidence: Confidence::Low,
                });
            }
        }
        Err(Error::Research(ResearchError::Empty {
            source: "consensus_engine".to_string(),
        }))
    }

    fn score_agreement(
        &self,
        primary_tag: &str,
        secondary_tag: &str,
        primary: Vec<SearchResult>,
        secondary: Vec<SearchResult>,
    ) -> ConsensusResult {
        let source = format!("{primary_tag}+{secondary_tag}");

        if let Some(text) = numeric_token_agreement(&primary, &secondary) {
            return ConsensusResult {
                primary,
                secondary,
                source,
                consensus_text: Some(text),
                confidence: Confidence::High,
            };
        }

        if key_fact_sentence_agreement(&primary, &secondary) {
            let text = primary.first().map(|r| r.snippet.clone());
            return ConsensusResult {
                primary,
                secondary,
                source,
                consensus_text: text,
                confidence: Confidence::High,
            };
        }

        if let Some(text) = top_snippet_overlap(&primary, &secondary) {
            return ConsensusResult {
                primary,
                secondary,
                source,
                consensus_text: Some(text),
                confidence: Confidence::Medium,
            };
        }

        ConsensusResult {
            primary,
            secondary,
            source,
            consensus_text: None,
            confidence: Confidence::Low,
        }
    }
}

fn extract_numeric_tokens(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for pattern in NUMERIC_TOKEN_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            tokens.insert(m.as_str().to_string());
        }
    }
    tokens
}

fn bag_numeric_tokens(results: &[SearchResult]) -> HashSet<String> {
    results.iter().flat_map(|r| extract_numeric_tokens(&r.snippet)).collect()
}

fn numeric_token_agreement(primary: &[SearchResult], secondary: &[SearchResult]) -> Option<String> {
    let primary_tokens = bag_numeric_tokens(primary);
    let secondary_tokens = bag_numeric_tokens(secondary);
    let shared: Vec<&String> = primary_tokens.intersection(&secondary_tokens).collect();
    let token = shared.first()?;

    primary
        .iter()
        .find(|r| r.snippet.contains(token.as_str()))
        .map(|r| r.snippet.clone())
}

fn key_fact_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() >= 10 && s.len() <= 150)
        .filter(|s| KEY_FACT_VERB.is_match(s))
        .map(str::to_string)
        .collect()
}

fn word_set(sentence: &str) -> HashSet<String> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_lowercase)
        .collect()
}

fn sentences_similar(a: &str, b: &str) -> bool {
    let wa = word_set(a);
    let wb = word_set(b);
    if wa.is_empty() || wb.is_empty() {
        return false;
    }
    let overlap = wa.intersection(&wb).count();
    let smaller = wa.len().min(wb.len());
    overlap as f64 >= 0.6 * smaller as f64
}

fn key_fact_sentence_agreement(primary: &[SearchResult], secondary: &[SearchResult]) -> bool {
    let primary_sentences: Vec<String> = primary.iter().flat_map(|r| key_fact_sentences(&r.snippet)).collect();
    let secondary_sentences: Vec<String> = secondary.iter().flat_map(|r| key_fact_sentences(&r.snippet)).collect();

    primary_sentences
        .iter()
        .any(|a| secondary_sentences.iter().any(|b| sentences_similar(a, b)))
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 { 0.0 } else { intersection / union }
}

fn top_snippet_overlap(primary: &[SearchResult], secondary: &[SearchResult]) -> Option<String> {
    let p0 = primary.first()?;
    let s0 = secondary.first()?;
    let overlap = jaccard(&word_set(&p0.snippet), &word_set(&s0.snippet));
    if overlap >= 0.5 {
        Some(p0.snippet.clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::result_cache::ResultCache;

    fn result(snippet: &str) -> SearchResult {
        SearchResult {
            title: "t".into(),
            url: "https://example.com".into(),
            snippet: snippet.into(),
            source_kind: None,
            rank: None,
            date: None,
        }
    }

    struct StubBackend {
        tag: &'static str,
        outcome: Result<Vec<SearchResult>>,
    }

    #[async_trait::async_trait]
    impl SearchBackend for StubBackend {
        fn tag(&self) -> &'static str {
            self.tag
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
            match &self.outcome {
                Ok(results) => Ok(results.clone()),
                Err(_) => Err(Error::Research(ResearchError::Empty { source: self.tag.to_string() })),
            }
        }
    }

    #[tokio::test]
    async fn primary_failure_falls_back_to_concurrently_fetched_secondary() {
        let primary = StubBackend {
            tag: "primary",
            outcome: Err(Error::Research(ResearchError::Empty { source: "primary".to_string() })),
        };
        let secondary = StubBackend {
            tag: "secondary",
            outcome: Ok(vec![result("secondary came through")]),
        };
        let engine = ConsensusEngine::new(
            vec![Arc::new(primary), Arc::new(secondary)],
            Arc::new(ResultCache::new(10)),
        );

        let resolved = engine.resolve("some query").await.unwrap();
        assert_eq!(resolved.source, "secondary");
        assert_eq!(resolved.confidence, Confidence::Low);
        assert_eq!(resolved.primary.len(), 1);
        assert_eq!(resolved.primary[0].snippet, "secondary came through");
    }

    #[tokio::test]
    async fn primary_and_secondary_failure_falls_back_sequentially() {
        let primary = StubBackend {
            tag: "primary",
            outcome: Err(Error::Research(ResearchError::Empty { source: "primary".to_string() })),
        };
        let secondary = StubBackend {
            tag: "secondary",
            outcome: Err(Error::Research(ResearchError::Empty { source: "secondary".to_string() })),
        };
        let tertiary = StubBackend {
            tag: "tertiary",
            outcome: Ok(vec![result("tertiary result")]),
        };
        let engine = ConsensusEngine::new(
            vec![Arc::new(primary), Arc::new(secondary), Arc::new(tertiary)],
            Arc::new(ResultCache::new(10)),
        );

        let resolved = engine.resolve("some query").await.unwrap();
        assert_eq!(resolved.source, "tertiary");
        assert_eq!(resolved.confidence, Confidence::Low);
    }

    #[test]
    fn numeric_agreement_finds_shared_price_token() {
        let primary = vec![result("The plan costs $19.99/mo for unlimited access.")];
        let secondary = vec![result("Pricing is set at $19.99/mo according to the vendor.")];
        let text = numeric_token_agreement(&primary, &secondary).unwrap();
        assert!(text.contains("$19.99"));
    }

    #[test]
    fn key_fact_sentences_require_a_recognized_verb() {
        let sentences = key_fact_sentences("The museum opens at nine. Random filler text here with enough length to pass the minimum bound check for sentence extraction");
        assert!(sentences.iter().any(|s| s.contains("opens")));
    }

    #[test]
    fn top_snippet_overlap_requires_half_jaccard() {
        let primary = vec![result("fresh basil pesto recipe with pine nuts and parmesan")];
        let secondary = vec![result("classic basil pesto recipe using pine nuts and parmesan cheese")];
        assert!(top_snippet_overlap(&primary, &secondary).is_some());
    }

    #[test]
    fn no_agreement_yields_none() {
        let primary = vec![result("completely unrelated content about gardening")];
        let secondary = vec![result("a totally different topic regarding astronomy")];
        assert!(numeric_token_agreement(&primary, &secondary).is_none());
        assert!(!key_fact_sentence_agreement(&primary, &secondary));
        assert!(top_snippet_overlap(&primary, &secondary).is_none());
    }
}
