//! Follow-up Generator (Component I).
//!
//! Domain-aware query builder and sanitizer for missing success criteria.
//! Invoked at most once per research execution (§4.J's one-shot follow-up
//! round).

use crate::research::model::Domain;
use std::collections::HashSet;

const SOFTWARE_DOMAIN_WORDS: &[&str] = &["security", "permissions", "threat model", "vulnerability", "sandbox"];
const PHYSICAL_PROCESS_DOMAIN_WORDS: &[&str] =
    &["safety", "haccp", "contamination", "sanitation", "worker safety", "throughput"];
const GENERAL_DOMAIN_WORDS: &[&str] = &["overview", "guidance", "key facts"];

const BANNED_MODIFIERS: &[&str] = &["cve", "sandbox", "oauth", "token", "webhook", "prompt injection"];

/// Tokenizes `criterion` and unions with the domain's fixed keyword list.
#[must_use]
pub fn derive_criterion_keywords(domain: Domain, criterion: &str) -> Vec<String> {
    let mut keywords: Vec<String> = criterion
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 3)
        .map(str::to_lowercase)
        .collect();

    let domain_words: &[&str] = match domain {
        Domain::Software => SOFTWARE_DOMAIN_WORDS,
        Domain::PhysicalProcess => PHYSICAL_PROCESS_DOMAIN_WORDS,
        Domain::General => GENERAL_DOMAIN_WORDS,
    };

    let mut seen: HashSet<String> = keywords.iter().cloned().collect();
    for word in domain_words {
        if seen.insert((*word).to_string()) {
            keywords.push((*word).to_string());
        }
    }
    keywords
}

fn domain_suffix(domain: Domain) -> &'static str {
    match domain {
        Domain::Software => "security permissions threat model",
        Domain::PhysicalProcess => "safety haccp sanitation",
        Domain::General => "overview key facts",
    }
}

/// Sanitizes a raw query string: lowercase, collapse whitespace, drop
/// non-word punctuation except `-:'.`, then remove banned modifier words
/// unless `domain` is `SOFTWARE`. Idempotent.
#[must_use]
pub fn sanitize_query(raw: &str) -> String {
    sanitize_query_for_domain(raw, Domain::General)
}

/// Domain-aware variant of [`sanitize_query`] that keeps banned modifier
/// words (`cve`, `sandbox`, `oauth`, ...) when `domain` is `SOFTWARE`.
#[must_use]
pub fn sanitize_query_for_domain(raw: &str, domain: Domain) -> String {
    let lower = raw.to_lowercase();
    let collapsed: String = lower.split_whitespace().collect::<Vec<_>>().join(" ");

    let cleaned: String = collapsed
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | ':' | '\'' | '.'))
        .collect();

    if domain == Domain::Software {
        return cleaned;
    }

    let mut phraseless = cleaned;
    for phrase in BANNED_MODIFIERS.iter().filter(|modifier| modifier.contains(' ')) {
        phraseless = phraseless.replace(phrase, " ");
    }

    phraseless
        .split_whitespace()
        .filter(|word| !BANNED_MODIFIERS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds up to `limit` deduplicated follow-up queries for `missing_criteria`.
#[must_use]
pub fn build_follow_up_queries(
    domain: Domain,
    missing_criteria: &[String],
    existing_hosts: &[String],
    limit: usize,
) -> Vec<String> {
    let mut queries = Vec::new();
    let suffix = domain_suffix(domain);

    for criterion in missing_criteria {
        let keywords = derive_criterion_keywords(domain, criterion);
        let mut query = format!("{} {}", keywords.join(" "), suffix);

        if existing_hosts.len() == 1 {
            for host in existing_hosts {
                query.push_str(&format!(" -site:{host}"));
            }
        }

        queries.push(sanitize_query_for_domain(&query, domain));
    }

    let mut seen = HashSet::new();
    queries.retain(|q| seen.insert(q.clone()));
    queries.truncate(limit);
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_is_idempotent() {
        let raw = "  Best   Practices FOR X! ";
        let once = sanitize_query(raw);
        let twice = sanitize_query(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_strips_banned_modifiers_outside_software() {
        let sanitized = sanitize_query_for_domain("oauth token setup guide", Domain::General);
        assert!(!sanitized.contains("oauth"));
        assert!(!sanitized.contains("token"));
    }

    #[test]
    fn sanitize_strips_multi_word_banned_phrase_outside_software() {
        let sanitized = sanitize_query_for_domain("avoiding prompt injection attacks", Domain::General);
        assert!(!sanitized.contains("prompt injection"));
        assert!(!sanitized.contains("prompt"));
        assert!(!sanitized.contains("injection"));
    }

    #[test]
    fn sanitize_keeps_banned_modifiers_for_software_domain() {
        let sanitized = sanitize_query_for_domain("cve sandbox escape", Domain::Software);
        assert!(sanitized.contains("cve"));
        assert!(sanitized.contains("sandbox"));
    }

    #[test]
    fn single_known_host_triggers_site_exclusion() {
        let queries = build_follow_up_queries(
            Domain::General,
            &["best practices".to_string()],
            &["example.com".to_string()],
            2,
        );
        assert!(queries.iter().any(|q| q.contains("-site:example.com")));
    }

    #[test]
    fn physical_process_follow_up_matches_haccp() {
        let queries = build_follow_up_queries(
            Domain::PhysicalProcess,
            &["food safety overview".to_string()],
            &[],
            2,
        );
        assert!(queries.iter().any(|q| q.contains("haccp")));
        assert!(!queries.iter().any(|q| q.contains("cve") || q.contains("oauth")));
    }

    #[test]
    fn software_follow_up_matches_security_and_threat_model() {
        let queries = build_follow_up_queries(
            Domain::Software,
            &["security review process".to_string()],
            &["openclaw.dev".to_string()],
            2,
        );
        assert!(queries.iter().any(|q| q.contains("security")));
        assert!(queries.iter().any(|q| q.contains("threat model")));
    }

    #[test]
    fn results_are_deduplicated_and_capped_at_limit() {
        let queries = build_follow_up_queries(
            Domain::General,
            &["same criterion".to_string(), "same criterion".to_string(), "third".to_string()],
            &[],
            2,
        );
        assert_eq!(queries.len(), 2);
    }
}
