//! Search Result Cache (Component D).
//!
//! Process-local map from normalized query to `(consensus_result,
//! inserted_at)`. Capacity-bounded with oldest-insertion eviction. The
//! consensus engine is the sole writer per process; a mutex serializes
//! concurrent access regardless.

use crate::research::model::ConsensusResult;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    result: ConsensusResult,
    inserted_at: Instant,
    insertion_order: u64,
}

/// TTL-bounded, capacity-bounded cache of consensus results keyed by
/// normalized query.
pub struct ResultCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    entries: HashMap<String, Entry>,
    next_order: u64,
}

impl ResultCache {
    /// Creates a cache with the given capacity (e.g. 100 distinct queries).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                next_order: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Normalizes a raw query: lower-cased, whitespace-collapsed, trimmed.
    #[must_use]
    pub fn normalize(query: &str) -> String {
        query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }

    /// Looks up a normalized query, returning `None` when absent or the
    /// entry's age exceeds `ttl`.
    #[must_use]
    pub fn get(&self, normalized_query: &str, ttl: Duration) -> Option<ConsensusResult> {
        let inner = self.inner.lock().expect("result cache mutex poisoned");
        let entry = inner.entries.get(normalized_query)?;
        if entry.inserted_at.elapsed() > ttl {
            return None;
        }
        Some(entry.result.clone())
    }

    /// Stores a consensus result under the normalized query, evicting the
    /// oldest entry by insertion order if at capacity.
    pub fn put(&self, normalized_query: String, result: ConsensusResult) {
        let mut inner = self.inner.lock().expect("result cache mutex poisoned");
        if inner.entries.len() >= self.capacity && !inner.entries.contains_key(&normalized_query) {
            if let Some(oldest_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.insertion_order)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest_key);
            }
        }

        let order = inner.next_order;
        inner.next_order += 1;
        inner.entries.insert(
            normalized_query,
            Entry {
                result,
                inserted_at: Instant::now(),
                insertion_order: order,
            },
        );
    }

    /// Number of entries currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("result cache mutex poisoned").entries.len()
    }

    /// True if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::model::Confidence;

    fn sample(text: &str) -> ConsensusResult {
        ConsensusResult {
            primary: vec![],
            secondary: vec![],
            source: "serper+serpapi".to_string(),
            consensus_text: Some(text.to_string()),
            confidence: Confidence::High,
        }
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(ResultCache::normalize("  Olive  Oil   Bottling "), "olive oil bottling");
    }

    #[test]
    fn lookup_misses_after_ttl_expires() {
        let cache = ResultCache::new(10);
        cache.put("q".to_string(), sample("x"));
        assert!(cache.get("q", Duration::from_secs(60)).is_some());
        assert!(cache.get("q", Duration::from_nanos(0)).is_none());
    }

    #[test]
    fn capacity_bound_evicts_oldest_insertion() {
        let cache = ResultCache::new(2);
        cache.put("a".to_string(), sample("a"));
        cache.put("b".to_string(), sample("b"));
        cache.put("c".to_string(), sample("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", Duration::from_secs(60)).is_none());
        assert!(cache.get("c", Duration::from_secs(60)).is_some());
    }
}
