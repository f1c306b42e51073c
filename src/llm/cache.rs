// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Time-bounded response cache
//!
//! Entries are keyed by (model id, content of the final user turn). Expiry
//! is lazy: reads re-check the age of an entry, and `cleanup` purges
//! whatever has expired. The table is also capped in size; inserting past
//! the cap evicts the oldest entry.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::llm::message::CompletionResult;

/// Cache key: model id plus the final user turn
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub model_id: String,
    pub last_turn: String,
}

impl CacheKey {
    pub fn new(model_id: impl Into<String>, last_turn: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            last_turn: last_turn.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CompletionResult,
    created_at: Instant,
}

/// In-memory memo of completion results
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Return the cached value only if `now - created_at < ttl`.
    pub fn get(&self, key: &CacheKey, now: Instant) -> Option<&CompletionResult> {
        self.entries
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.created_at) < self.ttl)
            .map(|entry| &entry.value)
    }

    /// Store a value. A later write for the same key replaces the earlier one.
    pub fn insert(&mut self, key: CacheKey, value: CompletionResult, now: Instant) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.cleanup(now);
            if self.entries.len() >= self.max_entries {
                self.evict_oldest();
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
            },
        );
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn cleanup(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.created_at) < ttl);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::CompletionMetadata;
    use crate::llm::model_config::ModelFamily;

    fn result(text: &str) -> CompletionResult {
        CompletionResult {
            text: text.to_string(),
            model: "m".to_string(),
            usage: None,
            metadata: CompletionMetadata {
                family: ModelFamily::Default,
                response_length: text.len(),
                tokens_used: 0,
                attempts: 1,
                cached: false,
                estimated_cost: None,
            },
        }
    }

    #[test]
    fn test_get_within_ttl() {
        let mut cache = ResponseCache::new(Duration::from_secs(10), 8);
        let now = Instant::now();
        let key = CacheKey::new("m", "hello");

        cache.insert(key.clone(), result("hi"), now);
        let hit = cache.get(&key, now + Duration::from_secs(9));
        assert_eq!(hit.map(|r| r.text.as_str()), Some("hi"));
    }

    #[test]
    fn test_get_at_ttl_boundary_is_miss() {
        let mut cache = ResponseCache::new(Duration::from_secs(10), 8);
        let now = Instant::now();
        let key = CacheKey::new("m", "hello");

        cache.insert(key.clone(), result("hi"), now);
        assert!(cache.get(&key, now + Duration::from_secs(10)).is_none());
        // Lazy expiry: still stored until cleanup
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_includes_model() {
        let mut cache = ResponseCache::new(Duration::from_secs(10), 8);
        let now = Instant::now();

        cache.insert(CacheKey::new("a", "q"), result("from a"), now);
        assert!(cache.get(&CacheKey::new("b", "q"), now).is_none());
    }

    #[test]
    fn test_last_writer_wins() {
        let mut cache = ResponseCache::new(Duration::from_secs(10), 8);
        let now = Instant::now();
        let key = CacheKey::new("m", "q");

        cache.insert(key.clone(), result("first"), now);
        cache.insert(key.clone(), result("second"), now);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key, now).unwrap().text, "second");
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let mut cache = ResponseCache::new(Duration::from_secs(10), 8);
        let start = Instant::now();

        cache.insert(CacheKey::new("m", "old"), result("old"), start);
        cache.insert(
            CacheKey::new("m", "new"),
            result("new"),
            start + Duration::from_secs(8),
        );

        let removed = cache.cleanup(start + Duration::from_secs(12));
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut cache = ResponseCache::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        cache.insert(CacheKey::new("m", "1"), result("1"), start);
        cache.insert(CacheKey::new("m", "2"), result("2"), start + Duration::from_secs(1));
        cache.insert(CacheKey::new("m", "3"), result("3"), start + Duration::from_secs(2));

        let now = start + Duration::from_secs(2);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&CacheKey::new("m", "1"), now).is_none());
        assert!(cache.get(&CacheKey::new("m", "3"), now).is_some());
    }

    #[test]
    fn test_clear() {
        let mut cache = ResponseCache::new(Duration::from_secs(60), 2);
        cache.insert(CacheKey::new("m", "1"), result("1"), Instant::now());
        cache.clear();
        assert!(cache.is_empty());
    }
}
