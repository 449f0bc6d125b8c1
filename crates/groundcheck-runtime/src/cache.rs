//! Caching layer for grounding outcomes.
//!
//! Preview audits are issued on every form edit; a field whose value
//! and document set have not changed gets its previous outcome back
//! without an LLM call.

use moka::future::Cache;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use groundcheck_core::GroundingOutcome;

use crate::config::CacheConfig;

/// Cache key: one field's claimed value against one document set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroundingCacheKey {
    field_id: String,
    value_hash: u64,
    doc_set_hash: u64,
}

impl GroundingCacheKey {
    pub fn new(field_id: &str, claimed_value: &str, ready_doc_ids: &[String]) -> Self {
        Self {
            field_id: field_id.to_string(),
            value_hash: hash_str(claimed_value),
            doc_set_hash: hash_doc_set(ready_doc_ids),
        }
    }
}

/// Grounding outcome cache backed by moka.
pub struct GroundingCache {
    cache: Cache<GroundingCacheKey, GroundingOutcome>,
}

impl GroundingCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { cache }
    }

    pub async fn get(&self, key: &GroundingCacheKey) -> Option<GroundingOutcome> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: GroundingCacheKey, outcome: GroundingOutcome) {
        self.cache.insert(key, outcome).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for GroundingCache {
    fn default() -> Self {
        Self::new(&CacheConfig {
            max_entries: 10_000,
            ttl: Duration::from_secs(600),
        })
    }
}

fn hash_str(value: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Order-insensitive hash of the ready document set.
fn hash_doc_set(doc_ids: &[String]) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut sorted: Vec<&String> = doc_ids.iter().collect();
    sorted.sort();
    let mut hasher = DefaultHasher::new();
    for id in sorted {
        id.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundcheck_core::GroundingVerdict;

    fn outcome(field_id: &str) -> GroundingOutcome {
        GroundingOutcome::no_evidence(field_id)
    }

    #[tokio::test]
    async fn test_cache_hit_and_miss() {
        let cache = GroundingCache::default();
        let docs = vec!["lease-1".to_string()];
        let key = GroundingCacheKey::new("monthly_rent", "$1,650", &docs);

        assert!(cache.get(&key).await.is_none());

        cache.insert(key.clone(), outcome("monthly_rent")).await;
        let cached = cache.get(&key).await.unwrap();
        assert_eq!(cached.verdict, GroundingVerdict::Unsupported);
    }

    #[test]
    fn test_key_ignores_doc_order() {
        let a = GroundingCacheKey::new(
            "monthly_rent",
            "$1,650",
            &["a".to_string(), "b".to_string()],
        );
        let b = GroundingCacheKey::new(
            "monthly_rent",
            "$1,650",
            &["b".to_string(), "a".to_string()],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_changes_with_value_and_doc_set() {
        let docs = vec!["lease-1".to_string()];
        let base = GroundingCacheKey::new("monthly_rent", "$1,650", &docs);

        let other_value = GroundingCacheKey::new("monthly_rent", "$1,800", &docs);
        assert_ne!(base, other_value);

        let other_docs =
            GroundingCacheKey::new("monthly_rent", "$1,650", &["lease-2".to_string()]);
        assert_ne!(base, other_docs);
    }
}
