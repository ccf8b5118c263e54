//! Short-lived cache of finished search results.
//!
//! Keyed by the exact `(query, limit, threshold)` tuple. There is no
//! invalidation on write, so a cached answer may miss memories written within
//! the last TTL window. Values hold decrypted content.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStats, TtlCache};
use crate::memory::types::SearchResult;

type ResultKey = (String, usize, u64);

pub struct ResultCache {
    inner: TtlCache<ResultKey, Arc<Vec<SearchResult>>>,
}

fn key(query: &str, limit: usize, threshold: f64) -> ResultKey {
    (query.to_owned(), limit, threshold.to_bits())
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: TtlCache::new(capacity, ttl),
        }
    }

    pub fn get(&self, query: &str, limit: usize, threshold: f64) -> Option<Arc<Vec<SearchResult>>> {
        self.inner.get(&key(query, limit, threshold))
    }

    pub fn put(&self, query: &str, limit: usize, threshold: f64, results: Arc<Vec<SearchResult>>) {
        self.inner.insert(key(query, limit, threshold), results);
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Metadata;

    fn results(id: &str) -> Arc<Vec<SearchResult>> {
        Arc::new(vec![SearchResult {
            memory_id: id.into(),
            similarity: 0.9,
            content: "c".into(),
            metadata: Metadata::new(),
            created_at: String::new(),
        }])
    }

    #[test]
    fn key_is_the_exact_tuple() {
        let cache = ResultCache::new(8, Duration::from_secs(60));
        cache.put("docker", 5, 0.2, results("a"));

        assert_eq!(cache.get("docker", 5, 0.2).unwrap()[0].memory_id, "a");
        assert!(cache.get("Docker", 5, 0.2).is_none());
        assert!(cache.get("docker", 6, 0.2).is_none());
        assert!(cache.get("docker", 5, 0.21).is_none());
    }

    #[test]
    fn entries_expire() {
        let cache = ResultCache::new(8, Duration::from_millis(10));
        cache.put("q", 1, 0.0, results("a"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("q", 1, 0.0).is_none());
    }
}
