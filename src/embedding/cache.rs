//! Content-addressed embedding cache in front of the provider.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStats, TtlCache};
use crate::config::{CacheConfig, EmbeddingConfig};
use crate::crypto::content_hash;
use crate::error::{MemoryError, MemoryResult};

use super::{l2_normalize, LazyProvider};

/// Deduplicates embedding work by content hash.
///
/// Provider calls run on the blocking pool under a timeout; the cache lock is
/// never held while the provider runs. Every returned vector has passed the
/// shape checks in `check` and is L2-normalized exactly here.
pub struct CachedEmbedder {
    provider: LazyProvider,
    cache: TtlCache<String, Arc<Vec<f32>>>,
    dimensions: usize,
    timeout: Duration,
}

impl CachedEmbedder {
    pub fn new(
        provider: LazyProvider,
        dimensions: usize,
        capacity: usize,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache: TtlCache::new(capacity, ttl),
            dimensions,
            timeout,
        }
    }

    /// Build from configuration; the provider itself loads on first use.
    pub fn from_config(embedding: &EmbeddingConfig, cache: &CacheConfig) -> Self {
        let provider_config = embedding.clone();
        let provider = LazyProvider::new(move || super::create_provider(&provider_config));
        Self::new(
            provider,
            embedding.dimensions,
            cache.embedding_capacity,
            Duration::from_secs(cache.embedding_ttl_secs),
            embedding.timeout(),
        )
    }

    pub async fn get_or_compute(&self, text: &str) -> MemoryResult<Arc<Vec<f32>>> {
        let key = content_hash(text);
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!(hash = %key, "embedding cache hit");
            return Ok(hit);
        }

        let provider = self
            .provider
            .get()
            .await
            .map_err(|e| MemoryError::Embedding(format!("provider initialization failed: {e:#}")))?;

        let owned = text.to_owned();
        let task = tokio::task::spawn_blocking(move || provider.embed(&owned));
        let raw = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                return Err(MemoryError::Embedding(format!(
                    "provider timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
            Ok(Err(join)) => {
                return Err(MemoryError::Embedding(format!("embedding task failed: {join}")))
            }
            Ok(Ok(Err(e))) => return Err(MemoryError::Embedding(format!("{e:#}"))),
            Ok(Ok(Ok(vector))) => vector,
        };

        let vector = Arc::new(self.check(raw)?);
        self.cache.insert(key, Arc::clone(&vector));
        Ok(vector)
    }

    fn check(&self, raw: Vec<f32>) -> MemoryResult<Vec<f32>> {
        if raw.len() != self.dimensions {
            return Err(MemoryError::Embedding(format!(
                "provider returned {} dimensions, index expects {}",
                raw.len(),
                self.dimensions
            )));
        }
        if raw.iter().any(|x| !x.is_finite()) {
            return Err(MemoryError::Embedding(
                "provider returned non-finite values".into(),
            ));
        }
        if raw.iter().all(|x| *x == 0.0) {
            return Err(MemoryError::Embedding("provider returned a zero vector".into()));
        }
        Ok(l2_normalize(&raw))
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hash::HashEmbeddingProvider;
    use crate::embedding::EmbeddingProvider;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and delegates to the hash provider.
    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        inner: HashEmbeddingProvider,
        delay: Duration,
    }

    impl EmbeddingProvider for CountingProvider {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.inner.embed(text)
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
    }

    struct FixedProvider(Vec<f32>);

    impl EmbeddingProvider for FixedProvider {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    fn counting(ttl: Duration, delay: Duration) -> (CachedEmbedder, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CountingProvider {
            calls: Arc::clone(&calls),
            inner: HashEmbeddingProvider::new(32),
            delay,
        };
        let embedder = CachedEmbedder::new(
            LazyProvider::ready(Arc::new(provider)),
            32,
            16,
            ttl,
            Duration::from_millis(200),
        );
        (embedder, calls)
    }

    #[tokio::test]
    async fn second_call_within_ttl_hits_cache() {
        let (embedder, calls) = counting(Duration::from_secs(60), Duration::ZERO);
        let a = embedder.get_or_compute("remember the milk").await.unwrap();
        let b = embedder.get_or_compute("remember the milk").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(embedder.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn expired_entry_is_recomputed() {
        let (embedder, calls) = counting(Duration::from_millis(20), Duration::ZERO);
        embedder.get_or_compute("remember the milk").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        embedder.get_or_compute("remember the milk").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_texts_are_cached_separately() {
        let (embedder, calls) = counting(Duration::from_secs(60), Duration::ZERO);
        let a = embedder.get_or_compute("first note").await.unwrap();
        let b = embedder.get_or_compute("second entry").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_embedding_error() {
        let (embedder, _) = counting(Duration::from_secs(60), Duration::from_millis(500));
        let err = embedder.get_or_compute("too slow").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Embedding);
    }

    #[tokio::test]
    async fn wrong_width_is_rejected() {
        let embedder = CachedEmbedder::new(
            LazyProvider::ready(Arc::new(FixedProvider(vec![1.0; 8]))),
            16,
            4,
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        let err = embedder.get_or_compute("anything").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Embedding);
    }

    #[tokio::test]
    async fn non_finite_output_is_rejected() {
        let embedder = CachedEmbedder::new(
            LazyProvider::ready(Arc::new(FixedProvider(vec![f32::NAN, 1.0]))),
            2,
            4,
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        let err = embedder.get_or_compute("anything").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Embedding);
    }

    #[tokio::test]
    async fn zero_vector_is_rejected() {
        let embedder = CachedEmbedder::new(
            LazyProvider::ready(Arc::new(FixedProvider(vec![0.0; 4]))),
            4,
            4,
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        let err = embedder.get_or_compute("anything").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Embedding);
    }

    #[tokio::test]
    async fn output_is_normalized_once_here() {
        let embedder = CachedEmbedder::new(
            LazyProvider::ready(Arc::new(FixedProvider(vec![3.0, 4.0]))),
            2,
            4,
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        let v = embedder.get_or_compute("anything").await.unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn failed_initialization_is_an_embedding_error() {
        let embedder = CachedEmbedder::new(
            LazyProvider::new(|| anyhow::bail!("no model")),
            4,
            4,
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        let err = embedder.get_or_compute("anything").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Embedding);
    }
}
