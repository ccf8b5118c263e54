use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memorylink::embedding::hash::HashEmbeddingProvider;
use memorylink::embedding::{CachedEmbedder, EmbeddingProvider, LazyProvider};

const DIMS: usize = 32;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_embeds_initialize_provider_once() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let provider = LazyProvider::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        Ok(Box::new(HashEmbeddingProvider::new(DIMS)) as Box<dyn EmbeddingProvider>)
    });
    let embedder = Arc::new(CachedEmbedder::new(
        provider,
        DIMS,
        16,
        Duration::from_secs(60),
        Duration::from_secs(5),
    ));

    let first = tokio::spawn({
        let embedder = Arc::clone(&embedder);
        async move { embedder.get_or_compute("garden tomatoes need staking").await }
    });
    let second = tokio::spawn({
        let embedder = Arc::clone(&embedder);
        async move { embedder.get_or_compute("invoice numbers are sequential").await }
    });

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(a.len(), DIMS);
    assert_eq!(b.len(), DIMS);
    assert_ne!(a, b);
}

#[tokio::test]
async fn failed_initialization_is_retried_on_next_request() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let provider = LazyProvider::new(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("model file missing");
        }
        Ok(Box::new(HashEmbeddingProvider::new(DIMS)) as Box<dyn EmbeddingProvider>)
    });
    let embedder = CachedEmbedder::new(
        provider,
        DIMS,
        16,
        Duration::from_secs(60),
        Duration::from_secs(5),
    );

    assert!(embedder.get_or_compute("first try").await.is_err());
    assert!(embedder.get_or_compute("second try").await.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
