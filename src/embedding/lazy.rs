//! Load-once guard around the embedding provider.
//!
//! Model loading is expensive, so it is deferred to the first embedding
//! request and performed exactly once per [`LazyProvider`]. Concurrent first
//! callers all await the same initialization. A failed load is not cached;
//! the next caller tries again.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::OnceCell;

use super::EmbeddingProvider;

type ProviderFactory = dyn Fn() -> Result<Box<dyn EmbeddingProvider>> + Send + Sync;

pub struct LazyProvider {
    factory: Arc<ProviderFactory>,
    cell: OnceCell<Arc<dyn EmbeddingProvider>>,
}

impl LazyProvider {
    /// `factory` runs on the blocking pool the first time [`get`](Self::get) is awaited.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn EmbeddingProvider>> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            cell: OnceCell::new(),
        }
    }

    /// Wrap an already-constructed provider.
    pub fn ready(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            factory: Arc::new(|| -> Result<Box<dyn EmbeddingProvider>> {
                anyhow::bail!("provider was supplied pre-initialized")
            }),
            cell: OnceCell::new_with(Some(provider)),
        }
    }

    /// The provider, initializing it on first use.
    pub async fn get(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider = self
            .cell
            .get_or_try_init(|| async {
                let factory = Arc::clone(&self.factory);
                tracing::info!("initializing embedding provider");
                let provider = tokio::task::spawn_blocking(move || factory()).await??;
                tracing::info!(dimensions = provider.dimensions(), "embedding provider ready");
                Ok::<_, anyhow::Error>(Arc::from(provider))
            })
            .await?;
        Ok(Arc::clone(provider))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
