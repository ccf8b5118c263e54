//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait with two implementations: a local
//! ONNX model (all-MiniLM-L6-v2) and a deterministic trigram-hashing provider
//! that needs no model files. Callers never hold a provider directly; they go
//! through [`CachedEmbedder`], which loads the provider once via
//! [`LazyProvider`], caches vectors by content hash, and fixes the
//! normalization for every vector that reaches the index.

pub mod cache;
pub mod hash;
pub mod lazy;
pub mod local;

pub use cache::CachedEmbedder;
pub use lazy::LazyProvider;

use anyhow::Result;

use crate::config::EmbeddingConfig;

/// Default embedding width (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Normalization applied to every stored and query vector. Recorded in the
/// index so a later change is detected instead of silently skewing rankings.
pub const NORMALIZATION: &str = "l2";

/// Trait for embedding text into vectors.
///
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize;
}

/// Create an embedding provider from config. This is the expensive step
/// (model load) that [`LazyProvider`] runs exactly once.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        "hash" => Ok(Box::new(hash::HashEmbeddingProvider::new(config.dimensions))),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local, hash"),
    }
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 if either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
