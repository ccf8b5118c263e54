//! The memory pipeline.
//!
//! Write: validate → embed → encrypt → one atomic store insert → receipt.
//! Any failure before the insert leaves nothing behind, and the insert itself
//! is a single transaction.
//!
//! Search: result cache → embed query → vector search → decrypt each hit →
//! populate cache. A hit that fails decryption or its content digest check
//! is dropped and logged; the rest are still returned.
//!
//! Nothing is retried here. Store calls run on the blocking pool under the
//! storage timeout, provider calls under the embedding timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::config::MemoryLinkConfig;
use crate::crypto::{content_hash, Cipher, EncryptedBlob};
use crate::db::IndexIdentity;
use crate::embedding::CachedEmbedder;
use crate::error::{MemoryError, MemoryResult};
use crate::memory::result_cache::ResultCache;
use crate::memory::types::{
    MemoryRecord, SearchRequest, SearchResponse, SearchResult, ServiceStats, WriteReceipt,
    WriteRequest,
};
use crate::memory::validate;
use crate::store::{
    CommitGate, SqliteVectorStore, StoreError, StoredHit, StoredMemory, VectorStore,
};

/// Tunables that are not owned by any one collaborator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub storage_timeout: Duration,
    /// Reported by [`MemoryOrchestrator::stats`].
    pub embedding_model: String,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_secs(30),
            embedding_model: String::from("unknown"),
        }
    }
}

pub struct MemoryOrchestrator {
    cipher: Cipher,
    embedder: CachedEmbedder,
    store: Arc<dyn VectorStore>,
    results: ResultCache,
    options: OrchestratorOptions,
}

impl MemoryOrchestrator {
    pub fn new(
        cipher: Cipher,
        embedder: CachedEmbedder,
        store: Arc<dyn VectorStore>,
        results: ResultCache,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            cipher,
            embedder,
            store,
            results,
            options,
        }
    }

    /// Wire the full pipeline from configuration.
    ///
    /// Fails immediately when no encryption secret is configured or the index
    /// on disk was built for a different embedding space. The embedding
    /// provider itself is not loaded until the first request needs it.
    pub fn open(config: &MemoryLinkConfig) -> anyhow::Result<Self> {
        let cipher = Cipher::from_secret(config.security.encryption_key.as_deref()).context(
            "encryption key unavailable; set security.encryption_key or MEMORYLINK_ENCRYPTION_KEY \
             (generate one with `memorylink keygen`)",
        )?;

        let identity = IndexIdentity::new(
            config.embedding.index_model(),
            config.embedding.dimensions,
        );
        let store = SqliteVectorStore::open(
            config.resolved_db_path(),
            &identity,
            config.retrieval.overfetch_factor,
        )?;

        let embedder = CachedEmbedder::from_config(&config.embedding, &config.cache);
        let results = ResultCache::new(
            config.cache.result_capacity,
            Duration::from_secs(config.cache.result_ttl_secs),
        );

        Ok(Self::new(
            cipher,
            embedder,
            Arc::new(store),
            results,
            OrchestratorOptions {
                storage_timeout: config.storage.timeout(),
                embedding_model: identity.model,
            },
        ))
    }

    pub async fn write(&self, request: WriteRequest) -> MemoryResult<WriteReceipt> {
        let started = Instant::now();
        let content_chars = request.content.chars().count();
        let result = self.write_inner(request).await;
        match &result {
            Ok(receipt) => tracing::info!(
                op = "write",
                duration_ms = elapsed_ms(started),
                outcome = "ok",
                memory_id = %receipt.id,
                content_chars,
            ),
            Err(e) => tracing::warn!(
                op = "write",
                duration_ms = elapsed_ms(started),
                outcome = "error",
                error_kind = e.kind().as_str(),
                content_chars,
            ),
        }
        result
    }

    async fn write_inner(&self, request: WriteRequest) -> MemoryResult<WriteReceipt> {
        validate::write(&request)?;

        let embedding = self.embedder.get_or_compute(&request.content).await?;
        let blob = self.cipher.encrypt(&request.content)?;

        let id = uuid::Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let record = StoredMemory {
            id: id.clone(),
            embedding: embedding.as_ref().clone(),
            blob,
            content_hash: content_hash(&request.content),
            metadata: request.metadata,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        self.insert_gated(record).await?;

        Ok(WriteReceipt { id, created_at: now })
    }

    /// Insert under the storage timeout without ever committing late.
    ///
    /// On timeout the write is abandoned through its [`CommitGate`], which
    /// makes the insert roll back. If the insert already claimed the commit,
    /// the commit is short, so its outcome is awaited and reported instead.
    async fn insert_gated(&self, record: StoredMemory) -> MemoryResult<()> {
        let store = Arc::clone(&self.store);
        let timeout = self.options.storage_timeout;
        let gate = CommitGate::new();
        let writer_gate = gate.clone();
        let mut task =
            tokio::task::spawn_blocking(move || store.insert(&record, &writer_gate));

        let joined = match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) if gate.abandon() => return Err(StoreError::Timeout(timeout).into()),
            Err(_) => {
                tracing::debug!("insert claimed its commit before the timeout; awaiting it");
                task.await
            }
        };
        match joined {
            Err(join) => Err(MemoryError::Storage(format!("storage task failed: {join}"))),
            Ok(result) => result.map_err(MemoryError::from),
        }
    }

    pub async fn search(&self, request: SearchRequest) -> MemoryResult<SearchResponse> {
        let started = Instant::now();
        let result = self.search_inner(&request, started).await;
        match &result {
            Ok(response) => tracing::info!(
                op = "search",
                duration_ms = elapsed_ms(started),
                outcome = "ok",
                results = response.results.len(),
                cache_hit = response.cached,
            ),
            Err(e) => tracing::warn!(
                op = "search",
                duration_ms = elapsed_ms(started),
                outcome = "error",
                error_kind = e.kind().as_str(),
            ),
        }
        result
    }

    async fn search_inner(
        &self,
        request: &SearchRequest,
        started: Instant,
    ) -> MemoryResult<SearchResponse> {
        validate::search(request)?;
        let (query, limit, threshold) = (&request.query, request.limit, request.threshold);

        if let Some(cached) = self.results.get(query, limit, threshold) {
            return Ok(self.respond(request, cached.as_ref().clone(), started, true));
        }

        let embedding = self.embedder.get_or_compute(query).await?;
        let hits = self
            .run_store(move |store| store.search(&embedding, limit, threshold))
            .await?;

        let results: Vec<SearchResult> = hits.into_iter().filter_map(|hit| self.open_hit(hit)).collect();
        self.results
            .put(query, limit, threshold, Arc::new(results.clone()));

        Ok(self.respond(request, results, started, false))
    }

    /// Decrypt one hit, or log and drop it.
    fn open_hit(&self, hit: StoredHit) -> Option<SearchResult> {
        match self.unseal(&hit.blob, &hit.content_hash) {
            Ok(content) => Some(SearchResult {
                memory_id: hit.id,
                similarity: hit.similarity,
                content,
                metadata: hit.metadata,
                created_at: hit.created_at,
            }),
            Err(e) => {
                tracing::warn!(
                    memory_id = %hit.id,
                    error_kind = e.kind().as_str(),
                    "dropping unreadable search result"
                );
                None
            }
        }
    }

    /// Decrypt and check the plaintext against its recorded digest.
    fn unseal(&self, blob: &EncryptedBlob, expected_hash: &str) -> MemoryResult<String> {
        let content = self.cipher.decrypt(blob)?;
        if content_hash(&content) != expected_hash {
            return Err(MemoryError::Authentication(
                "decrypted content does not match its recorded digest".into(),
            ));
        }
        Ok(content)
    }

    fn respond(
        &self,
        request: &SearchRequest,
        results: Vec<SearchResult>,
        started: Instant,
        cached: bool,
    ) -> SearchResponse {
        SearchResponse {
            query: request.query.clone(),
            total_found: results.len(),
            results,
            execution_time_ms: elapsed_ms(started),
            cached,
        }
    }

    /// Fetch and decrypt one memory. Unlike search, a record that cannot be
    /// decrypted is an error here.
    pub async fn get(&self, id: &str) -> MemoryResult<Option<MemoryRecord>> {
        let started = Instant::now();
        let result = self.get_inner(id).await;
        match &result {
            Ok(found) => tracing::info!(
                op = "get",
                duration_ms = elapsed_ms(started),
                outcome = "ok",
                found = found.is_some(),
            ),
            Err(e) => tracing::warn!(
                op = "get",
                duration_ms = elapsed_ms(started),
                outcome = "error",
                error_kind = e.kind().as_str(),
            ),
        }
        result
    }

    async fn get_inner(&self, id: &str) -> MemoryResult<Option<MemoryRecord>> {
        validate::memory_id(id)?;
        let owned = id.to_owned();
        let Some(stored) = self.run_store(move |store| store.get(&owned)).await? else {
            return Ok(None);
        };
        let content = self.unseal(&stored.blob, &stored.content_hash)?;
        Ok(Some(MemoryRecord {
            id: stored.id,
            content,
            metadata: stored.metadata,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }))
    }

    pub async fn stats(&self) -> MemoryResult<ServiceStats> {
        let started = Instant::now();
        let result = self.run_store(|store| store.count()).await.map(|total| ServiceStats {
            total_memories: total,
            embedding_model: self.options.embedding_model.clone(),
            embedding_dimensions: self.embedder.dimensions(),
            encryption_enabled: true,
            embedding_cache: self.embedder.cache_stats(),
            result_cache: self.results.stats(),
        });
        match &result {
            Ok(_) => tracing::info!(op = "stats", duration_ms = elapsed_ms(started), outcome = "ok"),
            Err(e) => tracing::warn!(
                op = "stats",
                duration_ms = elapsed_ms(started),
                outcome = "error",
                error_kind = e.kind().as_str(),
            ),
        }
        result
    }

    /// Run a read-only store call on the blocking pool, bounded by the storage
    /// timeout. On timeout the blocking call is not interrupted; writes go
    /// through [`Self::insert_gated`] instead.
    async fn run_store<T, F>(&self, call: F) -> MemoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn VectorStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let timeout = self.options.storage_timeout;
        let task = tokio::task::spawn_blocking(move || call(store.as_ref()));
        match tokio::time::timeout(timeout, task).await {
            Err(_) => Err(StoreError::Timeout(timeout).into()),
            Ok(Err(join)) => Err(MemoryError::Storage(format!("storage task failed: {join}"))),
            Ok(Ok(result)) => result.map_err(MemoryError::from),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
