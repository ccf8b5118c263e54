//! SQLite + sqlite-vec implementation of [`VectorStore`].
//!
//! Inserts write `memories`, `memory_metadata` and `memories_vec` inside one
//! transaction, committed only if the caller's [`CommitGate`] still allows it.
//! Search runs a KNN query over `memories_vec`, over-fetching
//! `limit * overfetch_factor` candidates (at most 4096), converts the L2 distance between
//! unit vectors into cosine similarity, hydrates the candidates and applies
//! [`rank_hits`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    l2_distance_to_similarity, metadata, rank_hits, CommitGate, StoreError, StoredHit, StoredMemory,
    VectorStore,
};
use crate::crypto::EncryptedBlob;
use crate::db::{self, IndexIdentity};
use crate::memory::types::Metadata;

/// Largest `k` sqlite-vec accepts in a KNN query.
const MAX_KNN_K: usize = 4096;

pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    overfetch_factor: usize,
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Columns of one `memories` row, before the blob is reassembled.
struct Row {
    id: String,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
    content_hash: String,
    created_at: String,
    updated_at: String,
}

impl Row {
    fn blob(&self) -> Result<EncryptedBlob, crate::crypto::CryptoError> {
        EncryptedBlob::from_parts(&self.nonce, self.ciphertext.clone(), &self.tag)
    }
}

impl SqliteVectorStore {
    /// Open the index file, creating it if needed, and verify it was built in
    /// the same embedding space as `identity`.
    pub fn open(
        path: impl AsRef<Path>,
        identity: &IndexIdentity,
        overfetch_factor: usize,
    ) -> anyhow::Result<Self> {
        let conn = db::open_database(path, identity.dimensions)?;
        db::ensure_index_identity(&conn, identity).context("index identity check failed")?;
        Ok(Self::from_connection(conn, overfetch_factor))
    }

    pub fn in_memory(identity: &IndexIdentity, overfetch_factor: usize) -> anyhow::Result<Self> {
        let conn = db::open_memory_database(identity.dimensions)?;
        db::ensure_index_identity(&conn, identity)?;
        Ok(Self::from_connection(conn, overfetch_factor))
    }

    /// Wrap a connection whose schema is already initialized.
    pub fn from_connection(conn: Connection, overfetch_factor: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            overfetch_factor: overfetch_factor.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("connection lock poisoned: {e}")))
    }

    fn fetch_row(conn: &Connection, id: &str) -> Result<Option<Row>, StoreError> {
        let row = conn
            .prepare_cached(
                "SELECT id, nonce, ciphertext, tag, content_hash, created_at, updated_at \
                 FROM memories WHERE id = ?1",
            )?
            .query_row(params![id], |row| {
                Ok(Row {
                    id: row.get(0)?,
                    nonce: row.get(1)?,
                    ciphertext: row.get(2)?,
                    tag: row.get(3)?,
                    content_hash: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    fn fetch_metadata(conn: &Connection, id: &str) -> Result<Metadata, StoreError> {
        let entries = conn
            .prepare_cached(
                "SELECT key, value FROM memory_metadata WHERE memory_id = ?1 ORDER BY position",
            )?
            .query_map(params![id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, String)>, _>>()?;
        Ok(metadata::decode(entries)?)
    }
}

impl VectorStore for SqliteVectorStore {
    fn insert(&self, memory: &StoredMemory, gate: &CommitGate) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO memories (id, nonce, ciphertext, tag, content_hash, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                memory.id,
                memory.blob.nonce(),
                memory.blob.ciphertext(),
                memory.blob.tag(),
                memory.content_hash,
                memory.created_at,
                memory.updated_at,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO memory_metadata (memory_id, position, key, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, (key, value)) in metadata::encode(&memory.metadata).iter().enumerate() {
                stmt.execute(params![memory.id, position as i64, key, value])?;
            }
        }

        tx.execute(
            "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
            params![memory.id, embedding_to_bytes(&memory.embedding)],
        )?;

        if !gate.try_commit() {
            // dropping the transaction rolls it back
            return Err(StoreError::Rejected(format!(
                "write of {} abandoned before commit",
                memory.id
            )));
        }
        tx.commit()?;
        Ok(())
    }

    fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<StoredHit>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let k = limit.saturating_mul(self.overfetch_factor).min(MAX_KNN_K);
        let conn = self.lock()?;

        let candidates: Vec<(String, f64)> = conn
            .prepare_cached(
                "SELECT id, distance FROM memories_vec WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
            )?
            .query_map(params![embedding_to_bytes(embedding), k as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut hits = Vec::with_capacity(candidates.len());
        for (id, distance) in candidates {
            let similarity = l2_distance_to_similarity(distance);
            // sorted by distance, so nothing further can pass
            if similarity < threshold {
                break;
            }
            let Some(row) = Self::fetch_row(&conn, &id)? else {
                tracing::warn!(memory_id = %id, "vector has no memory row; skipping");
                continue;
            };
            let blob = match row.blob() {
                Ok(blob) => blob,
                Err(e) => {
                    tracing::warn!(memory_id = %id, error = %e, "malformed stored blob; skipping");
                    continue;
                }
            };
            let metadata = match Self::fetch_metadata(&conn, &id) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(memory_id = %id, error = %e, "undecodable stored metadata; skipping");
                    continue;
                }
            };
            hits.push(StoredHit {
                id: row.id,
                similarity,
                blob,
                content_hash: row.content_hash,
                metadata,
                created_at: row.created_at,
            });
        }

        Ok(rank_hits(hits, limit, threshold))
    }

    fn get(&self, id: &str) -> Result<Option<StoredMemory>, StoreError> {
        let conn = self.lock()?;
        let Some(row) = Self::fetch_row(&conn, id)? else {
            return Ok(None);
        };
        let blob = row
            .blob()
            .map_err(|e| StoreError::Corrupt(format!("memory {id}: {e}")))?;
        let metadata = Self::fetch_metadata(&conn, id)?;
        let embedding: Option<Vec<u8>> = conn
            .prepare_cached("SELECT embedding FROM memories_vec WHERE id = ?1")?
            .query_row(params![id], |row| row.get(0))
            .optional()?;

        Ok(Some(StoredMemory {
            id: row.id,
            embedding: embedding.as_deref().map(bytes_to_embedding).unwrap_or_default(),
            blob,
            content_hash: row.content_hash,
            metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))?;
        Ok(count as u64)
    }
}
