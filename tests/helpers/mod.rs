#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use memorylink::crypto::Cipher;
use memorylink::db::{self, IndexIdentity};
use memorylink::embedding::hash::HashEmbeddingProvider;
use memorylink::embedding::{CachedEmbedder, LazyProvider};
use memorylink::memory::{MemoryOrchestrator, OrchestratorOptions, ResultCache};
use memorylink::store::SqliteVectorStore;
use rusqlite::Connection;
use tempfile::TempDir;

pub const DIMS: usize = 64;
pub const MODEL: &str = "hash-trigram";

/// A pipeline over a temp-file database. Keep `dir` alive for the test's duration.
pub struct TestPipeline {
    pub dir: TempDir,
    pub db_path: PathBuf,
    pub orchestrator: MemoryOrchestrator,
}

pub fn embedder() -> CachedEmbedder {
    CachedEmbedder::new(
        LazyProvider::ready(Arc::new(HashEmbeddingProvider::new(DIMS))),
        DIMS,
        128,
        Duration::from_secs(60),
        Duration::from_secs(5),
    )
}

pub fn orchestrator_at(db_path: &std::path::Path, key: [u8; 32]) -> MemoryOrchestrator {
    let store = SqliteVectorStore::open(db_path, &IndexIdentity::new(MODEL, DIMS), 4).unwrap();
    MemoryOrchestrator::new(
        Cipher::from_key(key),
        embedder(),
        Arc::new(store),
        ResultCache::new(32, Duration::from_secs(60)),
        OrchestratorOptions {
            storage_timeout: Duration::from_secs(5),
            embedding_model: MODEL.into(),
        },
    )
}

pub fn pipeline() -> TestPipeline {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("memory.db");
    let orchestrator = orchestrator_at(&db_path, [7u8; 32]);
    TestPipeline {
        dir,
        db_path,
        orchestrator,
    }
}

/// A second connection to the same file, for inspecting or damaging rows directly.
pub fn raw_connection(db_path: &std::path::Path) -> Connection {
    db::load_sqlite_vec();
    Connection::open(db_path).unwrap()
}

/// Flip one ciphertext byte of the given memory.
pub fn corrupt_ciphertext(conn: &Connection, id: &str) {
    let mut ciphertext: Vec<u8> = conn
        .query_row("SELECT ciphertext FROM memories WHERE id = ?1", [id], |row| row.get(0))
        .unwrap();
    ciphertext[0] ^= 0xff;
    conn.execute(
        "UPDATE memories SET ciphertext = ?1 WHERE id = ?2",
        rusqlite::params![ciphertext, id],
    )
    .unwrap();
}
