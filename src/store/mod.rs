//! Vector Store Adapter.
//!
//! [`VectorStore`] is the narrow contract the orchestrator needs from an
//! index: atomic insert of one encrypted record with its embedding, and
//! thresholded similarity search. [`sqlite::SqliteVectorStore`] implements it
//! on SQLite with the sqlite-vec extension.

pub mod metadata;
pub mod sqlite;

pub use sqlite::SqliteVectorStore;

use std::cmp::Ordering;
use std::sync::atomic::{self, AtomicU8};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::crypto::EncryptedBlob;
use crate::memory::types::Metadata;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The index cannot be reached or opened.
    #[error("index unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be read back.
    #[error("index data corrupt: {0}")]
    Corrupt(String),

    /// The index refused the operation.
    #[error("index rejected operation: {0}")]
    Rejected(String),

    #[error("index call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::NotADatabase,
            ) => Self::Unavailable(err.to_string()),
            Some(ErrorCode::DatabaseCorrupt) => Self::Corrupt(err.to_string()),
            _ => Self::Rejected(err.to_string()),
        }
    }
}

impl From<metadata::DecodeError> for StoreError {
    fn from(err: metadata::DecodeError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// One durable record as handed to [`VectorStore::insert`].
#[derive(Debug, Clone)]
pub struct StoredMemory {
    pub id: String,
    pub embedding: Vec<f32>,
    pub blob: EncryptedBlob,
    pub content_hash: String,
    pub metadata: Metadata,
    pub created_at: String,
    pub updated_at: String,
}

/// A search candidate, still encrypted.
#[derive(Debug, Clone)]
pub struct StoredHit {
    pub id: String,
    pub similarity: f64,
    pub blob: EncryptedBlob,
    pub content_hash: String,
    pub metadata: Metadata,
    pub created_at: String,
}

const GATE_OPEN: u8 = 0;
const GATE_COMMITTED: u8 = 1;
const GATE_ABANDONED: u8 = 2;

/// One-shot decision shared by an insert and the caller waiting on it.
///
/// The insert claims the gate right before committing; a caller that stops
/// waiting claims it to abandon the write. Whichever claims first wins, so a
/// write the caller reported as failed can never commit afterwards.
#[derive(Debug, Clone, Default)]
pub struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the insert may commit. False once the caller has abandoned it.
    pub fn try_commit(&self) -> bool {
        self.claim(GATE_COMMITTED)
    }

    /// True if the write is now abandoned. False if the commit was already claimed.
    pub fn abandon(&self) -> bool {
        self.claim(GATE_ABANDONED)
    }

    fn claim(&self, state: u8) -> bool {
        match self.0.compare_exchange(
            GATE_OPEN,
            state,
            atomic::Ordering::AcqRel,
            atomic::Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => current == state,
        }
    }
}

/// Storage backend for encrypted, embedded memories.
///
/// Methods are synchronous and may block on disk I/O; async callers run them
/// on the blocking pool.
pub trait VectorStore: Send + Sync {
    /// Persist the record, its embedding and its metadata as one atomic unit.
    ///
    /// Nothing is committed unless `gate.try_commit()` succeeds immediately
    /// before the commit; otherwise the insert rolls back.
    fn insert(&self, memory: &StoredMemory, gate: &CommitGate) -> Result<(), StoreError>;

    /// Hits with `similarity >= threshold`, best first, at most `limit`.
    fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<StoredHit>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<StoredMemory>, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;
}

/// Apply the search contract to raw candidates: drop anything under
/// `threshold`, order by similarity descending with ties broken by id, keep
/// the first `limit`.
pub fn rank_hits(mut hits: Vec<StoredHit>, limit: usize, threshold: f64) -> Vec<StoredHit> {
    hits.retain(|h| h.similarity >= threshold);
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(limit);
    hits
}

/// Cosine similarity of two unit vectors from their Euclidean distance.
pub fn l2_distance_to_similarity(distance: f64) -> f64 {
    1.0 - (distance * distance) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Cipher;

    #[test]
    fn commit_gate_first_claim_wins() {
        let gate = CommitGate::new();
        let writer = gate.clone();
        assert!(writer.try_commit());
        assert!(!gate.abandon());
        assert!(writer.try_commit());

        let gate = CommitGate::new();
        assert!(gate.abandon());
        assert!(!gate.clone().try_commit());
        assert!(gate.abandon());
    }

    fn hit(id: &str, similarity: f64) -> StoredHit {
        let blob = Cipher::from_key([7u8; 32]).encrypt("x").unwrap();
        StoredHit {
            id: id.into(),
            similarity,
            blob,
            content_hash: String::new(),
            metadata: Metadata::new(),
            created_at: String::new(),
        }
    }

    fn ids(hits: &[StoredHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn ranking_sorts_filters_and_truncates() {
        let hits = vec![hit("a", 0.4), hit("b", 0.9), hit("c", 0.1), hit("d", 0.7)];
        let ranked = rank_hits(hits, 2, 0.3);
        assert_eq!(ids(&ranked), vec!["b", "d"]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let ranked = rank_hits(vec![hit("a", 0.5), hit("b", 0.49)], 10, 0.5);
        assert_eq!(ids(&ranked), vec!["a"]);
    }

    #[test]
    fn ties_are_broken_by_id() {
        let first = rank_hits(vec![hit("z", 0.8), hit("m", 0.8), hit("a", 0.8)], 10, 0.0);
        let second = rank_hits(vec![hit("a", 0.8), hit("z", 0.8), hit("m", 0.8)], 10, 0.0);
        assert_eq!(ids(&first), vec!["a", "m", "z"]);
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn nothing_above_threshold_is_empty() {
        assert!(rank_hits(vec![hit("a", 0.2)], 5, 0.99).is_empty());
    }

    #[test]
    fn distance_conversion_matches_cosine() {
        assert!((l2_distance_to_similarity(0.0) - 1.0).abs() < 1e-12);
        // orthogonal unit vectors are sqrt(2) apart
        assert!(l2_distance_to_similarity(2f64.sqrt()).abs() < 1e-12);
        assert!((l2_distance_to_similarity(2.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn sqlite_errors_are_classified() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(StoreError::from(busy), StoreError::Unavailable(_)));

        let corrupt = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CORRUPT),
            None,
        );
        assert!(matches!(StoreError::from(corrupt), StoreError::Corrupt(_)));

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        );
        assert!(matches!(StoreError::from(constraint), StoreError::Rejected(_)));
    }
}
