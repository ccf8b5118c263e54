pub mod schema;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

static SQLITE_VEC_INIT: Once = Once::new();

/// How long a writer waits on a locked database before reporting it busy.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// The embedding space an index was built in. Vectors from a different space
/// are not comparable with the stored ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexIdentity {
    pub model: String,
    pub dimensions: usize,
    pub normalization: String,
}

impl IndexIdentity {
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions,
            normalization: crate::embedding::NORMALIZATION.to_string(),
        }
    }
}

/// Open (or create) the database at the given path, with sqlite-vec loaded
/// and the schema initialized for `dimensions`-wide vectors.
pub fn open_database(path: impl AsRef<Path>, dimensions: usize) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    schema::init_schema(&conn, dimensions).context("failed to initialize schema")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database.
pub fn open_memory_database(dimensions: usize) -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn, dimensions).context("failed to initialize schema")?;
    Ok(conn)
}

/// Record `identity` on a fresh index, or verify it against the stored one.
///
/// A different width or normalization is refused outright: every stored
/// ranking would silently change. A different model name with the same shape
/// is only warned about.
pub fn ensure_index_identity(conn: &Connection, identity: &IndexIdentity) -> Result<()> {
    let stored_dims = schema::get_meta(conn, "embedding_dimensions")?;
    let Some(stored_dims) = stored_dims else {
        schema::set_meta(conn, "embedding_model", &identity.model)?;
        schema::set_meta(conn, "embedding_dimensions", &identity.dimensions.to_string())?;
        schema::set_meta(conn, "embedding_normalization", &identity.normalization)?;
        return Ok(());
    };

    if stored_dims != identity.dimensions.to_string() {
        bail!(
            "index was built with {stored_dims}-dimensional embeddings, \
             but {} are configured",
            identity.dimensions
        );
    }

    if let Some(stored_norm) = schema::get_meta(conn, "embedding_normalization")? {
        if stored_norm != identity.normalization {
            bail!(
                "index was built with '{stored_norm}' normalization, \
                 but '{}' is in use",
                identity.normalization
            );
        }
    }

    if let Some(stored_model) = schema::get_meta(conn, "embedding_model")? {
        if stored_model != identity.model {
            tracing::warn!(
                stored = %stored_model,
                configured = %identity.model,
                "embedding model differs from the one this index was built with; rankings may degrade"
            );
        }
    }

    Ok(())
}

/// Result of [`check_database_health`].
#[derive(Debug)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: String,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<String>,
    pub embedding_normalization: Option<String>,
    pub memory_count: u64,
    pub vector_count: u64,
}

pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity: Vec<String> = conn
        .prepare("PRAGMA integrity_check")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let integrity_ok = integrity.len() == 1 && integrity[0] == "ok";

    let sqlite_vec_version: String = conn.query_row("SELECT vec_version()", [], |r| r.get(0))?;
    let memory_count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))?;
    let vector_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM memories_vec", [], |r| r.get(0))?;

    Ok(HealthReport {
        integrity_ok,
        integrity_details: integrity.join("; "),
        schema_version: schema::get_meta(conn, "schema_version")?.unwrap_or_default(),
        sqlite_vec_version,
        embedding_model: schema::get_meta(conn, "embedding_model")?,
        embedding_dimensions: schema::get_meta(conn, "embedding_dimensions")?,
        embedding_normalization: schema::get_meta(conn, "embedding_normalization")?,
        memory_count: memory_count as u64,
        vector_count: vector_count as u64,
    })
}
