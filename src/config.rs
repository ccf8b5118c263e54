use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MemoryLinkConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
    pub retrieval: RetrievalConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `local` (ONNX Runtime) or `hash` (offline trigram hashing).
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub embedding_capacity: usize,
    pub embedding_ttl_secs: u64,
    pub result_capacity: usize,
    pub result_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    pub default_threshold: f64,
    /// Candidates requested from the index per requested result.
    pub overfetch_factor: usize,
}

#[derive(Deserialize, Clone, Default)]
#[serde(default)]
pub struct SecurityConfig {
    pub encryption_key: Option<String>,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.encryption_key.is_some() {
            "<redacted>"
        } else {
            "<unset>"
        };
        f.debug_struct("SecurityConfig")
            .field("encryption_key", &key)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_memorylink_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            timeout_secs: 30,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_memorylink_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            dimensions: crate::embedding::EMBEDDING_DIM,
            timeout_secs: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            embedding_capacity: 500,
            embedding_ttl_secs: 24 * 60 * 60,
            result_capacity: 256,
            result_ttl_secs: 5 * 60,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            default_threshold: 0.3,
            overfetch_factor: 2,
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Name recorded in the index for the embedding space in use. The hash
    /// provider ignores `model`, so it gets a fixed name of its own.
    pub fn index_model(&self) -> &str {
        match self.provider.as_str() {
            "hash" => "hash-trigram",
            _ => &self.model,
        }
    }
}

/// Returns `~/.memorylink/`, or `./.memorylink/` when no home directory is known.
pub fn default_memorylink_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memorylink")
}

/// Returns the default config file path: `~/.memorylink/config.toml`
pub fn default_config_path() -> PathBuf {
    default_memorylink_dir().join("config.toml")
}

impl MemoryLinkConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MemoryLinkConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MEMORYLINK_DB, MEMORYLINK_LOG_LEVEL,
    /// MEMORYLINK_EMBEDDING_PROVIDER, MEMORYLINK_ENCRYPTION_KEY).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMORYLINK_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEMORYLINK_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MEMORYLINK_EMBEDDING_PROVIDER") {
            self.embedding.provider = val;
        }
        if let Ok(val) = std::env::var("MEMORYLINK_ENCRYPTION_KEY") {
            self.security.encryption_key = Some(val);
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
