//! Encrypted local memory store with semantic search.
//!
//! MemoryLink takes free text, encrypts it at rest, embeds it into a vector,
//! and later retrieves it by meaning. It runs as an
//! [MCP](https://modelcontextprotocol.io/) server over stdio or as a CLI.
//!
//! # Architecture
//!
//! - **Encryption**: AES-256-GCM with a key derived once from a configured
//!   secret (PBKDF2-HMAC-SHA256). Only ciphertext reaches disk.
//! - **Embeddings**: local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions),
//!   or a deterministic offline hashing provider. Loaded lazily, cached by
//!   content hash.
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for KNN search; metadata stored as type-tagged strings.
//! - **Caching**: bounded TTL caches for embeddings and search results.
//!
//! # Modules
//!
//! - [`memory`]: the orchestrator: write and search pipelines, domain types
//! - [`crypto`]: encryption unit and content digests
//! - [`embedding`]: providers, load-once guard, embedding cache
//! - [`store`]: vector store contract, metadata codec, SQLite implementation
//! - [`cache`]: the TTL/LRU cache both caches are built on
//! - [`db`]: database open, schema and health checks
//! - [`config`]: TOML + environment configuration
//! - [`error`]: error taxonomy with stable codes

pub mod cache;
pub mod config;
pub mod crypto;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod store;
