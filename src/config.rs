//! Database configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Database configuration
///
/// Only `data_dir` and `max_file_size` affect engine behavior. The remaining
/// options are recognized for embedders but not enforced by the core:
/// caching, compression and encryption are layered outside the storage
/// engine, and connection limits are an embedder-level concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one subdirectory per database
    pub data_dir: PathBuf,
    /// Maximum size of each record file in bytes
    pub max_file_size: u64,
    /// In-memory cache size hint (records)
    pub cache_size: usize,
    /// Compression level (0-9, 0 = disabled)
    pub compression_level: u8,
    /// Enable encryption at rest
    pub enable_encryption: bool,
    /// Encryption key (if encryption is enabled)
    pub encryption_key: Option<String>,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_file_size: 100 * 1024 * 1024, // 100MB
            cache_size: 1000,
            compression_level: 0,
            enable_encryption: false,
            encryption_key: None,
            max_connections: 100,
        }
    }
}
