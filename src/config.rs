//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Batch cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum memory used by prepared PCM in megabytes
    pub max_memory_mb: usize,

    /// Maximum number of batches kept
    pub max_batches: usize,

    /// Time-to-live for a prepared batch in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 1024,
            max_batches: 32,
            ttl_secs: 900, // 15 minutes
        }
    }
}

impl CacheConfig {
    /// Get maximum memory in bytes
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_mb * 1024 * 1024
    }
}

/// Audio pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Write every prepared part to this directory as well
    pub debug_dump_dir: Option<PathBuf>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Cache configuration
    pub cache: CacheConfig,

    /// Audio configuration
    pub audio: AudioConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,

    /// Batches converting at the same time
    pub max_concurrent_batches: usize,

    /// Maximum upload body size in megabytes
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cache: CacheConfig::default(),
            audio: AudioConfig::default(),
            cors_enabled: true,
            log_level: "debug".to_string(),
            log_format: "pretty".to_string(),
            max_concurrent_batches: 2,
            max_upload_mb: 512,
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get maximum upload size in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    /// Whether logs should be emitted as JSON lines
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
