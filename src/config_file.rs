//! Configuration file support
//!
//! Loads server configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Batch cache settings
    pub cache: CacheSettings,
    /// Audio pipeline settings
    pub audio: Option<AudioSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Limits settings
    pub limits: Option<LimitsSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum memory usage in MB
    pub max_memory_mb: usize,
    /// Maximum number of prepared batches
    pub max_batches: usize,
    /// TTL for prepared batches in seconds
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Directory receiving a copy of every prepared part
    pub debug_dump_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSettings {
    /// Batches converting at the same time
    pub max_concurrent_batches: Option<usize>,
    /// Maximum upload body size in MB
    pub max_upload_mb: Option<usize>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 3000,
                cors_enabled: Some(true),
            },
            cache: CacheSettings {
                max_memory_mb: 1024,
                max_batches: 32,
                ttl_secs: 900,
            },
            audio: Some(AudioSettings {
                debug_dump_dir: None,
            }),
            logging: Some(LoggingSettings {
                level: "debug".to_string(),
                format: Some("pretty".to_string()),
            }),
            limits: Some(LimitsSettings {
                max_concurrent_batches: Some(2),
                max_upload_mb: Some(512),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        let logging = self.logging;
        let limits = self.limits;

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            cache: crate::config::CacheConfig {
                max_memory_mb: self.cache.max_memory_mb,
                max_batches: self.cache.max_batches,
                ttl_secs: self.cache.ttl_secs,
            },
            audio: crate::config::AudioConfig {
                debug_dump_dir: self.audio.and_then(|a| a.debug_dump_dir),
            },
            cors_enabled: self.server.cors_enabled.unwrap_or(true),
            log_level: logging
                .as_ref()
                .map(|l| l.level.clone())
                .unwrap_or(defaults.log_level),
            log_format: logging
                .and_then(|l| l.format)
                .unwrap_or(defaults.log_format),
            max_concurrent_batches: limits
                .as_ref()
                .and_then(|l| l.max_concurrent_batches)
                .unwrap_or(defaults.max_concurrent_batches)
                .max(1),
            max_upload_mb: limits
                .as_ref()
                .and_then(|l| l.max_upload_mb)
                .unwrap_or(defaults.max_upload_mb),
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}

/// Load the server configuration. A missing file yields the defaults.
pub fn load<P: AsRef<Path>>(path: P) -> Result<ServerConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ServerConfig::default());
    }
    Ok(ConfigFile::from_file(path)?.into_server_config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default_config();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.cache.max_batches, 32);
    }

    #[test]
    fn test_config_file_roundtrip() {
        let config = ConfigFile::default_config();

        let mut temp_file = NamedTempFile::new().unwrap();
        let content = toml::to_string_pretty(&config).unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let loaded = ConfigFile::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.server.port, config.server.port);
        assert_eq!(loaded.cache.max_memory_mb, config.cache.max_memory_mb);
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(
                b"[server]\nhost = \"127.0.0.1\"\nport = 8080\n\n\
                  [cache]\nmax_memory_mb = 64\nmax_batches = 4\nttl_secs = 60\n\n\
                  [audio]\ndebug_dump_dir = \"/tmp/pcm\"\n",
            )
            .unwrap();

        let config = ConfigFile::from_file(temp_file.path())
            .unwrap()
            .into_server_config();
        assert_eq!(config.socket_addr(), "127.0.0.1:8080");
        assert_eq!(config.cache.max_batches, 4);
        assert_eq!(config.audio.debug_dump_dir, Some(PathBuf::from("/tmp/pcm")));
        assert_eq!(config.max_concurrent_batches, 2);
        assert_eq!(config.log_format, "pretty");
    }

    #[test]
    fn test_zero_concurrency_is_raised_to_one() {
        let mut file = ConfigFile::default_config();
        file.limits = Some(LimitsSettings {
            max_concurrent_batches: Some(0),
            max_upload_mb: None,
        });
        assert_eq!(file.into_server_config().max_concurrent_batches, 1);
    }

    #[test]
    fn test_invalid_and_missing_files() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"this is = not [valid").unwrap();
        assert!(matches!(
            ConfigFile::from_file(temp_file.path()),
            Err(ServerError::Config(_))
        ));

        assert!(load(temp_file.path()).is_err());
        let missing = temp_file.path().with_extension("missing");
        assert_eq!(load(missing).unwrap().port, ServerConfig::default().port);
    }

    #[test]
    fn test_generate_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        generate_default_config(&path).unwrap();

        assert!(path.exists());
        let loaded = ConfigFile::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 3000);
    }
}
