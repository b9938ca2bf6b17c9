//! Configuration system for the simonctr CLI.

use serde::{Deserialize, Serialize};
use simonctr_core::KeyRing;
use simonctr_crypto::rsa::{KeyPair, PublicKey};
use simonctr_transport::{ServerConfig, TcpSettings};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// simonctr configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerSection,
    /// Key files
    #[serde(default)]
    pub keys: KeysConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Concurrent connection limit
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Read timeout in seconds
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Largest accepted frame in bytes, header included
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

/// Key file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Local keypair file (`e`, `d`, `n`)
    #[serde(default = "default_keypair_path")]
    pub keypair_file: PathBuf,
    /// Peer public key file (`e`, `n`); the local key is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_public_key_file: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_listen_addr() -> String {
    simonctr_transport::server::DEFAULT_LISTEN_ADDR.to_string()
}

fn default_max_connections() -> usize {
    simonctr_transport::server::DEFAULT_MAX_CONNECTIONS
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_max_frame_len() -> usize {
    simonctr_transport::tcp::DEFAULT_MAX_FRAME_LEN
}

fn default_keypair_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("simonctr/keypair.toml")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
            read_timeout_secs: default_read_timeout_secs(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            keypair_file: default_keypair_path(),
            peer_public_key_file: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("simonctr/config.toml")
    }

    /// Load config from default path, or create default if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();

        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Parse listen address as `SocketAddr`
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be parsed.
    pub fn parse_listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Server settings for the transport layer
    ///
    /// # Errors
    ///
    /// Returns an error if the listen address cannot be parsed.
    pub fn server_config(&self) -> anyhow::Result<ServerConfig> {
        Ok(ServerConfig {
            listen_addr: self.parse_listen_addr()?,
            max_connections: self.server.max_connections,
            read_timeout: Duration::from_secs(self.server.read_timeout_secs),
            max_frame_len: self.server.max_frame_len,
        })
    }

    /// Per-connection limits for outgoing connections
    #[must_use]
    pub fn tcp_settings(&self) -> TcpSettings {
        TcpSettings {
            max_frame_len: self.server.max_frame_len,
            read_timeout: Duration::from_secs(self.server.read_timeout_secs),
        }
    }

    /// Load the key ring named by the `keys` section
    ///
    /// # Errors
    ///
    /// Returns an error if a key file cannot be read or holds invalid keys.
    pub fn load_keys(&self) -> anyhow::Result<KeyRing> {
        let local: KeyPair = load_toml(&self.keys.keypair_file, "keypair")?;

        match &self.keys.peer_public_key_file {
            Some(path) => {
                let peer: PublicKey = load_toml(path, "peer public key")?;
                Ok(KeyRing::new(local, peer))
            }
            None => Ok(KeyRing::single(local)),
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.parse_listen_addr()?;

        if self.server.max_connections == 0 || self.server.max_connections > 1024 {
            anyhow::bail!("Max connections must be between 1 and 1024");
        }

        if self.server.read_timeout_secs == 0 {
            anyhow::bail!("Read timeout must be at least 1 second");
        }

        let min_frame = simonctr_core::FRAME_HEADER_SIZE + 1;
        let max_frame = simonctr_core::FRAME_HEADER_SIZE + simonctr_core::MAX_PAYLOAD_LEN;
        if self.server.max_frame_len < min_frame || self.server.max_frame_len > max_frame {
            anyhow::bail!("Max frame length must be between {min_frame} and {max_frame} bytes");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}

fn load_toml<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {} file {}: {}", what, path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Invalid {} file {}: {}", what, path.display(), e))
}
