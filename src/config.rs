//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Largest payload a single UDP datagram can carry over IPv4
pub const MAX_UDP_PAYLOAD: usize = 65507;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name displayed to players
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Address the UDP socket binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// UDP game port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to data files (catalog, rosters)
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Creature catalog file, relative to `data_path`
    #[serde(default = "default_catalog_file")]
    pub catalog_file: PathBuf,

    /// Directory holding per-player roster files, relative to `data_path`
    #[serde(default = "default_roster_path")]
    pub roster_path: PathBuf,

    /// Largest outbound datagram payload; longer messages are fragmented
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Creature every new player starts with
    #[serde(default = "default_starter_creature_id")]
    pub starter_creature_id: String,

    /// Number of creatures handed out by one catch
    #[serde(default = "default_roll_count")]
    pub roll_count: usize,

    /// Fixed RNG seed for reproducible sessions (random when unset)
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

// Default value functions
fn default_server_name() -> String {
    "Pokebattle".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_path() -> PathBuf {
    PathBuf::from("./data")
}

fn default_catalog_file() -> PathBuf {
    PathBuf::from("creatures.json")
}

fn default_roster_path() -> PathBuf {
    PathBuf::from("rosters")
}

fn default_max_payload_bytes() -> usize {
    512 // well under the common path MTU
}

fn default_starter_creature_id() -> String {
    "#0001".to_string()
}

fn default_roll_count() -> usize {
    4
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            bind_address: default_bind_address(),
            port: default_port(),
            data_path: default_data_path(),
            catalog_file: default_catalog_file(),
            roster_path: default_roster_path(),
            max_payload_bytes: default_max_payload_bytes(),
            starter_creature_id: default_starter_creature_id(),
            roll_count: default_roll_count(),
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        // Determine config path from environment or use default
        let config_path = env::var("POKEBATTLE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        // Try to load from file
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;

        // Override with environment variables
        config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("POKEBATTLE_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("POKEBATTLE_BIND_ADDRESS") {
            self.bind_address = val;
        }
        if let Ok(val) = env::var("POKEBATTLE_PORT") {
            if let Ok(port) = val.parse() {
                self.port = port;
            }
        }
        if let Ok(val) = env::var("POKEBATTLE_DATA_PATH") {
            self.data_path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("POKEBATTLE_MAX_PAYLOAD_BYTES") {
            if let Ok(max) = val.parse() {
                self.max_payload_bytes = max;
            }
        }
        if let Ok(val) = env::var("POKEBATTLE_STARTER") {
            self.starter_creature_id = val;
        }
        if let Ok(val) = env::var("POKEBATTLE_RNG_SEED") {
            if let Ok(seed) = val.parse() {
                self.rng_seed = Some(seed);
            }
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port must be between 1 and 65535");
        }

        if self.max_payload_bytes < 64 || self.max_payload_bytes > MAX_UDP_PAYLOAD {
            anyhow::bail!("Max payload must be between 64 and {} bytes", MAX_UDP_PAYLOAD);
        }

        if self.roll_count == 0 || self.roll_count > 10 {
            anyhow::bail!("Roll count must be between 1 and 10");
        }

        if self.starter_creature_id.trim().is_empty() {
            anyhow::bail!("Starter creature id must not be empty");
        }

        self.socket_addr()?;

        Ok(())
    }

    /// Get the socket address the server binds to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind_address))
    }

    /// Full path of the creature catalog
    pub fn catalog_path(&self) -> PathBuf {
        self.data_path.join(&self.catalog_file)
    }

    /// Full path of the roster directory
    pub fn rosters_dir(&self) -> PathBuf {
        self.data_path.join(&self.roster_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server_name, "Pokebattle");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_payload_bytes, 512);
        assert_eq!(config.starter_creature_id, "#0001");
        assert_eq!(config.roll_count, 4);
        assert!(config.rng_seed.is_none());
    }

    #[test]
    fn test_paths() {
        let config = ServerConfig::default();
        assert_eq!(config.catalog_path(), PathBuf::from("./data/creatures.json"));
        assert_eq!(config.rosters_dir(), PathBuf::from("./data/rosters"));
    }

    #[test]
    fn test_from_toml_uses_defaults_for_missing_fields() {
        let config = ServerConfig::from_toml(
            r#"
            port = 9000
            roll_count = 2
            rng_seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.roll_count, 2);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.max_payload_bytes, 512);
        assert_eq!(config.server_name, "Pokebattle");
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        config.max_payload_bytes = 10;
        assert!(config.validate().is_err());
        config.max_payload_bytes = 512;

        config.roll_count = 0;
        assert!(config.validate().is_err());
        config.roll_count = 4;

        config.bind_address = "not an address".to_string();
        assert!(config.validate().is_err());
    }
}
