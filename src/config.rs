//! Configuration management with validation and defaults
//!
//! Values come from `Default`, optionally a TOML file, then `MINI_CASINO_*`
//! environment variables, and are validated before use.

use crate::errors::{ConfigurationError, CasinoResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Top-level casino configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CasinoConfig {
    pub ledger: LedgerConfig,
    pub directory: DirectoryConfig,
    pub storage: StorageConfig,
    pub games: GamesConfig,
    pub monitoring: MonitoringConfig,
}

/// Wallet amounts
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Tokens credited by a successful daily claim
    pub daily_amount: u64,
    /// Balance given to profiles created through the directory
    pub starting_balance: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            daily_amount: 10_000,
            starting_balance: 10_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DirectoryConfig {
    pub max_profiles: u32,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { max_profiles: 5 }
    }
}

/// Storage backend selection
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    RocksDb,
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: String,
    /// Prefix of every persisted key
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::RocksDb,
            data_directory: "./DB/mini_casino".to_string(),
            namespace: "mini-casino".to_string(),
        }
    }
}

/// Table limits shared by the game engines
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GamesConfig {
    pub slots_min_line_bet: u64,
    pub blackjack_decks: u32,
    /// The shoe is rebuilt once fewer cards than this remain
    pub blackjack_reshuffle_threshold: usize,
}

impl Default for GamesConfig {
    fn default() -> Self {
        Self {
            slots_min_line_bet: 100,
            blackjack_decks: 6,
            blackjack_reshuffle_threshold: 60,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl CasinoConfig {
    /// In-memory store, nothing survives the process
    pub fn ephemeral() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_level: "warn".to_string(),
            },
            ..Default::default()
        }
    }

    /// Durable RocksDB store under `./DB`
    pub fn production() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::RocksDb,
                data_directory: "./DB/mini_casino".to_string(),
                namespace: "mini-casino".to_string(),
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.ledger.daily_amount == 0 {
            return Err(invalid("ledger.daily_amount", "0", "must be > 0"));
        }

        if self.directory.max_profiles == 0 {
            return Err(invalid("directory.max_profiles", "0", "must be at least 1"));
        }

        if self.storage.namespace.trim().is_empty() {
            return Err(invalid(
                "storage.namespace",
                &self.storage.namespace,
                "must not be empty",
            ));
        }

        if self.storage.backend == StorageBackend::RocksDb
            && self.storage.data_directory.trim().is_empty()
        {
            return Err(invalid(
                "storage.data_directory",
                "",
                "required for the rocksdb backend",
            ));
        }

        if self.games.slots_min_line_bet == 0 {
            return Err(invalid("games.slots_min_line_bet", "0", "must be > 0"));
        }

        if self.games.blackjack_decks == 0 {
            return Err(invalid("games.blackjack_decks", "0", "must be > 0"));
        }

        let shoe_size = self.games.blackjack_decks as usize * 52;
        if self.games.blackjack_reshuffle_threshold >= shoe_size {
            return Err(invalid(
                "games.blackjack_reshuffle_threshold",
                &self.games.blackjack_reshuffle_threshold.to_string(),
                "must be smaller than the shoe",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> CasinoResult<CasinoConfig> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => CasinoConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<CasinoConfig, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Ok(toml::from_str(&content)?)
    }

    fn apply_env_overrides(config: &mut CasinoConfig) -> Result<(), ConfigurationError> {
        if let Ok(dir) = env::var("MINI_CASINO_DATA_DIR") {
            config.storage.data_directory = dir;
        }
        if let Ok(namespace) = env::var("MINI_CASINO_NAMESPACE") {
            config.storage.namespace = namespace;
        }
        if let Ok(backend) = env::var("MINI_CASINO_STORAGE") {
            config.storage.backend = match backend.to_ascii_lowercase().as_str() {
                "rocksdb" => StorageBackend::RocksDb,
                "memory" => StorageBackend::Memory,
                _ => {
                    return Err(invalid(
                        "MINI_CASINO_STORAGE",
                        &backend,
                        "expected 'rocksdb' or 'memory'",
                    ))
                }
            };
        }
        if let Ok(amount) = env::var("MINI_CASINO_DAILY_AMOUNT") {
            config.ledger.daily_amount = amount
                .parse()
                .map_err(|_| invalid("MINI_CASINO_DAILY_AMOUNT", &amount, "Invalid token amount"))?;
        }
        if let Ok(max) = env::var("MINI_CASINO_MAX_PROFILES") {
            config.directory.max_profiles = max
                .parse()
                .map_err(|_| invalid("MINI_CASINO_MAX_PROFILES", &max, "Invalid profile count"))?;
        }
        if let Ok(level) = env::var("MINI_CASINO_LOG_LEVEL") {
            config.monitoring.log_level = level;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = CasinoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger.daily_amount, 10_000);
        assert_eq!(config.directory.max_profiles, 5);
        assert_eq!(config.storage.namespace, "mini-casino");
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(CasinoConfig::ephemeral().validate().is_ok());
        assert!(CasinoConfig::production().validate().is_ok());
        assert_eq!(CasinoConfig::ephemeral().storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = CasinoConfig::default();
        config.directory.max_profiles = 0;
        assert!(config.validate().is_err());

        let mut config = CasinoConfig::default();
        config.games.blackjack_decks = 1;
        config.games.blackjack_reshuffle_threshold = 52;
        assert!(config.validate().is_err());

        let mut config = CasinoConfig::default();
        config.storage.namespace = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[directory]\nmax_profiles = 8\n\n[storage]\nbackend = \"memory\"\n"
        )
        .unwrap();

        let config = ConfigLoader::new().with_path(file.path()).load().unwrap();
        assert_eq!(config.directory.max_profiles, 8);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.ledger.daily_amount, 10_000);
        assert_eq!(config.games.slots_min_line_bet, 100);
    }

    #[test]
    fn test_missing_file_fails_to_load() {
        let result = ConfigLoader::new()
            .with_path("/definitely/not/here/casino.toml")
            .load();
        assert!(result.is_err());
    }
}
