//! Error types for the mini-casino wallet and games
//!
//! Every money-affecting failure is returned as a value. The root
//! [`CasinoError`] aggregates the per-component enums so front ends can use `?`
//! across ledger, directory and game calls.

use thiserror::Error;

/// Root error type for all casino operations
#[derive(Debug, Error)]
pub enum CasinoError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("No active profile selected")]
    NoActiveProfile,
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Key-value store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    OpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Only produced while decoding; the profile store logs it and treats the
    /// record as absent.
    #[error("Corrupted data under {key}: {reason}")]
    CorruptedData { key: String, reason: String },
}

/// Wallet errors returned by the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Profile name must not be empty")]
    InvalidName,

    #[error("Bet must be positive (got {amount})")]
    InvalidAmount { amount: i64 },

    #[error("Insufficient funds: balance {balance}, bet {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error("Daily bonus already claimed today (balance {balance})")]
    AlreadyClaimed { balance: u64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Profile directory errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Profile name must not be empty")]
    InvalidName,

    #[error("Profile name already taken: {0}")]
    NameTaken(String),

    #[error("Profile directory is full (max {max} profiles)")]
    DirectoryFull { max: u32 },

    #[error("Unknown profile: {0}")]
    NotFound(String),

    #[error("Maximum profile count must be at least 1")]
    InvalidCapacity,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Game engine errors
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("A round is already in progress")]
    RoundInProgress,

    #[error("No round in progress")]
    NoRoundInProgress,

    #[error("Action not allowed: {0}")]
    ActionNotAllowed(&'static str),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::WriteFailed(e.to_string())
    }
}

impl From<std::io::Error> for ConfigurationError {
    fn from(e: std::io::Error) -> Self {
        ConfigurationError::LoadFailed(e.to_string())
    }
}

impl From<toml::de::Error> for ConfigurationError {
    fn from(e: toml::de::Error) -> Self {
        ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e))
    }
}

impl GameError {
    /// True when the underlying ledger refused the stake for lack of funds.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, GameError::Ledger(LedgerError::InsufficientFunds { .. }))
    }
}

// Convenience type alias for Results
pub type CasinoResult<T> = Result<T, CasinoError>;
