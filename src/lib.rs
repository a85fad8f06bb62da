//! Mini Casino - Token Wallet and Wager Games
//!
//! A virtual-currency casino built around a per-profile token ledger persisted
//! in a local key-value store. Slots, roulette and blackjack debit stakes and
//! credit wins exclusively through the [`Ledger`]; a capacity-limited
//! [`Directory`] mirrors balances for listing and the leaderboard.
//!
//! [`Casino`] ties the pieces together for a single session.

pub mod casino;
pub mod common;
pub mod config;
pub mod directory;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod profile_store;
pub mod rng;
pub mod storage;

pub use casino::Casino;
pub use common::{BalanceChange, BalanceEvent, Clock, ManualClock, SystemClock};
pub use config::{CasinoConfig, ConfigLoader, StorageBackend};
pub use directory::Directory;
pub use errors::{CasinoError, CasinoResult, DirectoryError, GameError, LedgerError, StorageError};
pub use ledger::{IntoTokens, Ledger, ProfileLocks, RoundResult};
pub use profile_store::{DirectoryEntry, ProfileState, ProfileStats, ProfileStore};
pub use rng::{OsRandom, RandomSource, ScriptedRandom, SeededRandom};
pub use storage::{KvStore, MemoryStore, RocksStore};
