use serde::{Deserialize, Serialize};

/// What caused a balance to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceChange {
    Initialized,
    BetPlaced,
    PaidOut,
    DailyClaimed,
    Adjusted,
}

/// Published by the ledger after every persisted balance mutation.
///
/// `balance` is the authoritative value right after the write, so observers
/// can overwrite their mirror instead of replaying deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEvent {
    /// Normalized profile key
    pub profile: String,
    pub change: BalanceChange,
    pub delta: i64,
    pub balance: u64,
    /// Unix milliseconds
    pub at: i64,
}
