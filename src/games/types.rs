use crate::errors::GameError;
use crate::ledger::{Ledger, RoundResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Slots,
    Roulette,
    Blackjack,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::Slots => write!(f, "slots"),
            GameType::Roulette => write!(f, "roulette"),
            GameType::Blackjack => write!(f, "blackjack"),
        }
    }
}

/// Money movement of one settled round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundReceipt {
    pub round_id: String,
    pub game: GameType,
    /// Normalized profile key
    pub profile: String,
    /// Everything debited through `place_bet` for this round
    pub stake: u64,
    /// Everything credited through `payout` for this round
    pub payout: u64,
    /// Ledger balance once the round settled
    pub balance: u64,
}

impl RoundReceipt {
    pub fn net(&self) -> i64 {
        self.payout as i64 - self.stake as i64
    }

    pub fn result(&self) -> RoundResult {
        match self.payout.cmp(&self.stake) {
            std::cmp::Ordering::Greater => RoundResult::Won,
            std::cmp::Ordering::Equal => RoundResult::Push,
            std::cmp::Ordering::Less => RoundResult::Lost,
        }
    }
}

/// Credit the payout (if any), bump the profile's counters and produce the
/// receipt. Called exactly once per round after its stake was debited.
pub(crate) fn settle_round(
    ledger: &Ledger,
    profile: &str,
    game: GameType,
    stake: u64,
    payout: u64,
) -> Result<RoundReceipt, GameError> {
    let balance = if payout > 0 {
        ledger.payout(profile, payout)?
    } else {
        ledger.get_balance(profile)?
    };

    let receipt = RoundReceipt {
        round_id: Uuid::new_v4().to_string(),
        game,
        profile: profile.to_string(),
        stake,
        payout,
        balance,
    };
    ledger.record_round(profile, receipt.result())?;

    tracing::debug!(
        round_id = %receipt.round_id,
        game = %game,
        stake,
        payout,
        balance,
        "Round settled"
    );
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(stake: u64, payout: u64) -> RoundReceipt {
        RoundReceipt {
            round_id: "r".to_string(),
            game: GameType::Roulette,
            profile: "p".to_string(),
            stake,
            payout,
            balance: 0,
        }
    }

    #[test]
    fn test_receipt_result_and_net() {
        assert_eq!(receipt(100, 200).result(), RoundResult::Won);
        assert_eq!(receipt(100, 100).result(), RoundResult::Push);
        assert_eq!(receipt(500, 150).result(), RoundResult::Lost);
        assert_eq!(receipt(500, 150).net(), -350);
    }

    #[test]
    fn test_game_type_serialization() {
        assert_eq!(serde_json::to_string(&GameType::Blackjack).unwrap(), "\"blackjack\"");
        assert_eq!(GameType::Slots.to_string(), "slots");
    }
}
