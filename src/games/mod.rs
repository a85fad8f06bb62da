//! Wager games built on the ledger contract.
//!
//! Each engine debits through `Ledger::place_bet` before drawing anything and
//! credits through `Ledger::payout` once the round resolves. Round state lives
//! in the engine's controller struct, one per session.

pub mod blackjack;
pub mod pacing;
pub mod roulette;
pub mod slots;
pub mod types;

pub use blackjack::{BlackjackOutcome, BlackjackTable, Card, Phase, Rank, Shoe, Suit};
pub use pacing::{InstantPacer, Pacer, RevealTimings, TokioPacer};
pub use roulette::{RouletteBet, RouletteOutcome, RouletteTable, WheelColor};
pub use slots::{BonusRules, Paylines, SlotMachine, SpinOutcome, Symbol};
pub use types::{GameType, RoundReceipt};
