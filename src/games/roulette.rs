//! Single-zero roulette: one uniform draw over 0..=36.
//!
//! Outside bets (colour, parity) return 2x the stake, a straight number 36x.
//! Zero loses every outside bet.

use super::types::{settle_round, GameType, RoundReceipt};
use crate::errors::GameError;
use crate::ledger::Ledger;
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_NUMBER: u8 = 36;

const RED_NUMBERS: [u8; 18] = [1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WheelColor {
    Green,
    Red,
    Black,
}

pub fn color_of(number: u8) -> WheelColor {
    if number == 0 {
        WheelColor::Green
    } else if RED_NUMBERS.contains(&number) {
        WheelColor::Red
    } else {
        WheelColor::Black
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouletteBet {
    Red,
    Black,
    Odd,
    Even,
    Straight(u8),
}

impl RouletteBet {
    pub fn validate(self) -> Result<Self, GameError> {
        match self {
            RouletteBet::Straight(n) if n > MAX_NUMBER => Err(GameError::InvalidBet(format!(
                "straight number must be 0-{}, got {}",
                MAX_NUMBER, n
            ))),
            bet => Ok(bet),
        }
    }

    pub fn wins(self, number: u8) -> bool {
        match self {
            RouletteBet::Red => color_of(number) == WheelColor::Red,
            RouletteBet::Black => color_of(number) == WheelColor::Black,
            RouletteBet::Odd => number % 2 == 1,
            RouletteBet::Even => number != 0 && number % 2 == 0,
            RouletteBet::Straight(n) => n == number,
        }
    }

    /// Total return per staked token on a win, stake included
    pub fn return_multiplier(self) -> u64 {
        match self {
            RouletteBet::Straight(_) => 36,
            _ => 2,
        }
    }
}

impl fmt::Display for RouletteBet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouletteBet::Red => write!(f, "red"),
            RouletteBet::Black => write!(f, "black"),
            RouletteBet::Odd => write!(f, "odd"),
            RouletteBet::Even => write!(f, "even"),
            RouletteBet::Straight(n) => write!(f, "straight {}", n),
        }
    }
}

/// Accepts `red`, `black`, `odd`, `even` or a number for a straight bet
impl FromStr for RouletteBet {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let bet = match s.as_str() {
            "red" => RouletteBet::Red,
            "black" => RouletteBet::Black,
            "odd" => RouletteBet::Odd,
            "even" => RouletteBet::Even,
            other => {
                let number = other
                    .strip_prefix("straight")
                    .unwrap_or(other)
                    .trim_start_matches([':', ' ', '='])
                    .parse::<u8>()
                    .map_err(|_| GameError::InvalidBet(format!("unknown roulette bet '{}'", s)))?;
                RouletteBet::Straight(number)
            }
        };
        bet.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouletteOutcome {
    pub number: u8,
    pub color: WheelColor,
    pub bet: RouletteBet,
    pub won: bool,
    pub receipt: RoundReceipt,
}

#[derive(Debug, Default, Clone)]
pub struct RouletteTable {
    last_number: Option<u8>,
}

impl RouletteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_number(&self) -> Option<u8> {
        self.last_number
    }

    pub fn spin<R: RandomSource + ?Sized>(
        &mut self,
        ledger: &Ledger,
        profile: &str,
        bet: RouletteBet,
        stake: i64,
        rng: &mut R,
    ) -> Result<RouletteOutcome, GameError> {
        let bet = bet.validate()?;
        ledger.place_bet(profile, stake)?;
        let stake = stake as u64;

        let number = rng.random_int(0, MAX_NUMBER as i64) as u8;
        self.last_number = Some(number);

        let won = bet.wins(number);
        let payout = if won { stake * bet.return_multiplier() } else { 0 };
        let receipt = settle_round(ledger, profile, GameType::Roulette, stake, payout)?;

        Ok(RouletteOutcome {
            number,
            color: color_of(number),
            bet,
            won,
            receipt,
        })
    }
}
