//! Blackjack against a dealer who stands on all 17s.
//!
//! A round is an explicit state machine so a front end can pace the reveal:
//!
//! ```text
//! Betting -> Dealing -> PlayerTurn -> DealerTurn -> Settled
//!                  \_____________________^
//!                   (natural on either side)
//! ```
//!
//! The stake is debited when dealing starts and again on a double; the return
//! is computed on the total committed stake.

use super::types::{settle_round, GameType, RoundReceipt};
use crate::errors::GameError;
use crate::ledger::Ledger;
use crate::rng::{shuffle, RandomSource};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CHIP: u64 = 100;
const DEALER_STANDS_ON: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    pub fn symbol(self) -> char {
        match self {
            Suit::Spades => '♠',
            Suit::Hearts => '♥',
            Suit::Diamonds => '♦',
            Suit::Clubs => '♣',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Hard value; an ace counts 11 here and is softened by [`hand_value`].
    pub fn value(self) -> u32 {
        match self {
            Rank::Ace => 11,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.label(), self.suit.symbol())
    }
}

/// Best total not above 21 when the aces allow it
pub fn hand_value(cards: &[Card]) -> u32 {
    let mut total: u32 = cards.iter().map(|c| c.rank.value()).sum();
    let mut soft_aces = cards.iter().filter(|c| c.rank == Rank::Ace).count();
    while total > 21 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    total
}

pub fn is_blackjack(cards: &[Card]) -> bool {
    cards.len() == 2 && hand_value(cards) == 21
}

/// Multi-deck shoe, rebuilt and reshuffled once it runs low
#[derive(Debug, Clone)]
pub struct Shoe {
    cards: Vec<Card>,
    decks: u32,
    reshuffle_at: usize,
}

impl Shoe {
    pub fn new<R: RandomSource + ?Sized>(decks: u32, reshuffle_at: usize, rng: &mut R) -> Self {
        let mut shoe = Self {
            cards: Vec::new(),
            decks: decks.max(1),
            reshuffle_at,
        };
        shoe.rebuild(rng);
        shoe
    }

    /// Fixed draw order, first card drawn first. Never reshuffles until empty.
    pub fn stacked(cards: Vec<Card>) -> Self {
        let mut cards = cards;
        cards.reverse();
        Self {
            cards,
            decks: 1,
            reshuffle_at: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn rebuild<R: RandomSource + ?Sized>(&mut self, rng: &mut R) {
        self.cards.clear();
        for _ in 0..self.decks {
            for suit in Suit::ALL {
                for rank in Rank::ALL {
                    self.cards.push(Card::new(rank, suit));
                }
            }
        }
        shuffle(rng, &mut self.cards);
        tracing::debug!(decks = self.decks, cards = self.cards.len(), "Shoe reshuffled");
    }

    pub fn draw<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Card {
        if self.cards.len() < self.reshuffle_at || self.cards.is_empty() {
            self.rebuild(rng);
        }
        match self.cards.pop() {
            Some(card) => card,
            // rebuild always yields at least one deck
            None => Card::new(Rank::Ace, Suit::Spades),
        }
    }
}

/// Pending stake assembled from chips before a deal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetSlip {
    amount: u64,
    chip_value: u64,
}

impl Default for BetSlip {
    fn default() -> Self {
        Self {
            amount: 0,
            chip_value: DEFAULT_CHIP,
        }
    }
}

impl BetSlip {
    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn chip_value(&self) -> u64 {
        self.chip_value
    }

    /// Select a chip and add it to the stake
    pub fn add_chip(&mut self, value: u64) -> u64 {
        self.chip_value = value;
        self.amount = self.amount.saturating_add(value);
        self.amount
    }

    /// Select a chip without betting it
    pub fn select_chip(&mut self, value: u64) {
        self.chip_value = value;
    }

    /// Add one more of the selected chip
    pub fn add_selected(&mut self) -> u64 {
        self.add_chip(self.chip_value)
    }

    pub fn set(&mut self, amount: u64) {
        self.amount = amount;
    }

    pub fn clear(&mut self) {
        self.amount = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Betting,
    Dealing,
    PlayerTurn,
    DealerTurn,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Player,
    Dealer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DealtCard {
    pub seat: Seat,
    pub card: Card,
    pub face_down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealerStep {
    RevealedHole(Card),
    Drew(Card),
    Stood(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlackjackResult {
    PlayerBust,
    Blackjack,
    DealerBlackjack,
    BothBlackjack,
    DealerBust,
    PlayerWins,
    DealerWins,
    Push,
}

impl BlackjackResult {
    /// Total return on the committed stake
    pub fn payout(self, stake: u64) -> u64 {
        match self {
            BlackjackResult::PlayerBust
            | BlackjackResult::DealerBlackjack
            | BlackjackResult::DealerWins => 0,
            // floor(stake * 2.5)
            BlackjackResult::Blackjack => stake.saturating_mul(5) / 2,
            BlackjackResult::BothBlackjack | BlackjackResult::Push => stake,
            BlackjackResult::DealerBust | BlackjackResult::PlayerWins => stake.saturating_mul(2),
        }
    }
}

/// Order matters: naturals are decided before a dealer bust can be.
pub fn resolve(player: &[Card], dealer: &[Card]) -> BlackjackResult {
    let p = hand_value(player);
    let d = hand_value(dealer);
    let player_natural = is_blackjack(player);
    let dealer_natural = is_blackjack(dealer);

    if p > 21 {
        BlackjackResult::PlayerBust
    } else if player_natural && dealer_natural {
        BlackjackResult::BothBlackjack
    } else if player_natural {
        BlackjackResult::Blackjack
    } else if dealer_natural {
        BlackjackResult::DealerBlackjack
    } else if d > 21 {
        BlackjackResult::DealerBust
    } else if p > d {
        BlackjackResult::PlayerWins
    } else if p < d {
        BlackjackResult::DealerWins
    } else {
        BlackjackResult::Push
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackjackOutcome {
    pub result: BlackjackResult,
    pub player: Vec<Card>,
    pub dealer: Vec<Card>,
    pub player_value: u32,
    pub dealer_value: u32,
    pub doubled: bool,
    pub receipt: RoundReceipt,
}

#[derive(Debug, Clone)]
struct Round {
    profile: String,
    base_bet: u64,
    stake: u64,
    doubled: bool,
    can_double: bool,
    player: Vec<Card>,
    dealer: Vec<Card>,
    hole_revealed: bool,
    // dealer keeps the hand as dealt (natural or player bust)
    skip_dealer_draws: bool,
    dealer_done: bool,
}

/// Per-session blackjack controller: shoe, bet slip and the round in play
#[derive(Debug, Clone)]
pub struct BlackjackTable {
    shoe: Shoe,
    slip: BetSlip,
    phase: Phase,
    round: Option<Round>,
}

impl BlackjackTable {
    pub fn new<R: RandomSource + ?Sized>(decks: u32, reshuffle_at: usize, rng: &mut R) -> Self {
        Self::with_shoe(Shoe::new(decks, reshuffle_at, rng))
    }

    pub fn with_shoe(shoe: Shoe) -> Self {
        Self {
            shoe,
            slip: BetSlip::default(),
            phase: Phase::Betting,
            round: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn slip(&self) -> &BetSlip {
        &self.slip
    }

    pub fn slip_mut(&mut self) -> &mut BetSlip {
        &mut self.slip
    }

    pub fn shoe(&self) -> &Shoe {
        &self.shoe
    }

    pub fn in_round(&self) -> bool {
        matches!(self.phase, Phase::Dealing | Phase::PlayerTurn | Phase::DealerTurn)
    }

    pub fn player_hand(&self) -> &[Card] {
        self.round.as_ref().map(|r| r.player.as_slice()).unwrap_or(&[])
    }

    pub fn dealer_hand(&self) -> &[Card] {
        self.round.as_ref().map(|r| r.dealer.as_slice()).unwrap_or(&[])
    }

    /// Dealer cards a player may see; the hole card is hidden until revealed.
    pub fn dealer_visible(&self) -> Vec<Option<Card>> {
        match &self.round {
            Some(round) => round
                .dealer
                .iter()
                .enumerate()
                .map(|(i, card)| (i > 0 || round.hole_revealed).then_some(*card))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn player_value(&self) -> u32 {
        hand_value(self.player_hand())
    }

    pub fn stake(&self) -> u64 {
        self.round.as_ref().map(|r| r.stake).unwrap_or(0)
    }

    pub fn can_double(&self) -> bool {
        self.phase == Phase::PlayerTurn && self.round.as_ref().map(|r| r.can_double).unwrap_or(false)
    }

    /// Debit the slip's stake and open a round in the dealing phase
    pub fn begin_round(&mut self, ledger: &Ledger, profile: &str) -> Result<(), GameError> {
        if self.in_round() {
            return Err(GameError::RoundInProgress);
        }
        let bet = self.slip.amount();
        if bet == 0 {
            return Err(GameError::InvalidBet("place chips before dealing".to_string()));
        }
        let stake = i64::try_from(bet)
            .map_err(|_| GameError::InvalidBet(format!("bet {} is too large", bet)))?;
        ledger.place_bet(profile, stake)?;

        self.round = Some(Round {
            profile: profile.to_string(),
            base_bet: bet,
            stake: bet,
            doubled: false,
            can_double: true,
            player: Vec::with_capacity(4),
            dealer: Vec::with_capacity(4),
            hole_revealed: false,
            skip_dealer_draws: false,
            dealer_done: false,
        });
        self.phase = Phase::Dealing;
        tracing::debug!(profile, bet, "Blackjack round started");
        Ok(())
    }

    /// Deal the next opening card: dealer hole, player, dealer, player.
    pub fn deal_step<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<DealtCard, GameError> {
        if self.phase != Phase::Dealing {
            return Err(GameError::ActionNotAllowed("not dealing"));
        }
        let round = self.round.as_mut().ok_or(GameError::NoRoundInProgress)?;
        let card = self.shoe.draw(rng);

        let dealt = match round.player.len() + round.dealer.len() {
            0 => {
                round.dealer.push(card);
                DealtCard { seat: Seat::Dealer, card, face_down: true }
            }
            1 | 3 => {
                round.player.push(card);
                DealtCard { seat: Seat::Player, card, face_down: false }
            }
            _ => {
                round.dealer.push(card);
                DealtCard { seat: Seat::Dealer, card, face_down: false }
            }
        };

        if round.player.len() == 2 && round.dealer.len() == 2 {
            if is_blackjack(&round.player) || is_blackjack(&round.dealer) {
                round.skip_dealer_draws = true;
                round.can_double = false;
                self.phase = Phase::DealerTurn;
            } else {
                self.phase = Phase::PlayerTurn;
            }
        }
        Ok(dealt)
    }

    /// Start a round and deal all four opening cards
    pub fn deal<R: RandomSource + ?Sized>(
        &mut self,
        ledger: &Ledger,
        profile: &str,
        rng: &mut R,
    ) -> Result<Phase, GameError> {
        self.begin_round(ledger, profile)?;
        while self.phase == Phase::Dealing {
            self.deal_step(rng)?;
        }
        Ok(self.phase)
    }

    pub fn hit<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<Card, GameError> {
        self.ensure_player_turn()?;
        let round = self.round.as_mut().ok_or(GameError::NoRoundInProgress)?;
        let card = self.shoe.draw(rng);
        round.player.push(card);
        round.can_double = false;

        if hand_value(&round.player) > 21 {
            round.skip_dealer_draws = true;
            self.phase = Phase::DealerTurn;
        }
        Ok(card)
    }

    pub fn stand(&mut self) -> Result<(), GameError> {
        self.ensure_player_turn()?;
        self.phase = Phase::DealerTurn;
        Ok(())
    }

    /// Double the stake for exactly one more card. Only the first action.
    pub fn double<R: RandomSource + ?Sized>(&mut self, ledger: &Ledger, rng: &mut R) -> Result<Card, GameError> {
        self.ensure_player_turn()?;
        let round = self.round.as_mut().ok_or(GameError::NoRoundInProgress)?;
        if !round.can_double {
            return Err(GameError::ActionNotAllowed("double is only allowed as the first action"));
        }
        let extra = i64::try_from(round.base_bet)
            .map_err(|_| GameError::InvalidBet(format!("bet {} is too large", round.base_bet)))?;
        ledger.place_bet(&round.profile, extra)?;

        round.stake = round.stake.saturating_add(round.base_bet);
        round.doubled = true;
        round.can_double = false;
        let card = self.shoe.draw(rng);
        round.player.push(card);
        if hand_value(&round.player) > 21 {
            round.skip_dealer_draws = true;
        }
        self.phase = Phase::DealerTurn;
        Ok(card)
    }

    /// One dealer transition: reveal the hole card, then draw below 17, then stand.
    pub fn dealer_step<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<DealerStep, GameError> {
        if self.phase != Phase::DealerTurn {
            return Err(GameError::ActionNotAllowed("not the dealer's turn"));
        }
        let round = self.round.as_mut().ok_or(GameError::NoRoundInProgress)?;

        if !round.hole_revealed {
            round.hole_revealed = true;
            let hole = round.dealer.first().copied().ok_or(GameError::NoRoundInProgress)?;
            return Ok(DealerStep::RevealedHole(hole));
        }

        let value = hand_value(&round.dealer);
        if !round.dealer_done && !round.skip_dealer_draws && value < DEALER_STANDS_ON {
            let card = self.shoe.draw(rng);
            round.dealer.push(card);
            return Ok(DealerStep::Drew(card));
        }

        round.dealer_done = true;
        Ok(DealerStep::Stood(value))
    }

    pub fn dealer_finished(&self) -> bool {
        self.round.as_ref().map(|r| r.dealer_done).unwrap_or(false)
    }

    /// Pay out the finished round and return to betting
    pub fn settle(&mut self, ledger: &Ledger) -> Result<BlackjackOutcome, GameError> {
        if self.phase != Phase::DealerTurn {
            return Err(GameError::ActionNotAllowed("round is not ready to settle"));
        }
        if !self.dealer_finished() {
            return Err(GameError::ActionNotAllowed("dealer has not finished"));
        }
        let round = self.round.take().ok_or(GameError::NoRoundInProgress)?;

        let result = resolve(&round.player, &round.dealer);
        let payout = match result {
            // a push returns the base bet, doubled or not
            BlackjackResult::Push => round.base_bet,
            _ => result.payout(round.stake),
        };
        let receipt = settle_round(ledger, &round.profile, GameType::Blackjack, round.stake, payout)?;

        self.phase = Phase::Settled;
        self.slip.clear();
        tracing::debug!(profile = %round.profile, result = ?result, payout, "Blackjack round settled");

        Ok(BlackjackOutcome {
            result,
            player_value: hand_value(&round.player),
            dealer_value: hand_value(&round.dealer),
            player: round.player,
            dealer: round.dealer,
            doubled: round.doubled,
            receipt,
        })
    }

    /// Run the dealer without pauses and settle
    pub fn finish<R: RandomSource + ?Sized>(&mut self, ledger: &Ledger, rng: &mut R) -> Result<BlackjackOutcome, GameError> {
        while !self.dealer_finished() {
            self.dealer_step(rng)?;
        }
        self.settle(ledger)
    }

    fn ensure_player_turn(&self) -> Result<(), GameError> {
        match self.phase {
            Phase::PlayerTurn => Ok(()),
            Phase::Dealing | Phase::DealerTurn => Err(GameError::ActionNotAllowed("not the player's turn")),
            Phase::Betting | Phase::Settled => Err(GameError::NoRoundInProgress),
        }
    }
}
