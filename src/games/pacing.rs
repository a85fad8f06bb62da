//! Timed reveal of round transitions.
//!
//! Engines resolve instantly; these drivers step a round one transition at a
//! time and wait on a [`Pacer`] in between so a front end can show each card.

use super::blackjack::{BlackjackTable, DealerStep, DealtCard, Phase};
use crate::errors::GameError;
use crate::rng::RandomSource;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Real delays on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and records every requested pause
#[derive(Debug, Default)]
pub struct InstantPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl InstantPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.pauses().iter().sum()
    }
}

#[async_trait]
impl Pacer for InstantPacer {
    async fn pause(&self, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(duration);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTimings {
    pub card_enter: Duration,
    pub hole_flip: Duration,
    pub before_dealer: Duration,
    pub dealer_draw: Duration,
    pub slot_frame: Duration,
    pub slot_frames: usize,
}

impl Default for RevealTimings {
    fn default() -> Self {
        Self {
            card_enter: Duration::from_millis(180),
            hole_flip: Duration::from_millis(230),
            before_dealer: Duration::from_millis(120),
            dealer_draw: Duration::from_millis(80),
            slot_frame: Duration::from_millis(70),
            slot_frames: 8,
        }
    }
}

/// Deal the opening cards of a round already begun, pausing after each.
pub async fn play_deal<R, P, F>(
    table: &mut BlackjackTable,
    rng: &mut R,
    pacer: &P,
    timings: &RevealTimings,
    mut on_card: F,
) -> Result<Phase, GameError>
where
    R: RandomSource + ?Sized,
    P: Pacer + ?Sized,
    F: FnMut(&DealtCard),
{
    while table.phase() == Phase::Dealing {
        let dealt = table.deal_step(rng)?;
        on_card(&dealt);
        pacer.pause(timings.card_enter).await;
    }
    Ok(table.phase())
}

/// Reveal the hole card and draw for the dealer until it stands.
/// Returns the dealer's final hand value; settling is left to the caller.
pub async fn play_dealer_turn<R, P, F>(
    table: &mut BlackjackTable,
    rng: &mut R,
    pacer: &P,
    timings: &RevealTimings,
    mut on_step: F,
) -> Result<u32, GameError>
where
    R: RandomSource + ?Sized,
    P: Pacer + ?Sized,
    F: FnMut(&DealerStep),
{
    loop {
        let step = table.dealer_step(rng)?;
        on_step(&step);
        match step {
            DealerStep::RevealedHole(_) => {
                pacer.pause(timings.hole_flip).await;
                pacer.pause(timings.before_dealer).await;
            }
            DealerStep::Drew(_) => {
                pacer.pause(timings.card_enter).await;
                pacer.pause(timings.dealer_draw).await;
            }
            DealerStep::Stood(value) => return Ok(value),
        }
    }
}

/// Preview frames shown while the reels spin
pub async fn play_spin_frames<P, F>(pacer: &P, timings: &RevealTimings, mut on_frame: F)
where
    P: Pacer + ?Sized,
    F: FnMut(usize),
{
    for frame in 0..timings.slot_frames {
        on_frame(frame);
        pacer.pause(timings.slot_frame).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SystemClock;
    use crate::config::LedgerConfig;
    use crate::games::blackjack::{Card, Rank, Seat, Shoe, Suit};
    use crate::ledger::Ledger;
    use crate::profile_store::ProfileStore;
    use crate::rng::SeededRandom;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn ledger_with(balance: u64) -> Ledger {
        let store = ProfileStore::new(Arc::new(MemoryStore::new()), "mini-casino");
        let ledger = Ledger::new(store, Arc::new(SystemClock), &LedgerConfig::default());
        ledger.set_balance("p", balance).unwrap();
        ledger
    }

    fn stacked(ranks: &[Rank], bet: u64) -> BlackjackTable {
        let cards = ranks.iter().map(|r| Card::new(*r, Suit::Clubs)).collect();
        let mut table = BlackjackTable::with_shoe(Shoe::stacked(cards));
        table.slip_mut().set(bet);
        table
    }

    #[tokio::test]
    async fn test_paced_round_pauses_between_transitions() {
        let ledger = ledger_with(1_000);
        let mut rng = SeededRandom::new(1);
        let pacer = InstantPacer::new();
        let timings = RevealTimings::default();
        // dealer 10 + 2 draws 3 then 4; player 10 + 8 stands
        let mut table = stacked(
            &[Rank::Ten, Rank::Ten, Rank::Two, Rank::Eight, Rank::Three, Rank::Four],
            100,
        );

        table.begin_round(&ledger, "p").unwrap();
        let mut seats = Vec::new();
        let phase = play_deal(&mut table, &mut rng, &pacer, &timings, |d| seats.push((d.seat, d.face_down)))
            .await
            .unwrap();
        assert_eq!(phase, Phase::PlayerTurn);
        assert_eq!(
            seats,
            vec![
                (Seat::Dealer, true),
                (Seat::Player, false),
                (Seat::Dealer, false),
                (Seat::Player, false),
            ]
        );

        table.stand().unwrap();
        let mut draws = 0;
        let dealer_value = play_dealer_turn(&mut table, &mut rng, &pacer, &timings, |s| {
            if matches!(s, DealerStep::Drew(_)) {
                draws += 1;
            }
        })
        .await
        .unwrap();
        assert_eq!(dealer_value, 19);
        assert_eq!(draws, 2);

        let outcome = table.settle(&ledger).unwrap();
        assert_eq!(outcome.receipt.payout, 0);

        // 4 deal pauses, flip + wait, 2 x (enter + draw)
        let pauses = pacer.pauses();
        assert_eq!(pauses.len(), 4 + 2 + 4);
        assert_eq!(pacer.total(), Duration::from_millis(4 * 180 + 230 + 120 + 2 * (180 + 80)));
    }

    #[tokio::test]
    async fn test_natural_reveals_without_draws() {
        let ledger = ledger_with(1_000);
        let mut rng = SeededRandom::new(1);
        let pacer = InstantPacer::new();
        let timings = RevealTimings::default();
        let mut table = stacked(&[Rank::Five, Rank::Ace, Rank::Six, Rank::Queen], 100);

        table.begin_round(&ledger, "p").unwrap();
        let phase = play_deal(&mut table, &mut rng, &pacer, &timings, |_| {}).await.unwrap();
        assert_eq!(phase, Phase::DealerTurn);

        let mut steps = Vec::new();
        play_dealer_turn(&mut table, &mut rng, &pacer, &timings, |s| steps.push(*s))
            .await
            .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1], DealerStep::Stood(11));
        assert_eq!(table.settle(&ledger).unwrap().receipt.payout, 250);
    }

    #[tokio::test]
    async fn test_spin_frames() {
        let pacer = InstantPacer::new();
        let mut frames = 0;
        play_spin_frames(&pacer, &RevealTimings::default(), |_| frames += 1).await;
        assert_eq!(frames, 8);
        assert_eq!(pacer.total(), Duration::from_millis(560));
    }

    #[tokio::test]
    async fn test_tokio_pacer_waits() {
        let start = tokio::time::Instant::now();
        TokioPacer.pause(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
