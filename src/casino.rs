//! Session facade: one ledger, one directory, the selected profile and a game
//! controller per engine.
//!
//! Front ends talk to [`Casino`] only. Every wager runs through the ledger;
//! the directory is brought up to date from the ledger's event stream after
//! each call that moved money.

use crate::common::{BalanceEvent, Clock, SystemClock};
use crate::config::CasinoConfig;
use crate::directory::Directory;
use crate::errors::{CasinoError, CasinoResult, LedgerError};
use crate::games::blackjack::{BlackjackOutcome, BlackjackTable, Card, DealerStep, DealtCard, Phase};
use crate::games::pacing::{play_dealer_turn, play_deal, Pacer, RevealTimings};
use crate::games::roulette::{RouletteBet, RouletteOutcome, RouletteTable};
use crate::games::slots::{AutospinReport, BonusRules, SlotMachine, SpinOutcome};
use crate::ledger::Ledger;
use crate::profile_store::{normalize_name, DirectoryEntry, ProfileState, ProfileStore};
use crate::rng::{OsRandom, RandomSource};
use crate::storage::{open_store, KvStore};
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct Casino {
    config: CasinoConfig,
    ledger: Arc<Ledger>,
    directory: Arc<Directory>,
    events: broadcast::Receiver<BalanceEvent>,
    current: Option<String>,
    rng: Box<dyn RandomSource>,
    slots: SlotMachine,
    bonus_slots: SlotMachine,
    roulette: RouletteTable,
    blackjack: BlackjackTable,
}

impl Casino {
    /// Open the configured store with the system clock and OS entropy
    pub fn open(config: CasinoConfig) -> CasinoResult<Self> {
        config.validate()?;
        let kv = open_store(&config.storage)?;
        Self::with_store(config, kv, Arc::new(SystemClock))
    }

    pub fn with_store(config: CasinoConfig, kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> CasinoResult<Self> {
        config.validate()?;
        let store = ProfileStore::new(kv, config.storage.namespace.clone());
        let ledger = Arc::new(Ledger::new(store.clone(), clock.clone(), &config.ledger));
        let directory = Arc::new(
            Directory::new(store, clock, config.directory.max_profiles).with_wallet_locks(ledger.locks()),
        );
        let events = ledger.subscribe();

        let mut rng: Box<dyn RandomSource> = Box::new(OsRandom);
        let blackjack = Self::new_table(&config, rng.as_mut());
        let min_line_bet = config.games.slots_min_line_bet;

        tracing::info!(
            namespace = %config.storage.namespace,
            backend = ?config.storage.backend,
            "Casino session opened"
        );

        Ok(Self {
            config,
            ledger,
            directory,
            events,
            current: None,
            rng,
            slots: SlotMachine::new(min_line_bet),
            bonus_slots: SlotMachine::new(min_line_bet).with_bonus(BonusRules::default()),
            roulette: RouletteTable::new(),
            blackjack,
        })
    }

    /// Replace the random source used for every later draw
    pub fn with_rng<R: RandomSource + 'static>(mut self, rng: R) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Swap in a prepared blackjack table, e.g. one with a stacked shoe
    pub fn with_blackjack_table(mut self, table: BlackjackTable) -> Self {
        self.blackjack = table;
        self
    }

    fn new_table(config: &CasinoConfig, rng: &mut dyn RandomSource) -> BlackjackTable {
        BlackjackTable::new(
            config.games.blackjack_decks,
            config.games.blackjack_reshuffle_threshold,
            rng,
        )
    }

    pub fn config(&self) -> &CasinoConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    // --- Profiles ---

    /// Make `name` the session's profile, creating its wallet if needed
    pub fn select_profile(&mut self, name: &str) -> CasinoResult<ProfileState> {
        let state = self.ledger.init_profile(name)?;
        let key = normalize_name(name).ok_or(LedgerError::InvalidName)?;
        tracing::info!(profile = %key, balance = state.balance, "Profile selected");
        self.current = Some(key);
        self.sync_directory();
        Ok(state)
    }

    pub fn current_profile(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn clear_profile(&mut self) {
        self.current = None;
    }

    /// Register a profile. A new wallet gets the starting balance; one that
    /// already exists keeps its own.
    pub fn create_profile(&mut self, name: &str) -> CasinoResult<DirectoryEntry> {
        self.sync_directory();
        let starting = self.config.ledger.starting_balance;
        let entry = self.directory.create_profile(name, starting)?;
        let wallet = self.ledger.open_wallet(name, starting)?;
        if wallet.balance != entry.balance {
            self.directory
                .change_balance(name, wallet.balance as i64 - entry.balance as i64)?;
        }
        self.sync_directory();
        Ok(DirectoryEntry {
            balance: wallet.balance,
            ..entry
        })
    }

    pub fn delete_profile(&mut self, name: &str) -> CasinoResult<DirectoryEntry> {
        self.sync_directory();
        let removed = self.directory.delete_profile(name)?;
        if self.current.is_some() && self.current == normalize_name(name) {
            self.current = None;
        }
        Ok(removed)
    }

    pub fn list_profiles(&mut self) -> CasinoResult<Vec<DirectoryEntry>> {
        self.sync_directory();
        Ok(self.directory.list_profiles()?.into_values().collect())
    }

    pub fn leaderboard(&mut self) -> CasinoResult<Vec<DirectoryEntry>> {
        self.sync_directory();
        Ok(self.directory.leaderboard()?)
    }

    /// Apply queued ledger events to the directory
    pub fn sync_directory(&mut self) -> usize {
        self.directory.sync_pending(&mut self.events)
    }

    /// Overwrite every mirrored balance with the ledger's. Returns how many
    /// entries were out of date.
    pub fn reconcile_directory(&mut self) -> CasinoResult<usize> {
        self.sync_directory();
        let mut corrected = 0;
        for (key, entry) in self.directory.list_profiles()? {
            let actual = self.ledger.get_balance(&key)?;
            if actual != entry.balance {
                self.directory
                    .change_balance(&key, actual as i64 - entry.balance as i64)?;
                corrected += 1;
            }
        }
        // the reads above may have lazily initialized wallets
        self.sync_directory();
        if corrected > 0 {
            tracing::info!(corrected, "Directory reconciled with ledger");
        }
        Ok(corrected)
    }

    // --- Wallet ---

    fn profile(&self) -> CasinoResult<String> {
        self.current.clone().ok_or(CasinoError::NoActiveProfile)
    }

    pub fn balance(&self) -> CasinoResult<u64> {
        let profile = self.profile()?;
        Ok(self.ledger.get_balance(&profile)?)
    }

    pub fn can_claim_today(&self) -> CasinoResult<bool> {
        let profile = self.profile()?;
        Ok(self.ledger.can_claim_today(&profile)?)
    }

    pub fn claim_daily(&mut self) -> CasinoResult<u64> {
        let profile = self.profile()?;
        let balance = self.ledger.claim_daily(&profile)?;
        self.sync_directory();
        Ok(balance)
    }

    // --- Games ---

    pub fn play_slots(&mut self, bet_per_line: u64, lines: u32) -> CasinoResult<SpinOutcome> {
        let profile = self.profile()?;
        let outcome = self
            .slots
            .spin(&self.ledger, &profile, bet_per_line, lines, self.rng.as_mut())?;
        self.sync_directory();
        Ok(outcome)
    }

    /// Slots with the scatter symbol and free spins
    pub fn play_bonus_slots(&mut self, bet_per_line: u64, lines: u32) -> CasinoResult<SpinOutcome> {
        let profile = self.profile()?;
        let outcome = self
            .bonus_slots
            .spin(&self.ledger, &profile, bet_per_line, lines, self.rng.as_mut())?;
        self.sync_directory();
        Ok(outcome)
    }

    pub fn autospin(&mut self, bet_per_line: u64, lines: u32, count: u32, bonus: bool) -> CasinoResult<AutospinReport> {
        let profile = self.profile()?;
        let machine = if bonus { &mut self.bonus_slots } else { &mut self.slots };
        let report = machine.autospin(&self.ledger, &profile, bet_per_line, lines, count, self.rng.as_mut())?;
        self.sync_directory();
        Ok(report)
    }

    pub fn play_roulette(&mut self, bet: RouletteBet, stake: i64) -> CasinoResult<RouletteOutcome> {
        let profile = self.profile()?;
        let outcome = self
            .roulette
            .spin(&self.ledger, &profile, bet, stake, self.rng.as_mut())?;
        self.sync_directory();
        Ok(outcome)
    }

    pub fn blackjack(&self) -> &BlackjackTable {
        &self.blackjack
    }

    pub fn add_chip(&mut self, value: u64) -> u64 {
        self.blackjack.slip_mut().add_chip(value)
    }

    pub fn select_chip(&mut self, value: u64) {
        self.blackjack.slip_mut().select_chip(value);
    }

    pub fn clear_bet(&mut self) {
        self.blackjack.slip_mut().clear();
    }

    /// Debit the slip and deal the opening cards at once
    pub fn deal(&mut self) -> CasinoResult<Phase> {
        let profile = self.profile()?;
        let phase = self.blackjack.deal(&self.ledger, &profile, self.rng.as_mut())?;
        self.sync_directory();
        Ok(phase)
    }

    pub fn hit(&mut self) -> CasinoResult<Card> {
        Ok(self.blackjack.hit(self.rng.as_mut())?)
    }

    pub fn stand(&mut self) -> CasinoResult<()> {
        Ok(self.blackjack.stand()?)
    }

    pub fn double(&mut self) -> CasinoResult<Card> {
        let card = self.blackjack.double(&self.ledger, self.rng.as_mut())?;
        self.sync_directory();
        Ok(card)
    }

    /// Play out the dealer without pauses and settle the round
    pub fn finish_blackjack(&mut self) -> CasinoResult<BlackjackOutcome> {
        let outcome = self.blackjack.finish(&self.ledger, self.rng.as_mut())?;
        self.sync_directory();
        Ok(outcome)
    }

    /// Debit the slip and deal the opening cards with pauses between them
    pub async fn deal_paced<P, F>(&mut self, pacer: &P, timings: &RevealTimings, on_card: F) -> CasinoResult<Phase>
    where
        P: Pacer + ?Sized,
        F: FnMut(&DealtCard),
    {
        let profile = self.profile()?;
        self.blackjack.begin_round(&self.ledger, &profile)?;
        self.sync_directory();
        Ok(play_deal(&mut self.blackjack, self.rng.as_mut(), pacer, timings, on_card).await?)
    }

    /// Run the dealer's turn with pauses, then settle the round
    pub async fn finish_paced<P, F>(
        &mut self,
        pacer: &P,
        timings: &RevealTimings,
        on_step: F,
    ) -> CasinoResult<BlackjackOutcome>
    where
        P: Pacer + ?Sized,
        F: FnMut(&DealerStep),
    {
        play_dealer_turn(&mut self.blackjack, self.rng.as_mut(), pacer, timings, on_step).await?;
        let outcome = self.blackjack.settle(&self.ledger)?;
        self.sync_directory();
        Ok(outcome)
    }
}
