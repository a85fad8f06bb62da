//! Profile ledger: the only component allowed to move tokens.
//!
//! Every operation normalizes the profile name, lazily creates a zero-balance
//! wallet when none exists, and runs its load-mutate-save cycle under a
//! per-profile lock so concurrent callers sharing one `Ledger` cannot lose
//! updates. After each persisted mutation a [`BalanceEvent`] is broadcast.

use crate::common::{BalanceChange, BalanceEvent, Clock};
use crate::config::LedgerConfig;
use crate::errors::LedgerError;
use crate::profile_store::{normalize_name, ProfileState, ProfileStore};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Conversion of a credit amount to whole tokens: negatives and non-finite
/// values become 0, fractions are truncated toward zero.
pub trait IntoTokens {
    fn into_tokens(self) -> u64;
}

impl IntoTokens for u64 {
    fn into_tokens(self) -> u64 {
        self
    }
}

impl IntoTokens for u32 {
    fn into_tokens(self) -> u64 {
        self as u64
    }
}

impl IntoTokens for i64 {
    fn into_tokens(self) -> u64 {
        self.max(0) as u64
    }
}

impl IntoTokens for f64 {
    fn into_tokens(self) -> u64 {
        if self.is_finite() && self > 0.0 {
            self.floor() as u64
        } else {
            0
        }
    }
}

/// Per-profile mutexes shared by every component that writes a wallet record.
///
/// Entries can be retired when a profile is deleted. A caller that was waiting
/// on a retired mutex notices after acquiring it and retries on a fresh one.
#[derive(Debug, Default)]
pub struct ProfileLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ProfileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Run `f` while holding the profile's mutex
    pub fn with_lock<T>(&self, profile: &str, f: impl FnOnce() -> T) -> T {
        loop {
            let lock = self.entry(profile);
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            if !self.is_current(profile, &lock) {
                continue;
            }
            return f();
        }
    }

    /// Like [`with_lock`](Self::with_lock), then drop the profile's entry
    /// before releasing it
    pub fn retire<T>(&self, profile: &str, f: impl FnOnce() -> T) -> T {
        loop {
            let lock = self.entry(profile);
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            if !self.is_current(profile, &lock) {
                continue;
            }
            let value = f();
            self.locks.remove(profile);
            return value;
        }
    }

    fn entry(&self, profile: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(profile.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn is_current(&self, profile: &str, lock: &Arc<Mutex<()>>) -> bool {
        self.locks
            .get(profile)
            .map(|current| Arc::ptr_eq(current.value(), lock))
            .unwrap_or(false)
    }
}

/// Settled round, for the informational win/loss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundResult {
    Won,
    Lost,
    Push,
}

pub struct Ledger {
    store: ProfileStore,
    clock: Arc<dyn Clock>,
    daily_amount: u64,
    locks: Arc<ProfileLocks>,
    events: broadcast::Sender<BalanceEvent>,
}

impl Ledger {
    pub fn new(store: ProfileStore, clock: Arc<dyn Clock>, config: &LedgerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            clock,
            daily_amount: config.daily_amount,
            locks: Arc::new(ProfileLocks::new()),
            events,
        }
    }

    /// Receive every balance mutation from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BalanceEvent> {
        self.events.subscribe()
    }

    /// Lock table to share with anything else that writes wallet records
    pub fn locks(&self) -> Arc<ProfileLocks> {
        self.locks.clone()
    }

    pub fn daily_amount(&self) -> u64 {
        self.daily_amount
    }

    /// Load the wallet, creating `{balance: 0}` if absent. Idempotent.
    pub fn init_profile(&self, name: &str) -> Result<ProfileState, LedgerError> {
        self.with_profile(name, |_, state| Ok((state.clone(), None)))
    }

    /// Load the wallet, creating it with `starting_balance` if absent. An
    /// existing wallet is returned untouched.
    pub fn open_wallet(&self, name: &str, starting_balance: u64) -> Result<ProfileState, LedgerError> {
        let fresh = ProfileState {
            balance: starting_balance,
            ..ProfileState::default()
        };
        self.with_profile_from(name, fresh, |_, state| Ok((state.clone(), None)))
    }

    /// Full wallet record, balance plus claim date and round stats
    pub fn profile_state(&self, name: &str) -> Result<ProfileState, LedgerError> {
        self.init_profile(name)
    }

    pub fn get_balance(&self, name: &str) -> Result<u64, LedgerError> {
        Ok(self.init_profile(name)?.balance)
    }

    /// Administrative override: balance becomes `max(0, floor(value))`
    pub fn set_balance<A: IntoTokens>(&self, name: &str, value: A) -> Result<u64, LedgerError> {
        let value = value.into_tokens();
        self.with_profile(name, |_, state| {
            let delta = value as i64 - state.balance as i64;
            state.balance = value;
            Ok((value, Some((BalanceChange::Adjusted, delta))))
        })
    }

    /// Debit a stake. Every wager goes through here before its outcome is drawn.
    pub fn place_bet(&self, name: &str, amount: i64) -> Result<u64, LedgerError> {
        self.with_profile(name, |profile, state| {
            if amount <= 0 {
                return Err(LedgerError::InvalidAmount { amount });
            }
            let requested = amount as u64;
            if state.balance < requested {
                return Err(LedgerError::InsufficientFunds {
                    balance: state.balance,
                    requested,
                });
            }

            state.balance -= requested;
            tracing::debug!(profile, amount, balance = state.balance, "Bet placed");
            Ok((state.balance, Some((BalanceChange::BetPlaced, -amount))))
        })
    }

    /// Credit a win, floored to whole tokens. Never refused on money grounds.
    pub fn payout<A: IntoTokens>(&self, name: &str, amount: A) -> Result<u64, LedgerError> {
        let credit = amount.into_tokens();
        self.with_profile(name, |profile, state| {
            state.balance = state.balance.saturating_add(credit);
            tracing::debug!(profile, credit, balance = state.balance, "Payout credited");
            Ok((state.balance, Some((BalanceChange::PaidOut, credit as i64))))
        })
    }

    /// Calendar-day gate: false once a claim was stamped with today's UTC date
    pub fn can_claim_today(&self, name: &str) -> Result<bool, LedgerError> {
        let today = self.clock.today();
        Ok(self.init_profile(name)?.last_claim_date != Some(today))
    }

    pub fn claim_daily(&self, name: &str) -> Result<u64, LedgerError> {
        self.claim_daily_amount(name, self.daily_amount)
    }

    pub fn claim_daily_amount(&self, name: &str, amount: u64) -> Result<u64, LedgerError> {
        let today = self.clock.today();
        self.with_profile(name, |profile, state| {
            if state.last_claim_date == Some(today) {
                return Err(LedgerError::AlreadyClaimed {
                    balance: state.balance,
                });
            }

            state.balance = state.balance.saturating_add(amount);
            state.last_claim_date = Some(today);
            tracing::info!(profile, amount, balance = state.balance, %today, "Daily bonus claimed");
            Ok((state.balance, Some((BalanceChange::DailyClaimed, amount as i64))))
        })
    }

    /// Bump the win/loss counters; a push changes nothing
    pub fn record_round(&self, name: &str, result: RoundResult) -> Result<(), LedgerError> {
        if result == RoundResult::Push {
            return Ok(());
        }
        self.with_profile(name, |_, state| {
            match result {
                RoundResult::Won => state.stats.wins += 1,
                RoundResult::Lost => state.stats.losses += 1,
                RoundResult::Push => {}
            }
            Ok(((), Some((BalanceChange::Adjusted, 0))))
        })
    }

    fn with_profile<T, F>(&self, name: &str, apply: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&str, &mut ProfileState) -> Result<(T, Option<(BalanceChange, i64)>), LedgerError>,
    {
        self.with_profile_from(name, ProfileState::default(), apply)
    }

    /// Run one locked load-mutate-save cycle, starting from `fresh` when the
    /// wallet does not exist yet.
    ///
    /// `apply` returns the value to hand back and, when the state changed, the
    /// kind of change with its signed delta. Nothing is written when `apply`
    /// fails or reports no change.
    fn with_profile_from<T, F>(&self, name: &str, fresh: ProfileState, apply: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&str, &mut ProfileState) -> Result<(T, Option<(BalanceChange, i64)>), LedgerError>,
    {
        let profile = normalize_name(name).ok_or(LedgerError::InvalidName)?;
        self.locks.with_lock(&profile, || -> Result<T, LedgerError> {
            let mut state = match self.store.load_profile_state(&profile)? {
                Some(state) => state,
                None => {
                    self.store.save_profile_state(&profile, &fresh)?;
                    tracing::info!(profile = %profile, balance = fresh.balance, "Initialized profile");
                    self.publish(&profile, BalanceChange::Initialized, fresh.balance as i64, fresh.balance);
                    fresh
                }
            };

            let (value, change) = apply(&profile, &mut state)?;
            if let Some((kind, delta)) = change {
                self.store.save_profile_state(&profile, &state)?;
                if kind != BalanceChange::Adjusted || delta != 0 {
                    self.publish(&profile, kind, delta, state.balance);
                }
            }
            Ok(value)
        })
    }

    fn publish(&self, profile: &str, change: BalanceChange, delta: i64, balance: u64) {
        // No subscribers is fine.
        let _ = self.events.send(BalanceEvent {
            profile: profile.to_string(),
            change,
            delta,
            balance,
            at: self.clock.now_millis(),
        });
    }
}
