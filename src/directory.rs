//! Profile directory: a capacity-limited registry of known profiles used for
//! listing and the leaderboard.
//!
//! Balances here are a best-effort mirror of the ledger, fed by
//! [`BalanceEvent`]s. Wager decisions never read them.

use crate::common::{BalanceChange, BalanceEvent, Clock};
use crate::errors::DirectoryError;
use crate::ledger::ProfileLocks;
use crate::profile_store::{display_name, normalize_name, DirectoryEntry, DirectoryRecord, ProfileStore};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;

pub struct Directory {
    store: ProfileStore,
    clock: Arc<dyn Clock>,
    default_max_profiles: u32,
    wallet_locks: Arc<ProfileLocks>,
    // serializes read-modify-write of the single directory record
    lock: Mutex<()>,
}

impl Directory {
    pub fn new(store: ProfileStore, clock: Arc<dyn Clock>, default_max_profiles: u32) -> Self {
        Self {
            store,
            clock,
            default_max_profiles: default_max_profiles.max(1),
            wallet_locks: Arc::new(ProfileLocks::new()),
            lock: Mutex::new(()),
        }
    }

    /// Share the ledger's per-profile locks so wallet deletion cannot
    /// interleave with a ledger write
    pub fn with_wallet_locks(mut self, locks: Arc<ProfileLocks>) -> Self {
        self.wallet_locks = locks;
        self
    }

    fn load(&self) -> Result<DirectoryRecord, DirectoryError> {
        Ok(self.store.load_directory()?.unwrap_or_else(|| DirectoryRecord {
            profiles: BTreeMap::new(),
            max_profiles: self.default_max_profiles,
        }))
    }

    fn update<T>(
        &self,
        apply: impl FnOnce(&mut DirectoryRecord) -> Result<(T, bool), DirectoryError>,
    ) -> Result<T, DirectoryError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut record = self.load()?;
        let (value, dirty) = apply(&mut record)?;
        if dirty {
            self.store.save_directory(&record)?;
        }
        Ok(value)
    }

    pub fn create_profile(&self, name: &str, initial_balance: u64) -> Result<DirectoryEntry, DirectoryError> {
        let key = normalize_name(name).ok_or(DirectoryError::InvalidName)?;
        let now = self.clock.now_millis();

        self.update(|record| {
            if record.profiles.contains_key(&key) {
                return Err(DirectoryError::NameTaken(display_name(name)));
            }
            if record.profiles.len() >= record.max_profiles as usize {
                return Err(DirectoryError::DirectoryFull {
                    max: record.max_profiles,
                });
            }

            let entry = DirectoryEntry {
                name: display_name(name),
                balance: initial_balance,
                created_at: now,
                last_claim: 0,
            };
            record.profiles.insert(key.clone(), entry.clone());
            tracing::info!(profile = %key, initial_balance, "Profile created");
            Ok((entry, true))
        })
    }

    /// Remove the entry and the persisted wallet behind it
    pub fn delete_profile(&self, name: &str) -> Result<DirectoryEntry, DirectoryError> {
        let key = normalize_name(name).ok_or(DirectoryError::InvalidName)?;

        let removed = self.update(|record| match record.profiles.remove(&key) {
            Some(entry) => Ok((entry, true)),
            None => Err(DirectoryError::NotFound(display_name(name))),
        })?;
        self.wallet_locks
            .retire(&key, || self.store.delete_profile_state(&key))?;
        tracing::info!(profile = %key, "Profile deleted");
        Ok(removed)
    }

    pub fn get_profile(&self, name: &str) -> Result<Option<DirectoryEntry>, DirectoryError> {
        let Some(key) = normalize_name(name) else {
            return Ok(None);
        };
        Ok(self.load()?.profiles.remove(&key))
    }

    pub fn list_profiles(&self) -> Result<BTreeMap<String, DirectoryEntry>, DirectoryError> {
        Ok(self.load()?.profiles)
    }

    /// Richest first, ties by display name
    pub fn leaderboard(&self) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let mut entries: Vec<DirectoryEntry> = self.load()?.profiles.into_values().collect();
        entries.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// Shift the mirrored balance, clamped at 0. Unknown names are ignored and
    /// yield `None`.
    pub fn change_balance(&self, name: &str, delta: i64) -> Result<Option<u64>, DirectoryError> {
        let Some(key) = normalize_name(name) else {
            return Ok(None);
        };
        self.update(|record| match record.profiles.get_mut(&key) {
            Some(entry) => {
                entry.balance = if delta >= 0 {
                    entry.balance.saturating_add(delta as u64)
                } else {
                    entry.balance.saturating_sub(delta.unsigned_abs())
                };
                Ok((Some(entry.balance), true))
            }
            None => Ok((None, false)),
        })
    }

    pub fn get_max_profiles(&self) -> Result<u32, DirectoryError> {
        Ok(self.load()?.max_profiles)
    }

    /// Lowering below the current count keeps existing entries but blocks new ones
    pub fn set_max_profiles(&self, max: u32) -> Result<(), DirectoryError> {
        if max == 0 {
            return Err(DirectoryError::InvalidCapacity);
        }
        self.update(|record| {
            record.max_profiles = max;
            Ok(((), true))
        })
    }

    /// Mirror one ledger event. Profiles the directory does not know are skipped.
    pub fn apply_event(&self, event: &BalanceEvent) -> Result<(), DirectoryError> {
        self.update(|record| match record.profiles.get_mut(&event.profile) {
            Some(entry) => {
                entry.balance = event.balance;
                if event.change == BalanceChange::DailyClaimed {
                    entry.last_claim = event.at;
                }
                Ok(((), true))
            }
            None => Ok(((), false)),
        })
    }

    /// Apply whatever is queued on `events` without waiting. Returns the number
    /// of events applied.
    pub fn sync_pending(&self, events: &mut broadcast::Receiver<BalanceEvent>) -> usize {
        let mut applied = 0;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.mirror(&event);
                    applied += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Directory mirror lagged; skipped {} balance events", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }

    /// Keep the directory in step with the ledger from a background task
    pub fn spawn_mirror(self: Arc<Self>, mut events: broadcast::Receiver<BalanceEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.mirror(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Directory mirror lagged; skipped {} balance events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn mirror(&self, event: &BalanceEvent) {
        if let Err(e) = self.apply_event(event) {
            tracing::warn!(profile = %event.profile, error = %e, "Failed to mirror balance event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ManualClock;
    use crate::config::LedgerConfig;
    use crate::ledger::Ledger;
    use crate::storage::{KvStore, MemoryStore};
    use chrono::{TimeZone, Utc};

    fn directory() -> (Arc<MemoryStore>, Directory) {
        let kv = Arc::new(MemoryStore::new());
        let store = ProfileStore::new(kv.clone(), "mini-casino");
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
        (kv, Directory::new(store, clock, 5))
    }

    fn event(profile: &str, change: BalanceChange, balance: u64, at: i64) -> BalanceEvent {
        BalanceEvent {
            profile: profile.to_string(),
            change,
            delta: 0,
            balance,
            at,
        }
    }

    #[test]
    fn test_create_and_list() {
        let (_, dir) = directory();
        let entry = dir.create_profile("  Anna ", 10_000).unwrap();
        assert_eq!(entry.name, "Anna");
        assert_eq!(entry.balance, 10_000);
        assert_eq!(entry.last_claim, 0);
        assert_eq!(entry.created_at, Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap().timestamp_millis());

        let listed = dir.list_profiles().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed["anna"].name, "Anna");
    }

    #[test]
    fn test_name_taken_is_case_insensitive() {
        let (_, dir) = directory();
        dir.create_profile("Anna", 0).unwrap();
        assert!(matches!(dir.create_profile("ANNA", 0), Err(DirectoryError::NameTaken(_))));
        assert!(matches!(dir.create_profile(" ", 0), Err(DirectoryError::InvalidName)));
    }

    #[test]
    fn test_directory_full_at_capacity() {
        let (_, dir) = directory();
        for name in ["a", "b", "c", "d", "e"] {
            dir.create_profile(name, 10_000).unwrap();
        }
        assert!(matches!(
            dir.create_profile("f", 10_000),
            Err(DirectoryError::DirectoryFull { max: 5 })
        ));
        assert_eq!(dir.list_profiles().unwrap().len(), 5);
    }

    #[test]
    fn test_max_profiles_adjustable() {
        let (_, dir) = directory();
        assert_eq!(dir.get_max_profiles().unwrap(), 5);
        assert!(matches!(dir.set_max_profiles(0), Err(DirectoryError::InvalidCapacity)));

        dir.create_profile("a", 0).unwrap();
        dir.create_profile("b", 0).unwrap();
        dir.set_max_profiles(1).unwrap();
        assert_eq!(dir.list_profiles().unwrap().len(), 2);
        assert!(matches!(dir.create_profile("c", 0), Err(DirectoryError::DirectoryFull { max: 1 })));

        dir.set_max_profiles(3).unwrap();
        dir.create_profile("c", 0).unwrap();
    }

    #[test]
    fn test_delete_removes_wallet_record() {
        let (kv, dir) = directory();
        dir.create_profile("Anna", 10).unwrap();
        kv.put("mini-casino:anna:state", br#"{"balance":10,"lastClaimDate":null}"#)
            .unwrap();

        let removed = dir.delete_profile("anna").unwrap();
        assert_eq!(removed.name, "Anna");
        assert!(kv.get("mini-casino:anna:state").unwrap().is_none());
        assert!(dir.get_profile("Anna").unwrap().is_none());
        assert!(matches!(dir.delete_profile("anna"), Err(DirectoryError::NotFound(_))));
    }

    #[test]
    fn test_delete_retires_shared_wallet_lock() {
        let kv = Arc::new(MemoryStore::new());
        let store = ProfileStore::new(kv.clone(), "mini-casino");
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
        let ledger = Ledger::new(store.clone(), clock.clone(), &LedgerConfig::default());
        let dir = Directory::new(store, clock, 5).with_wallet_locks(ledger.locks());

        dir.create_profile("Anna", 0).unwrap();
        ledger.set_balance("anna", 300u64).unwrap();
        ledger.set_balance("bela", 10u64).unwrap();
        assert_eq!(ledger.locks().len(), 2);

        dir.delete_profile("Anna").unwrap();
        assert_eq!(ledger.locks().len(), 1);
        assert!(kv.get("mini-casino:anna:state").unwrap().is_none());
        assert_eq!(ledger.get_balance("bela").unwrap(), 10);
    }

    #[test]
    fn test_change_balance_clamps_and_ignores_unknown() {
        let (_, dir) = directory();
        dir.create_profile("Anna", 100).unwrap();

        assert_eq!(dir.change_balance("anna", 50).unwrap(), Some(150));
        assert_eq!(dir.change_balance("anna", -500).unwrap(), Some(0));
        assert_eq!(dir.change_balance("nobody", 10).unwrap(), None);
    }

    #[test]
    fn test_leaderboard_order() {
        let (_, dir) = directory();
        dir.create_profile("Cleo", 500).unwrap();
        dir.create_profile("anna", 900).unwrap();
        dir.create_profile("Bob", 500).unwrap();

        let names: Vec<String> = dir.leaderboard().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["anna", "Bob", "Cleo"]);
    }

    #[test]
    fn test_apply_event_mirrors_balance_and_claim() {
        let (_, dir) = directory();
        dir.create_profile("Anna", 100).unwrap();

        dir.apply_event(&event("anna", BalanceChange::BetPlaced, 40, 1)).unwrap();
        assert_eq!(dir.get_profile("anna").unwrap().unwrap().balance, 40);

        dir.apply_event(&event("anna", BalanceChange::DailyClaimed, 10_040, 777)).unwrap();
        let entry = dir.get_profile("anna").unwrap().unwrap();
        assert_eq!(entry.balance, 10_040);
        assert_eq!(entry.last_claim, 777);

        // unknown profiles are not added
        dir.apply_event(&event("ghost", BalanceChange::PaidOut, 5, 1)).unwrap();
        assert!(dir.get_profile("ghost").unwrap().is_none());
    }

    #[test]
    fn test_sync_pending_drains_queue() {
        let (_, dir) = directory();
        dir.create_profile("Anna", 100).unwrap();
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(event("anna", BalanceChange::BetPlaced, 90, 1)).unwrap();
        tx.send(event("anna", BalanceChange::PaidOut, 120, 2)).unwrap();

        assert_eq!(dir.sync_pending(&mut rx), 2);
        assert_eq!(dir.get_profile("anna").unwrap().unwrap().balance, 120);
        assert_eq!(dir.sync_pending(&mut rx), 0);
    }

    #[tokio::test]
    async fn test_spawned_mirror_follows_events() {
        let (_, dir) = directory();
        let dir = Arc::new(dir);
        dir.create_profile("Anna", 100).unwrap();

        let (tx, rx) = broadcast::channel(8);
        let handle = dir.clone().spawn_mirror(rx);
        tx.send(event("anna", BalanceChange::PaidOut, 4_200, 3)).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(dir.get_profile("anna").unwrap().unwrap().balance, 4_200);
    }
}
