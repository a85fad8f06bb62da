//! Wallet and directory state must survive closing and reopening the RocksDB store

use chrono::{TimeZone, Utc};
use mini_casino::{
    config::{CasinoConfig, StorageBackend},
    games::{blackjack::{BlackjackTable, Card, Rank, Shoe, Suit}, RouletteBet},
    Casino, CasinoError, Clock, KvStore, LedgerError, ManualClock, RocksStore, ScriptedRandom,
};
use std::sync::Arc;
use tempfile::TempDir;

fn rocks_config(dir: &TempDir) -> CasinoConfig {
    let mut config = CasinoConfig::production();
    config.storage.backend = StorageBackend::RocksDb;
    config.storage.data_directory = dir.path().join("db").to_string_lossy().into_owned();
    config
}

fn open(config: &CasinoConfig, clock: Arc<ManualClock>) -> Casino {
    let kv: Arc<dyn KvStore> =
        Arc::new(RocksStore::open(&config.storage.data_directory).expect("Failed to open RocksDB"));
    Casino::with_store(config.clone(), kv, clock).expect("Failed to open casino")
}

#[test]
fn test_wallet_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = rocks_config(&dir);
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 20, 18, 30, 0).unwrap()));

    // === PHASE 1: create, claim and wager ===
    {
        let mut casino = open(&config, clock.clone()).with_rng(ScriptedRandom::new([17]));
        casino.create_profile("Anna").unwrap();
        casino.select_profile("Anna").unwrap();
        assert_eq!(casino.claim_daily().unwrap(), 20_000);

        let outcome = casino.play_roulette(RouletteBet::Straight(17), 50).unwrap();
        assert_eq!(outcome.receipt.payout, 1_800);
        assert_eq!(casino.balance().unwrap(), 21_750);
    }

    // === PHASE 2: reopen and verify ===
    let mut casino = open(&config, clock.clone());
    casino.select_profile("ANNA").unwrap();
    assert_eq!(casino.balance().unwrap(), 21_750);
    assert!(!casino.can_claim_today().unwrap());
    assert!(matches!(
        casino.claim_daily(),
        Err(CasinoError::Ledger(LedgerError::AlreadyClaimed { balance: 21_750 }))
    ));

    let state = casino.ledger().init_profile("anna").unwrap();
    assert_eq!(state.last_claim_date, Some(clock.today()));
    assert_eq!(state.stats.wins, 1);

    let board = casino.leaderboard().unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].name, "Anna");
    assert_eq!(board[0].balance, 21_750);
    assert_eq!(board[0].last_claim, clock.now_millis());

    // next calendar day the claim opens again
    clock.advance(chrono::Duration::hours(6));
    assert_eq!(casino.claim_daily().unwrap(), 31_750);
}

#[test]
fn test_persisted_record_layout() {
    let dir = TempDir::new().unwrap();
    let config = rocks_config(&dir);
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 20, 8, 0, 0).unwrap()));

    {
        let mut casino = open(&config, clock.clone());
        casino.select_profile("Bela").unwrap();
        casino.ledger().set_balance("bela", 1_000u64).unwrap();
        casino.ledger().place_bet("bela", 100).unwrap();
        casino.ledger().payout("bela", 200u64).unwrap();
        casino.claim_daily().unwrap();
    }

    let kv = RocksStore::open(&config.storage.data_directory).unwrap();
    let raw = kv.get("mini-casino:bela:state").unwrap().expect("record should exist");
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(json["balance"], 11_100);
    assert_eq!(json["lastClaimDate"], "2024-05-20");
}

#[test]
fn test_directory_capacity_persists() {
    let dir = TempDir::new().unwrap();
    let config = rocks_config(&dir);
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));

    {
        let mut casino = open(&config, clock.clone());
        for name in ["a", "b", "c"] {
            casino.create_profile(name).unwrap();
        }
        casino.directory().set_max_profiles(3).unwrap();
    }

    let mut casino = open(&config, clock);
    assert_eq!(casino.directory().get_max_profiles().unwrap(), 3);
    assert_eq!(casino.list_profiles().unwrap().len(), 3);
    assert!(casino.create_profile("d").is_err());

    casino.delete_profile("b").unwrap();
    assert_eq!(casino.ledger().get_balance("b").unwrap(), 0);
    casino.create_profile("d").unwrap();
}

#[test]
fn test_blackjack_natural_settles_into_store() {
    let dir = TempDir::new().unwrap();
    let config = rocks_config(&dir);
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()));

    {
        let cards = [Rank::Nine, Rank::Ace, Rank::Seven, Rank::Queen]
            .iter()
            .map(|r| Card::new(*r, Suit::Diamonds))
            .collect();
        let mut casino = open(&config, clock.clone())
            .with_blackjack_table(BlackjackTable::with_shoe(Shoe::stacked(cards)));
        casino.create_profile("Cili").unwrap();
        casino.select_profile("Cili").unwrap();
        casino.add_chip(101);
        casino.deal().unwrap();
        let outcome = casino.finish_blackjack().unwrap();
        assert_eq!(outcome.receipt.payout, 252);
    }

    let mut casino = open(&config, clock);
    casino.select_profile("cili").unwrap();
    assert_eq!(casino.balance().unwrap(), 10_000 - 101 + 252);
}

#[test]
fn test_concurrent_sessions_share_one_ledger() {
    let dir = TempDir::new().unwrap();
    let config = rocks_config(&dir);
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()));
    let casino = open(&config, clock);
    let ledger = casino.ledger().clone();
    ledger.set_balance("p", 1_000u64).unwrap();

    let accepted: usize = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = ledger.clone();
                s.spawn(move || (0..50).filter(|_| ledger.place_bet("p", 7).is_ok()).count())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    // 1000 / 7 = 142 bets fit
    assert_eq!(accepted, 142);
    assert_eq!(ledger.get_balance("p").unwrap(), 1_000 - 142 * 7);
}
