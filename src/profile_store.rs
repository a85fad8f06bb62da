//! Persisted profile and directory records.
//!
//! Records are JSON documents under namespaced text keys:
//! `<namespace>:<profile>:state` for a wallet and `<namespace>:profiles` for
//! the directory. Reads fail soft: an undecodable record is logged and
//! reported as absent so the caller re-initializes it.

use crate::errors::StorageError;
use crate::storage::KvStore;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub wins: u64,
    pub losses: u64,
}

/// Wallet record of a single profile
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileState {
    pub balance: u64,
    pub last_claim_date: Option<NaiveDate>,
    #[serde(default)]
    pub stats: ProfileStats,
}

/// One row of the profile directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    /// Display name, original casing
    pub name: String,
    pub balance: u64,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds of the last daily claim, 0 if never
    pub last_claim: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRecord {
    #[serde(default)]
    pub profiles: BTreeMap<String, DirectoryEntry>,
    pub max_profiles: u32,
}

/// Lookup key of a profile: trimmed, whitespace runs collapsed, lowercased.
/// `None` when nothing is left.
pub fn normalize_name(name: &str) -> Option<String> {
    let normalized = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Display form: trimmed with single spaces, casing kept
pub fn display_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Clone)]
pub struct ProfileStore {
    kv: Arc<dyn KvStore>,
    namespace: String,
}

impl ProfileStore {
    pub fn new(kv: Arc<dyn KvStore>, namespace: impl Into<String>) -> Self {
        Self {
            kv,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn profile_key(&self, profile: &str) -> String {
        format!("{}:{}:state", self.namespace, profile)
    }

    fn directory_key(&self) -> String {
        format!("{}:profiles", self.namespace)
    }

    /// `profile` must already be normalized
    pub fn load_profile_state(&self, profile: &str) -> Result<Option<ProfileState>, StorageError> {
        self.load_json(&self.profile_key(profile))
    }

    pub fn save_profile_state(&self, profile: &str, state: &ProfileState) -> Result<(), StorageError> {
        self.save_json(&self.profile_key(profile), state)
    }

    pub fn delete_profile_state(&self, profile: &str) -> Result<(), StorageError> {
        self.kv.delete(&self.profile_key(profile))
    }

    pub fn load_directory(&self) -> Result<Option<DirectoryRecord>, StorageError> {
        self.load_json(&self.directory_key())
    }

    pub fn save_directory(&self, record: &DirectoryRecord) -> Result<(), StorageError> {
        self.save_json(&self.directory_key(), record)
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(bytes) = self.kv.get(key)? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                let corrupt = StorageError::CorruptedData {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!(error = %corrupt, "Discarding unreadable record");
                Ok(None)
            }
        }
    }

    fn save_json<T: Serialize>(&self, key: &str, record: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| StorageError::WriteFailed(format!("Failed to encode {}: {}", key, e)))?;
        self.kv.put(key, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (Arc<MemoryStore>, ProfileStore) {
        let kv = Arc::new(MemoryStore::new());
        (kv.clone(), ProfileStore::new(kv, "mini-casino"))
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Anna  ").as_deref(), Some("anna"));
        assert_eq!(normalize_name("Big\t  Lebowski").as_deref(), Some("big lebowski"));
        assert_eq!(normalize_name("   "), None);
        assert_eq!(display_name("  Big   Lebowski "), "Big Lebowski");
    }

    #[test]
    fn test_profile_round_trip() {
        let (_, store) = store();
        let state = ProfileState {
            balance: 1_234,
            last_claim_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            stats: ProfileStats { wins: 3, losses: 7 },
        };

        store.save_profile_state("anna", &state).unwrap();
        assert_eq!(store.load_profile_state("anna").unwrap(), Some(state));
        assert_eq!(store.load_profile_state("bob").unwrap(), None);
    }

    #[test]
    fn test_wire_format() {
        let (kv, store) = store();
        store
            .save_profile_state(
                "anna",
                &ProfileState {
                    balance: 10,
                    last_claim_date: NaiveDate::from_ymd_opt(2024, 2, 29),
                    stats: ProfileStats::default(),
                },
            )
            .unwrap();

        let raw = kv.get("mini-casino:anna:state").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["balance"], 10);
        assert_eq!(json["lastClaimDate"], "2024-02-29");
        assert_eq!(json["stats"]["wins"], 0);
    }

    #[test]
    fn test_accepts_null_claim_date_and_missing_stats() {
        let (kv, store) = store();
        kv.put("mini-casino:anna:state", br#"{"balance":42,"lastClaimDate":null}"#)
            .unwrap();

        let state = store.load_profile_state("anna").unwrap().unwrap();
        assert_eq!(state.balance, 42);
        assert_eq!(state.last_claim_date, None);
        assert_eq!(state.stats, ProfileStats::default());
    }

    #[test]
    fn test_corrupt_record_reads_as_absent() {
        let (kv, store) = store();
        kv.put("mini-casino:anna:state", b"{not json").unwrap();
        assert_eq!(store.load_profile_state("anna").unwrap(), None);

        // a negative balance cannot be represented and is treated the same way
        kv.put("mini-casino:anna:state", br#"{"balance":-5,"lastClaimDate":null}"#)
            .unwrap();
        assert_eq!(store.load_profile_state("anna").unwrap(), None);
    }

    #[test]
    fn test_directory_round_trip() {
        let (kv, store) = store();
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "anna".to_string(),
            DirectoryEntry {
                name: "Anna".to_string(),
                balance: 10_000,
                created_at: 1_700_000_000_000,
                last_claim: 0,
            },
        );
        let record = DirectoryRecord {
            profiles,
            max_profiles: 5,
        };

        store.save_directory(&record).unwrap();
        assert_eq!(store.load_directory().unwrap(), Some(record));

        let raw = kv.get("mini-casino:profiles").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["maxProfiles"], 5);
        assert_eq!(json["profiles"]["anna"]["createdAt"], 1_700_000_000_000i64);
        assert_eq!(json["profiles"]["anna"]["lastClaim"], 0);
    }
}
