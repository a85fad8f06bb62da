//! Key-value backends: RocksDB for durable play, an in-memory map for tests

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::StorageError;
use dashmap::DashMap;
use rocksdb::{Options, DB};
use std::path::Path;
use std::sync::Arc;

/// Minimal durable key-value contract. A single `put` is atomic.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        // Profile records are tiny; keep memtables small.
        opts.set_write_buffer_size(4 * 1024 * 1024);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| StorageError::OpenFailed(format!("{}: {}", path.as_ref().display(), e)))?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| StorageError::ReadFailed(format!("{}: {}", key, e)))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        Ok(self.db.put(key.as_bytes(), value)?)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        Ok(self.db.delete(key.as_bytes())?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Build the backend named in the configuration
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KvStore>, StorageError> {
    match config.backend {
        StorageBackend::RocksDb => {
            tracing::info!(path = %config.data_directory, "Opening RocksDB store");
            Ok(Arc::new(RocksStore::open(&config.data_directory)?))
        }
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
