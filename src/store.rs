//! # Object Store (L2)
//!
//! A durable key→bytes map on top of `sled`, an embedded pure-Rust
//! key-value engine that supports atomic write batches with a synchronous
//! flush, giving batched writes an all-or-nothing durability guarantee.
//!
//! Keys are either a raw 32-byte digest (blob records) or
//! `"snapshot:" + <SnapshotId>` (snapshot metadata records); the fixed
//! digest length means the two namespaces can never collide.

use crate::error::StoreError;
use crate::hash::Hash;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// An entry to be written in a [`ObjectStore::put_batch`] call.
pub struct BatchEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Durable key→bytes map with atomic batch writes.
pub struct ObjectStore {
    db: sled::Db,
    closed: AtomicBool,
}

impl ObjectStore {
    /// Opens (creating if necessary) a `sled` database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let db = sled::open(path)?;
        log::info!(target: "helios::store", "opened object store at {}", path.display());
        Ok(Self {
            db,
            closed: AtomicBool::new(false),
        })
    }

    /// Opens a purely in-memory `sled` database. Used for `memory_only_mode`
    /// and in tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            db,
            closed: AtomicBool::new(false),
        })
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Writes `entries` atomically: either all become visible, or none do.
    /// Rejects any entry with an empty value.
    pub fn put_batch(&self, entries: &[BatchEntry]) -> Result<(), StoreError> {
        self.check_open()?;
        for entry in entries {
            if entry.value.is_empty() {
                return Err(StoreError::InvalidBatchEntry);
            }
        }

        let mut batch = sled::Batch::default();
        for entry in entries {
            batch.insert(entry.key.as_slice(), entry.value.as_slice());
        }
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    /// Returns a copy of the value stored under `key`, if present.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_open()?;
        Ok(self.db.get(key)?.map(|ivec| ivec.to_vec()))
    }

    pub fn get_hash(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StoreError> {
        self.get(hash.digest())
    }

    pub fn contains_hash(&self, hash: &Hash) -> Result<bool, StoreError> {
        self.check_open()?;
        Ok(self.db.contains_key(hash.digest())?)
    }

    /// Flushes outstanding writes and marks the store closed. Idempotent.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.db.flush()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
