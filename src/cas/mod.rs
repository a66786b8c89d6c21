//! # Content-Addressable Store (CAS)
//!
//! Persists blobs under their digest, answers existence/fetch queries,
//! warms the L1 hot cache, and throttles disk pressure via an asynchronous
//! background writer when enabled. `store`/`load`/`exists` may be called
//! from many threads concurrently; `close` is a one-time terminal
//! transition.

mod writer;

use crate::cache::HotCache;
use crate::config::CasConfig;
use crate::error::CasError;
use crate::hash::{hash_blob, Hash};
use crate::store::{BatchEntry, ObjectStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use writer::{AsyncWriter, WriteJob};

/// The digest of the empty blob never has a backing L2 entry (the object
/// store rejects zero-length values), so every lookup for it is trivially
/// satisfiable regardless of what L1/L2 actually hold.
fn is_empty_blob_hash(hash: &Hash) -> bool {
    *hash == hash_blob(&[])
}

pub struct CasStore {
    l1: Arc<HotCache>,
    l2: Option<Arc<ObjectStore>>,
    writer: Option<AsyncWriter>,
    config: CasConfig,
    closed: AtomicBool,
}

impl CasStore {
    /// Builds a CAS over `l1` with an optional `l2` backing store. When
    /// `l2` is `Some` and `memory_only_mode` is false, a background writer
    /// thread is spawned to persist blobs asynchronously.
    pub fn new(l1: Arc<HotCache>, l2: Option<Arc<ObjectStore>>, config: CasConfig) -> Self {
        let writer = if config.memory_only_mode {
            None
        } else {
            l2.clone().map(|store| {
                AsyncWriter::spawn(
                    store,
                    config.write_queue_depth,
                    config.error_queue_depth,
                    config.logger.clone(),
                )
            })
        };

        Self {
            l1,
            l2,
            writer,
            config,
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<(), CasError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CasError::Closed);
        }
        Ok(())
    }

    /// Idempotently stores `bytes`, returning its [`Hash`]. Storing
    /// identical content twice is a no-op past the first call.
    ///
    /// An empty `bytes` is a legal blob (an empty file commits and reads
    /// back as `b""`); its digest is kept in L1 but never written to L2,
    /// since the backing store rejects zero-length values.
    pub fn store(&self, bytes: &[u8]) -> Result<Hash, CasError> {
        self.check_open()?;
        let hash = hash_blob(bytes);

        if self.l1.contains(&hash) {
            return Ok(hash);
        }
        self.l1.put(hash, bytes.to_vec());

        if bytes.is_empty() || self.config.memory_only_mode {
            return Ok(hash);
        }

        let Some(l2) = self.l2.as_ref() else {
            return Ok(hash);
        };

        self.persist(l2, hash, bytes)?;
        Ok(hash)
    }

    fn persist(&self, l2: &Arc<ObjectStore>, hash: Hash, bytes: &[u8]) -> Result<(), CasError> {
        let Some(writer) = &self.writer else {
            // No background writer configured (e.g. constructed without
            // going through `memory_only_mode` but also without a writer) —
            // fall back to a synchronous write.
            return self.write_sync(l2, hash, bytes);
        };

        let job = WriteJob {
            key: hash.digest().to_vec(),
            value: bytes.to_vec(),
        };
        match writer.try_enqueue(job) {
            Ok(true) => Ok(()),
            Ok(false) => {
                // Queue full: fall back to a synchronous write on the
                // caller's thread (the fixed per-instance policy for this
                // implementation).
                self.write_sync(l2, hash, bytes)
            }
            Err(()) => Err(CasError::Closed),
        }
    }

    fn write_sync(&self, l2: &Arc<ObjectStore>, hash: Hash, bytes: &[u8]) -> Result<(), CasError> {
        l2.put_batch(&[BatchEntry {
            key: hash.digest().to_vec(),
            value: bytes.to_vec(),
        }])
        .map_err(CasError::from)
    }

    /// Stores many blobs, acquiring the L1 lock a bounded number of times
    /// rather than once per item. Empty blobs are kept in L1 only, for the
    /// same reason as in [`CasStore::store`].
    pub fn store_batch(&self, items: &[Vec<u8>]) -> Result<Vec<Hash>, CasError> {
        self.check_open()?;
        let mut hashes = Vec::with_capacity(items.len());
        let mut to_persist: Vec<(Hash, &[u8])> = Vec::new();

        for bytes in items {
            let hash = hash_blob(bytes);
            if !self.l1.contains(&hash) {
                self.l1.put(hash, bytes.clone());
                if !bytes.is_empty() {
                    to_persist.push((hash, bytes.as_slice()));
                }
            }
            hashes.push(hash);
        }

        if self.config.memory_only_mode {
            return Ok(hashes);
        }
        let Some(l2) = self.l2.as_ref() else {
            return Ok(hashes);
        };

        // Deduplicate by digest within the batch before touching L2.
        let mut seen = std::collections::HashSet::new();
        let entries: Vec<BatchEntry> = to_persist
            .into_iter()
            .filter(|(h, _)| seen.insert(*h))
            .map(|(h, bytes)| BatchEntry {
                key: h.digest().to_vec(),
                value: bytes.to_vec(),
            })
            .collect();

        if !entries.is_empty() {
            l2.put_batch(&entries)?;
        }
        Ok(hashes)
    }

    /// Loads the bytes for `hash`, checking L1 first and re-populating it
    /// on an L2 hit. The digest of the empty blob is always satisfiable —
    /// it is never written to L2, so a cold L1 would otherwise report it
    /// missing.
    pub fn load(&self, hash: &Hash) -> Result<Vec<u8>, CasError> {
        self.check_open()?;
        if is_empty_blob_hash(hash) {
            return Ok(Vec::new());
        }
        if let Some(bytes) = self.l1.get(hash) {
            return Ok(bytes);
        }
        let Some(l2) = self.l2.as_ref() else {
            return Err(CasError::NotFound(hash.to_string()));
        };
        match l2.get_hash(hash)? {
            Some(bytes) => {
                self.l1.put(*hash, bytes.clone());
                Ok(bytes)
            }
            None => Err(CasError::NotFound(hash.to_string())),
        }
    }

    /// Reports whether `hash` is known, without ever loading its bytes.
    pub fn exists(&self, hash: &Hash) -> Result<bool, CasError> {
        self.check_open()?;
        if self.l1.contains(hash) || is_empty_blob_hash(hash) {
            return Ok(true);
        }
        match self.l2.as_ref() {
            Some(l2) => Ok(l2.contains_hash(hash)?),
            None => Ok(false),
        }
    }

    pub fn l1(&self) -> &Arc<HotCache> {
        &self.l1
    }

    /// The backing persistent store, if attached. Used by the engine to
    /// persist snapshot-metadata records alongside blobs in the same
    /// backend.
    pub fn l2(&self) -> Option<&Arc<ObjectStore>> {
        self.l2.as_ref()
    }

    /// Signals shutdown, drains pending async writes, releases resources.
    /// Re-entrant: a second call is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(writer) = &self.writer {
            writer.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
