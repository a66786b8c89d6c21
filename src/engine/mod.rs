//! # VST Engine
//!
//! Owns the working set, the snapshot index, and the `path → Hash` index
//! used to locate bytes not (or no longer) resident in the working set.
//! `Engine` is the crate's sole [`StateManager`] implementation.

mod tree;

use crate::cache::HotCache;
use crate::cas::CasStore;
use crate::config::EngineConfig;
use crate::error::{EngineError, HeliosError};
use crate::hash::{hash_blob, Hash};
use crate::materialize;
use crate::metrics::Metrics;
use crate::store::{BatchEntry, ObjectStore};
use crate::types::{
    snapshot_key, CommitMetrics, DiffStats, EngineMetrics, L1Stats, MatOpts, SnapshotId,
    StateManager,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// The on-disk record for a persisted snapshot: a stable `path → Hash`
/// mapping, serialized as JSON. `Hash`'s own `Serialize`/`Deserialize`
/// impls give the `{"path": "<algo>:<hex>"}` shape.
type SnapshotRecord = BTreeMap<String, Hash>;

pub struct Engine {
    cur: Mutex<HashMap<String, Vec<u8>>>,
    path_to_hash: Mutex<HashMap<String, Hash>>,
    snaps: Mutex<HashMap<SnapshotId, HashMap<String, Vec<u8>>>>,
    snap_hashes: Mutex<HashMap<SnapshotId, SnapshotRecord>>,
    cas: RwLock<Option<Arc<CasStore>>>,
    metrics: Metrics,
    config: EngineConfig,
}

/// Maximum path length accepted by [`Engine::write_file`]; paths longer than
/// this are rejected as platform-invalid.
const MAX_PATH_LEN: usize = 4096;

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            cur: Mutex::new(HashMap::new()),
            path_to_hash: Mutex::new(HashMap::new()),
            snaps: Mutex::new(HashMap::new()),
            snap_hashes: Mutex::new(HashMap::new()),
            cas: RwLock::new(None),
            metrics: Metrics::new(),
            config,
        }
    }

    fn validate_path(path: &str) -> Result<(), EngineError> {
        if path.is_empty() || path.len() > MAX_PATH_LEN {
            return Err(EngineError::InvalidPath(path.to_string()));
        }
        Ok(())
    }

    fn cas_handle(&self) -> Option<Arc<CasStore>> {
        self.cas.read().unwrap().clone()
    }

    /// Resolves `id` to its `{path → bytes}` set, preferring the in-memory
    /// copy and falling back to the persisted hash map plus CAS loads.
    fn snapshot_files(&self, id: &SnapshotId) -> Result<Vec<(String, Vec<u8>)>, HeliosError> {
        if let Some(bytes_map) = self.snaps.lock().unwrap().get(id) {
            return Ok(bytes_map
                .iter()
                .map(|(p, b)| (p.clone(), b.clone()))
                .collect());
        }

        let record = self.snapshot_hash_record(id)?;
        let cas = self
            .cas_handle()
            .ok_or(EngineError::NoStoreAttached)?;
        let mut out = Vec::with_capacity(record.len());
        for (path, hash) in &record {
            let bytes = cas.load(hash).map_err(EngineError::Cas)?;
            out.push((path.clone(), bytes));
        }
        Ok(out)
    }

    /// Resolves `id` to its `{path → Hash}` record without loading blob
    /// bytes, consulting the in-process cache first and L2 on miss.
    fn snapshot_hash_record(&self, id: &SnapshotId) -> Result<SnapshotRecord, HeliosError> {
        if let Some(record) = self.snap_hashes.lock().unwrap().get(id) {
            return Ok(record.clone());
        }

        let cas = self.cas_handle().ok_or_else(|| {
            HeliosError::Engine(EngineError::UnknownSnapshot(id.to_string()))
        })?;
        let l2 = cas.l2().ok_or_else(|| {
            HeliosError::Engine(EngineError::UnknownSnapshot(id.to_string()))
        })?;
        let raw = l2
            .get(&snapshot_key(id))
            .map_err(EngineError::Store)?
            .ok_or_else(|| EngineError::UnknownSnapshot(id.to_string()))?;
        let record: SnapshotRecord =
            serde_json::from_slice(&raw).map_err(crate::error::StoreError::Serde)?;
        self.snap_hashes
            .lock()
            .unwrap()
            .insert(id.clone(), record.clone());
        Ok(record)
    }

    /// Reports whether every blob referenced by `id` is reachable, either
    /// in L2 or via the in-memory snapshot copy.
    pub fn verify_snapshot(&self, id: &SnapshotId) -> Result<bool, HeliosError> {
        if self.snaps.lock().unwrap().contains_key(id) {
            return Ok(true);
        }
        let record = self.snapshot_hash_record(id)?;
        let Some(cas) = self.cas_handle() else {
            return Ok(record.is_empty());
        };
        for hash in record.values() {
            if !cas.exists(hash).map_err(EngineError::Cas)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Finds the unique snapshot whose id starts with `prefix`. Returns
    /// `None` if no snapshot matches, and the first match encountered if
    /// more than one does (callers needing strict uniqueness should supply
    /// enough of the id to disambiguate).
    pub fn find_snapshot_by_prefix(&self, prefix: &str) -> Option<SnapshotId> {
        self.snaps
            .lock()
            .unwrap()
            .keys()
            .find(|id| id.as_str().starts_with(prefix))
            .cloned()
            .or_else(|| {
                self.snap_hashes
                    .lock()
                    .unwrap()
                    .keys()
                    .find(|id| id.as_str().starts_with(prefix))
                    .cloned()
            })
    }
}

impl StateManager for Engine {
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), HeliosError> {
        Self::validate_path(path).map_err(HeliosError::Engine)?;
        self.cur
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, HeliosError> {
        if let Some(bytes) = self.cur.lock().unwrap().get(path) {
            return Ok(Some(bytes.clone()));
        }

        let hash = match self.path_to_hash.lock().unwrap().get(path) {
            Some(h) => *h,
            None => return Ok(None),
        };

        let Some(cas) = self.cas_handle() else {
            return Err(HeliosError::Engine(EngineError::NoStoreAttached));
        };

        match cas.load(&hash) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(crate::error::CasError::NotFound(_)) => Ok(None),
            Err(e) => Err(HeliosError::Engine(EngineError::Cas(e))),
        }
    }

    fn delete_file(&self, path: &str) -> Result<(), HeliosError> {
        self.cur.lock().unwrap().remove(path);
        self.path_to_hash.lock().unwrap().remove(path);
        Ok(())
    }

    fn commit(&self, _message: &str) -> Result<(SnapshotId, CommitMetrics), HeliosError> {
        let start = Instant::now();
        let working: HashMap<String, Vec<u8>> = self.cur.lock().unwrap().clone();

        let mut path_hashes: SnapshotRecord = BTreeMap::new();
        let mut unique: BTreeMap<Hash, Vec<u8>> = BTreeMap::new();
        for (path, bytes) in &working {
            let hash = hash_blob(bytes);
            path_hashes.insert(path.clone(), hash);
            unique.entry(hash).or_insert_with(|| bytes.clone());
        }

        let mut new_objects: u64 = 0;
        let mut new_bytes: u64 = 0;
        let cas = self.cas_handle();

        if let Some(cas) = &cas {
            let mut to_store = Vec::with_capacity(unique.len());
            for (hash, bytes) in &unique {
                if !cas.exists(hash).map_err(EngineError::Cas)? {
                    new_objects += 1;
                    new_bytes += bytes.len() as u64;
                }
                to_store.push(bytes.clone());
            }
            if !to_store.is_empty() {
                cas.store_batch(&to_store).map_err(EngineError::Cas)?;
            }
        } else {
            for bytes in unique.values() {
                new_objects += 1;
                new_bytes += bytes.len() as u64;
            }
        }

        let root = tree::root_hash(&path_hashes);
        let id = SnapshotId::from(root);

        if let Some(cas) = &cas {
            if let Some(l2) = cas.l2() {
                let record_bytes = serde_json::to_vec(&path_hashes)
                    .map_err(crate::error::StoreError::Serde)
                    .map_err(EngineError::Store)?;
                l2.put_batch(&[BatchEntry {
                    key: snapshot_key(&id),
                    value: record_bytes,
                }])
                .map_err(EngineError::Store)?;
            }
        }

        self.snaps.lock().unwrap().insert(id.clone(), working);
        self.snap_hashes
            .lock()
            .unwrap()
            .insert(id.clone(), path_hashes.clone());
        *self.path_to_hash.lock().unwrap() = path_hashes.into_iter().collect();

        let metrics = CommitMetrics {
            commit_latency: start.elapsed(),
            new_objects,
            new_bytes,
        };
        self.metrics
            .record_commit(metrics.commit_latency, new_objects, new_bytes);

        Ok((id, metrics))
    }

    fn restore(&self, id: &SnapshotId) -> Result<(), HeliosError> {
        if let Some(bytes_map) = self.snaps.lock().unwrap().get(id).cloned() {
            let mut new_hashes = HashMap::with_capacity(bytes_map.len());
            for (path, bytes) in &bytes_map {
                new_hashes.insert(path.clone(), hash_blob(bytes));
            }
            *self.cur.lock().unwrap() = bytes_map;
            *self.path_to_hash.lock().unwrap() = new_hashes;
            return Ok(());
        }

        let record = self.snapshot_hash_record(id)?;
        self.cur.lock().unwrap().clear();
        *self.path_to_hash.lock().unwrap() = record.into_iter().collect();
        Ok(())
    }

    fn diff(&self, from: &SnapshotId, to: &SnapshotId) -> Result<DiffStats, HeliosError> {
        let from_map = self.snapshot_hash_record(from)?;
        let to_map = self.snapshot_hash_record(to)?;

        let mut stats = DiffStats::default();
        for (path, from_hash) in &from_map {
            match to_map.get(path) {
                None => stats.deleted += 1,
                Some(to_hash) if to_hash != from_hash => stats.changed += 1,
                Some(_) => {}
            }
        }
        for path in to_map.keys() {
            if !from_map.contains_key(path) {
                stats.added += 1;
            }
        }
        Ok(stats)
    }

    fn materialize(
        &self,
        id: &SnapshotId,
        output_dir: &Path,
        opts: &MatOpts,
    ) -> Result<CommitMetrics, HeliosError> {
        let files = self.snapshot_files(id)?;
        materialize::materialize_files(files, output_dir, opts).map_err(HeliosError::Materialize)
    }

    fn attach_stores(&mut self, store_dir: &Path) -> Result<(), HeliosError> {
        let store = ObjectStore::open(store_dir).map_err(EngineError::Store)?;
        // `CasConfig::cache_capacity_items` is the item bound callers set on
        // the CAS; `EngineConfig::l1` otherwise only governs compression, so
        // let the CAS-level field drive the cache's actual capacity.
        let mut l1_config = self.config.l1.clone();
        l1_config.capacity_items = self.config.cas.cache_capacity_items;
        let l1 = Arc::new(HotCache::new(l1_config));
        let cas = CasStore::new(l1, Some(Arc::new(store)), self.config.cas.clone());
        *self.cas.write().unwrap() = Some(Arc::new(cas));
        Ok(())
    }

    fn l1_stats(&self) -> L1Stats {
        self.cas_handle()
            .map(|cas| cas.l1().stats())
            .unwrap_or_default()
    }

    fn engine_metrics_snapshot(&self) -> EngineMetrics {
        self.metrics.snapshot()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(cas) = self.cas.read().unwrap().as_ref() {
            cas.close();
        }
    }
}
