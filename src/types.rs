//! # Core Types & External Contract
//!
//! [`SnapshotId`], [`CommitMetrics`], [`DiffStats`], [`MatOpts`], and the
//! [`StateManager`] trait that a CLI front-end (out of scope for this crate)
//! would consume.

use crate::error::HeliosError;
use crate::hash::Hash;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// The string form of a snapshot's root directory [`Hash`] — bit-exact
/// across implementations: `"<algo>:<lowercase-hex-of-digest>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the textual form back into the underlying root [`Hash`].
    pub fn to_hash(&self) -> Result<Hash, crate::error::HashError> {
        Hash::parse(&self.0)
    }
}

impl From<Hash> for SnapshotId {
    fn from(h: Hash) -> Self {
        SnapshotId(h.to_string())
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reserved L2 key prefix for snapshot metadata records.
pub const SNAPSHOT_KEY_PREFIX: &str = "snapshot:";

pub fn snapshot_key(id: &SnapshotId) -> Vec<u8> {
    format!("{SNAPSHOT_KEY_PREFIX}{id}").into_bytes()
}

/// Metrics produced by a single commit or materialize operation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CommitMetrics {
    pub commit_latency: Duration,
    pub new_objects: u64,
    pub new_bytes: u64,
}

/// File-count differences between two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub added: u64,
    pub changed: u64,
    pub deleted: u64,
}

/// Include/exclude glob filters for [`StateManager::materialize`].
///
/// An empty `include` list means "include everything"; `exclude` is applied
/// after `include` and always wins.
#[derive(Debug, Clone, Default)]
pub struct MatOpts {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl MatOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// Read-out of L1 hot-cache counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct L1Stats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub resident_items: u64,
    pub resident_bytes: u64,
}

/// Read-out of engine-wide latency/throughput counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub commit_latency_us_p50: u64,
    pub commit_latency_us_p95: u64,
    pub commit_latency_us_p99: u64,
    pub new_objects: u64,
    pub new_bytes: u64,
}

/// The external contract a front-end (CLI, daemon, ...) consumes.
///
/// `Engine` (in [`crate::engine`]) is the sole implementation shipped by
/// this crate.
pub trait StateManager {
    /// Inserts a byte-level copy of `bytes` into the working set at `path`.
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), HeliosError>;

    /// Reads `path`, consulting the working set, then the restored
    /// snapshot's path→hash index, then L1, then L2.
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, HeliosError>;

    /// Removes `path` from the working set. Idempotent for unknown paths.
    fn delete_file(&self, path: &str) -> Result<(), HeliosError>;

    /// Hashes every working-set file, builds the Merkle tree, persists
    /// blobs and snapshot metadata, and returns the new `SnapshotId`.
    fn commit(&self, message: &str) -> Result<(SnapshotId, CommitMetrics), HeliosError>;

    /// Replaces the working set with the contents of `id`.
    fn restore(&self, id: &SnapshotId) -> Result<(), HeliosError>;

    /// Computes add/change/delete counts between two snapshots.
    fn diff(&self, from: &SnapshotId, to: &SnapshotId) -> Result<DiffStats, HeliosError>;

    /// Writes every path in `id` under `output_dir`, subject to `opts`.
    fn materialize(
        &self,
        id: &SnapshotId,
        output_dir: &Path,
        opts: &MatOpts,
    ) -> Result<CommitMetrics, HeliosError>;

    /// Attaches (or re-attaches) the L1/L2 backing stores.
    fn attach_stores(&mut self, store_dir: &Path) -> Result<(), HeliosError>;

    fn l1_stats(&self) -> L1Stats;

    fn engine_metrics_snapshot(&self) -> EngineMetrics;
}
