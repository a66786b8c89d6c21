//! # Helios
//!
//! A user-space versioned-state engine for agents that commit hundreds to
//! thousands of snapshots per hour against a working set of files. Rather
//! than diffing the whole tree on every commit, Helios hashes each file
//! once with BLAKE3, stores unique blobs under their digest, and folds a
//! deterministic Merkle root over the directory structure — a commit
//! returns a content-addressed [`SnapshotId`] without ever re-reading
//! unchanged content.
//!
//! ```text
//!           write_file / read_file / delete_file
//!                         |
//!                    Engine (cur, path_to_hash, snaps)
//!                         |
//!                      commit ─────────────▶ directory Merkle tree (hash)
//!                         |
//!                    CasStore ── L1 (HotCache, LRU) ── L2 (ObjectStore, sled)
//!                         |                                  ^
//!                     AsyncWriter ──── background thread ────┘
//! ```
//!
//! [`Engine`] is the sole implementation of the [`StateManager`] contract;
//! a CLI or daemon front-end that turns these values into JSON is outside
//! this crate's scope.

mod cache;
mod cas;
mod config;
mod engine;
mod error;
mod hash;
mod materialize;
mod metrics;
mod store;
mod types;

pub use cache::HotCache;
pub use cas::CasStore;
pub use config::{
    resolve_store_dir, CasConfig, EngineConfig, L1Config, DEFAULT_CACHE_CAPACITY_ITEMS,
    DEFAULT_COMPRESS_THRESHOLD_BYTES, DEFAULT_ERROR_QUEUE_DEPTH, DEFAULT_WRITE_QUEUE_DEPTH,
};
pub use engine::Engine;
pub use error::{
    CasError, ConfigError, EngineError, HashError, HeliosError, MaterializeError, Result,
    StoreError,
};
pub use hash::{hash_blob, hash_content, hash_tree, Algorithm, Hash, DIGEST_LEN};
pub use store::{BatchEntry, ObjectStore};
pub use types::{
    CommitMetrics, DiffStats, EngineMetrics, L1Stats, MatOpts, SnapshotId, StateManager,
};
