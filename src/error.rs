//! # Error Types
//!
//! Defines a structured error hierarchy using `thiserror`. Each component
//! gets its own enum; all of them roll up into [`HeliosError`], the error
//! type returned by the public API.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type encompassing all failure modes in Helios.
#[derive(Error, Debug)]
pub enum HeliosError {
    #[error("hashing error: {0}")]
    Hash(#[from] HashError),

    #[error(transparent)]
    Cas(#[from] CasError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the hashing primitives.
#[derive(Error, Debug)]
pub enum HashError {
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("malformed hash string: {0}")]
    MalformedHash(String),
}

/// Errors from the content-addressable store.
#[derive(Error, Debug)]
pub enum CasError {
    #[error("operation attempted after close()")]
    Closed,

    #[error("digest not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{count} of {total} batched writes failed; first error: {first}")]
    Batch {
        count: usize,
        total: usize,
        #[source]
        first: Box<CasError>,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Errors from the persistent object store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object store backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("object store is closed")]
    Closed,

    #[error("batch entry had empty/null value")]
    InvalidBatchEntry,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors from the VST engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown snapshot: {0}")]
    UnknownSnapshot(String),

    #[error("path is not valid UTF-8 or exceeds the maximum length: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Cas(#[from] CasError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no object store attached; this operation requires persistent storage")]
    NoStoreAttached,
}

/// Errors from the materializer.
#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("unknown snapshot: {0}")]
    UnknownSnapshot(String),

    #[error("invalid glob pattern: {0}")]
    InvalidGlob(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Configuration parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, HeliosError>;
