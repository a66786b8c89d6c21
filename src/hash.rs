//! # Content Hashing
//!
//! The sole canonicalization point for snapshot identity. [`hash_blob`] and
//! [`hash_tree`] are used on every commit's hot path, so both avoid
//! per-call heap allocation for the hasher state itself by keeping a
//! thread-local reusable hasher instead of constructing one per call.
//!
//! BLAKE3 is the default algorithm; SHA-256 is supported for content hashed
//! via [`hash_content`] but is never chosen automatically.

use crate::error::HashError;
use std::cell::RefCell;
use std::fmt;

/// Separator used to join tree entries before hashing. Changing this value
/// is a snapshot-identifier format version change.
const TREE_ENTRY_SEPARATOR: u8 = b'\n';

/// Digest length in bytes for both supported algorithms.
pub const DIGEST_LEN: usize = 32;

/// Hash algorithm tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Algorithm {
    Blake3,
    Sha256,
}

impl Algorithm {
    fn as_str(self) -> &'static str {
        match self {
            Algorithm::Blake3 => "blake3",
            Algorithm::Sha256 => "sha256",
        }
    }

    fn parse(s: &str) -> Result<Self, HashError> {
        match s {
            "blake3" => Ok(Algorithm::Blake3),
            "sha256" => Ok(Algorithm::Sha256),
            other => Err(HashError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 256-bit content digest tagged with the algorithm that produced it.
///
/// Equality is bitwise over `(algorithm, digest)`. A `Hash` is only ever
/// constructed by the hashing primitives in this module; once created it is
/// immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash {
    algorithm: Algorithm,
    digest: [u8; DIGEST_LEN],
}

impl Hash {
    fn new(algorithm: Algorithm, digest: [u8; DIGEST_LEN]) -> Self {
        Self { algorithm, digest }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Raw digest bytes, for use as an L2 key.
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Parses the `"<algo>:<hex>"` string form produced by [`Hash::to_string`].
    pub fn parse(s: &str) -> Result<Self, HashError> {
        let (algo, hexpart) = s
            .split_once(':')
            .ok_or_else(|| HashError::MalformedHash(s.to_string()))?;
        let algorithm = Algorithm::parse(algo)?;
        let bytes =
            hex::decode(hexpart).map_err(|_| HashError::MalformedHash(s.to_string()))?;
        if bytes.len() != DIGEST_LEN {
            return Err(HashError::MalformedHash(s.to_string()));
        }
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes);
        Ok(Self::new(algorithm, digest))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl serde::Serialize for Hash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Hash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::parse(&s).map_err(serde::de::Error::custom)
    }
}

thread_local! {
    static BLAKE3_HASHER: RefCell<blake3::Hasher> = RefCell::new(blake3::Hasher::new());
}

/// Computes the BLAKE3 digest of `bytes`.
///
/// Reuses a thread-local [`blake3::Hasher`] instance so repeated calls on
/// the commit hot path do not allocate. Each thread gets its own instance,
/// so concurrent callers never contend on hasher state.
pub fn hash_blob(bytes: &[u8]) -> Hash {
    BLAKE3_HASHER.with(|cell| {
        let mut hasher = cell.borrow_mut();
        hasher.reset();
        hasher.update(bytes);
        let digest = *hasher.finalize().as_bytes();
        Hash::new(Algorithm::Blake3, digest)
    })
}

/// Hashes a sequence of directory-entry strings, concatenated with a fixed
/// separator. Deterministic for the same sequence in the same order;
/// callers must supply sorted input when order-independence is required.
pub fn hash_tree<I, S>(entries: I) -> Hash
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    BLAKE3_HASHER.with(|cell| {
        let mut hasher = cell.borrow_mut();
        hasher.reset();
        for entry in entries {
            hasher.update(entry.as_ref().as_bytes());
            hasher.update(&[TREE_ENTRY_SEPARATOR]);
        }
        let digest = *hasher.finalize().as_bytes();
        Hash::new(Algorithm::Blake3, digest)
    })
}

/// Computes the digest of `bytes` under the given algorithm.
pub fn hash_content(bytes: &[u8], algorithm: Algorithm) -> Hash {
    match algorithm {
        Algorithm::Blake3 => hash_blob(bytes),
        Algorithm::Sha256 => {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let result = hasher.finalize();
            let mut digest = [0u8; DIGEST_LEN];
            digest.copy_from_slice(&result);
            Hash::new(Algorithm::Sha256, digest)
        }
    }
}

/// Formats a single tree entry string: `"<name>:<type>:<hex(child_digest)>"`.
pub fn tree_entry(name: &str, is_dir: bool, child: &Hash) -> String {
    let kind = if is_dir { "tree" } else { "blob" };
    format!("{name}:{kind}:{}", child.to_hex())
}
