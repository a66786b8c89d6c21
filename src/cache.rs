//! # L1 Hot Cache
//!
//! A bounded, thread-safe, in-memory cache of decompressed blobs keyed by
//! [`Hash`]. Eviction is LRU by last access, backed by the `lru` crate's
//! intrusive linked-hashmap implementation.
//!
//! Entries above `compress_threshold_bytes` may be stored zstd-compressed at
//! rest if `compress` is enabled; [`HotCache::get`] always hands back the
//! original bytes, so the contract is unaffected either way.

use crate::config::L1Config;
use crate::hash::Hash;
use crate::types::L1Stats;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

enum Entry {
    Plain(Vec<u8>),
    Compressed { original_len: usize, data: Vec<u8> },
}

impl Entry {
    fn size_bytes(&self) -> usize {
        match self {
            Entry::Plain(v) => v.len(),
            Entry::Compressed { data, .. } => data.len(),
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        match self {
            Entry::Plain(v) => v,
            Entry::Compressed { data, .. } => {
                zstd::decode_all(&data[..]).unwrap_or_else(|_| Vec::new())
            }
        }
    }

    fn peek_bytes(&self) -> Vec<u8> {
        match self {
            Entry::Plain(v) => v.clone(),
            Entry::Compressed { data, .. } => {
                zstd::decode_all(&data[..]).unwrap_or_else(|_| Vec::new())
            }
        }
    }
}

struct Inner {
    map: LruCache<Hash, Entry>,
    resident_bytes: u64,
}

/// Bounded in-memory cache of blob bytes, keyed by content hash.
pub struct HotCache {
    inner: Mutex<Inner>,
    config: L1Config,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl HotCache {
    pub fn new(config: L1Config) -> Self {
        let capacity = NonZeroUsize::new(config.capacity_items.max(1)).unwrap();
        Self {
            inner: Mutex::new(Inner {
                map: LruCache::new(capacity),
                resident_bytes: 0,
            }),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Looks up `hash`; records a hit or miss regardless of outcome.
    pub fn get(&self, hash: &Hash) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.map.get(hash) {
            Some(entry) => {
                let bytes = entry.peek_bytes();
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(bytes)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts `bytes` under `hash`, evicting the least-recently-used entry
    /// if the cache is at capacity.
    pub fn put(&self, hash: Hash, bytes: Vec<u8>) {
        let entry = if self.config.compress && bytes.len() >= self.config.compress_threshold_bytes
        {
            match zstd::encode_all(&bytes[..], 0) {
                Ok(compressed) if compressed.len() < bytes.len() => Entry::Compressed {
                    original_len: bytes.len(),
                    data: compressed,
                },
                _ => Entry::Plain(bytes),
            }
        } else {
            Entry::Plain(bytes)
        };

        let mut inner = self.inner.lock().unwrap();
        let new_size = entry.size_bytes() as u64;

        if let Some(old) = inner.map.push(hash, entry) {
            // `push` returns an evicted (key, value) pair only when the
            // cache was at capacity *and* `hash` was not already present;
            // when `hash` already existed, `push` replaces it in place and
            // returns the replaced value under the same key.
            let (evicted_key, evicted_entry) = old;
            if evicted_key == hash {
                inner.resident_bytes = inner.resident_bytes.saturating_sub(evicted_entry.size_bytes() as u64);
            } else {
                inner.resident_bytes = inner.resident_bytes.saturating_sub(evicted_entry.size_bytes() as u64);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        inner.resident_bytes += new_size;
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.inner.lock().unwrap().map.contains(hash)
    }

    pub fn stats(&self) -> L1Stats {
        let inner = self.inner.lock().unwrap();
        L1Stats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            resident_items: inner.map.len() as u64,
            resident_bytes: inner.resident_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_blob;

    fn cache(capacity: usize) -> HotCache {
        HotCache::new(L1Config {
            capacity_items: capacity,
            compress: false,
            compress_threshold_bytes: usize::MAX,
        })
    }

    #[test]
    fn get_after_put_returns_bytes() {
        let c = cache(4);
        let h = hash_blob(b"payload");
        c.put(h, b"payload".to_vec());
        assert_eq!(c.get(&h), Some(b"payload".to_vec()));
    }

    #[test]
    fn miss_returns_none_and_counts() {
        let c = cache(4);
        let h = hash_blob(b"absent");
        assert_eq!(c.get(&h), None);
        assert_eq!(c.stats().misses, 1);
    }

    #[test]
    fn hits_and_misses_monotonic() {
        let c = cache(4);
        let h = hash_blob(b"data");
        c.put(h, b"data".to_vec());
        c.get(&h);
        c.get(&h);
        let h2 = hash_blob(b"other");
        c.get(&h2);
        let stats = c.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn eviction_under_capacity_pressure() {
        let c = cache(2);
        let h1 = hash_blob(b"one");
        let h2 = hash_blob(b"two");
        let h3 = hash_blob(b"three");
        c.put(h1, b"one".to_vec());
        c.put(h2, b"two".to_vec());
        c.put(h3, b"three".to_vec());

        assert_eq!(c.get(&h1), None);
        assert!(c.stats().evictions >= 1);
        assert_eq!(c.get(&h3), Some(b"three".to_vec()));
    }

    #[test]
    fn compression_roundtrips_original_bytes() {
        let c = HotCache::new(L1Config {
            capacity_items: 4,
            compress: true,
            compress_threshold_bytes: 4,
        });
        let payload = vec![b'x'; 10_000];
        let h = hash_blob(&payload);
        c.put(h, payload.clone());
        assert_eq!(c.get(&h), Some(payload));
    }
}
