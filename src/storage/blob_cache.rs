// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! LRU cache for fetched envelope bytes.
//!
//! Content identifiers are immutable, so a hit is always correct. The TTL
//! only bounds how long a retrieved blob stays resident in memory.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

struct CacheEntry {
    bytes: Vec<u8>,
    inserted_at: Instant,
}

/// In-process LRU cache keyed by content identifier.
pub struct BlobCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl BlobCache {
    /// Create a new cache with the given capacity and TTL.
    ///
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Cached bytes for `content_id`, or `None` if absent or expired.
    pub fn get(&self, content_id: &str) -> Option<Vec<u8>> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(content_id) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.bytes.clone());
            }
            cache.pop(content_id);
        }
        None
    }

    pub fn put(&self, content_id: &str, bytes: Vec<u8>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                content_id.to_string(),
                CacheEntry {
                    bytes,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, content_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(content_id);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_put_and_get() {
        let cache = BlobCache::new(10, Duration::from_secs(300));
        assert!(cache.get("QmA").is_none());

        cache.put("QmA", b"envelope".to_vec());
        assert_eq!(cache.get("QmA").as_deref(), Some(&b"envelope"[..]));
    }

    #[test]
    fn cache_invalidate_and_clear() {
        let cache = BlobCache::new(10, Duration::from_secs(300));
        cache.put("QmA", b"a".to_vec());
        cache.put("QmB", b"b".to_vec());

        cache.invalidate("QmA");
        assert!(cache.get("QmA").is_none());
        assert!(cache.get("QmB").is_some());

        cache.clear();
        assert!(cache.get("QmB").is_none());
    }

    #[test]
    fn cache_ttl_expiry() {
        let cache = BlobCache::new(10, Duration::from_millis(1));
        cache.put("QmA", b"a".to_vec());

        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("QmA").is_none());
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let cache = BlobCache::new(2, Duration::from_secs(300));
        cache.put("QmA", b"a".to_vec());
        cache.put("QmB", b"b".to_vec());
        // Touch A so B becomes the eviction candidate
        assert!(cache.get("QmA").is_some());
        cache.put("QmC", b"c".to_vec());

        assert!(cache.get("QmA").is_some());
        assert!(cache.get("QmB").is_none());
        assert!(cache.get("QmC").is_some());
    }
}
