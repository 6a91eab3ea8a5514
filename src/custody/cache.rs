// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Short-lived LRU cache of reconstructed private keys.
//!
//! Entries are keyed by lowercase wallet address and expire after a TTL.
//! The cache is never serialized and its `Debug` output lists no secrets.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use k256::SecretKey;
use lru::LruCache;

use super::keys::normalize_address;

/// Cached entry: secret key + insertion timestamp.
struct CacheEntry {
    secret: SecretKey,
    inserted_at: Instant,
}

/// Address → private key cache owned by the key custodian.
pub struct KeyCache {
    entries: LruCache<String, CacheEntry>,
    ttl: Duration,
}

impl KeyCache {
    /// Create a new cache with the given capacity and TTL.
    ///
    /// - `capacity`: Max number of wallet addresses to hold (at least 1).
    /// - `ttl`: Time-to-live for each entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            ttl,
        }
    }

    /// Store a key, replacing any previous entry for the address.
    ///
    /// Returns `true` if an entry was replaced.
    pub fn insert(&mut self, address: &str, secret: SecretKey) -> bool {
        self.entries
            .put(
                normalize_address(address),
                CacheEntry {
                    secret,
                    inserted_at: Instant::now(),
                },
            )
            .is_some()
    }

    /// Get the key for an address.
    ///
    /// Returns `None` if not cached or expired.
    pub fn get(&mut self, address: &str) -> Option<SecretKey> {
        let key = normalize_address(address);
        if let Some(entry) = self.entries.get(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.secret.clone());
            }
            // Expired, evict.
            self.entries.pop(&key);
        }
        None
    }

    /// Remove the entry for an address. Returns the number removed.
    pub fn remove(&mut self, address: &str) -> usize {
        usize::from(self.entries.pop(&normalize_address(address)).is_some())
    }

    /// Remove all entries. Returns the number removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
