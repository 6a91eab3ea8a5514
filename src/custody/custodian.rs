// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The key custodian: generation, splitting, reconstruction and the
//! reconstructed-key cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use k256::SecretKey;
use serde::{Deserialize, Serialize};

use super::cache::KeyCache;
use super::keys::{normalize_address, KeyPair, WalletIdentity};
use super::shares::{self, Share, ShareSet};
use super::CustodyError;

/// Threshold and share count used for every wallet this enclave creates.
///
/// The same threshold is the minimum enforced at reconstruction, so shares
/// are always recombined under the policy they were split with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustodyPolicy {
    pub threshold: usize,
    pub share_count: usize,
}

impl CustodyPolicy {
    pub fn new(threshold: usize, share_count: usize) -> Result<Self, CustodyError> {
        shares::validate_parameters(threshold, share_count)?;
        Ok(Self {
            threshold,
            share_count,
        })
    }
}

impl Default for CustodyPolicy {
    /// 2-of-3: custodian, owner, backup.
    fn default() -> Self {
        Self {
            threshold: 2,
            share_count: 3,
        }
    }
}

/// Owns key generation and the reconstructed-key cache.
///
/// Every cache access goes through one mutex, so reads and writes of key
/// material are serialized per request.
#[derive(Debug)]
pub struct KeyCustodian {
    initialized: AtomicBool,
    cache: Mutex<KeyCache>,
}

impl KeyCustodian {
    /// Create an uninitialized custodian. Call `initialize()` before use.
    pub fn new(cache_capacity: usize, cache_ttl: Duration) -> Self {
        Self {
            initialized: AtomicBool::new(false),
            cache: Mutex::new(KeyCache::new(cache_capacity, cache_ttl)),
        }
    }

    /// Mark the custodian ready. Safe to call more than once.
    pub fn initialize(&self) {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            tracing::info!("Key custodian initialized");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn cache(&self) -> MutexGuard<'_, KeyCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generate a fresh key pair from the OS entropy source.
    pub fn generate(&self) -> Result<KeyPair, CustodyError> {
        if !self.is_initialized() {
            return Err(CustodyError::NotInitialized);
        }
        Ok(KeyPair::generate())
    }

    /// Split a private key into `share_count` shares with the given threshold.
    pub fn split(
        &self,
        key_pair: &KeyPair,
        threshold: usize,
        share_count: usize,
    ) -> Result<ShareSet, CustodyError> {
        shares::split(key_pair.secret_bytes().as_ref(), threshold, share_count)
    }

    /// Generate a key and split it under `policy`.
    ///
    /// The key pair is dropped before returning; only the identity and the
    /// shares leave this function.
    pub fn create_wallet(
        &self,
        policy: CustodyPolicy,
    ) -> Result<(WalletIdentity, ShareSet), CustodyError> {
        let key_pair = self.generate()?;
        let share_set = self.split(&key_pair, policy.threshold, policy.share_count)?;
        let identity = key_pair.identity();

        tracing::info!(
            wallet_address = %identity.address,
            threshold = policy.threshold,
            share_count = policy.share_count,
            "Generated and split wallet key"
        );

        Ok((identity, share_set))
    }

    /// Recombine shares, validate the result and cache it by address.
    ///
    /// `minimum` is the threshold the shares were split with. Returns the
    /// wallet identity; the private key stays in the cache.
    pub fn reconstruct(
        &self,
        shares: &[Share],
        minimum: usize,
    ) -> Result<WalletIdentity, CustodyError> {
        let key_pair = recombine(shares, minimum)?;
        Ok(self.cache_key(&key_pair, shares.len()))
    }

    /// Like [`reconstruct`](Self::reconstruct), but only caches the key if it
    /// belongs to `expected_address`.
    ///
    /// Shares for any other wallet fail with `InvalidReconstruction` and
    /// leave the cache untouched.
    pub fn reconstruct_for(
        &self,
        expected_address: &str,
        shares: &[Share],
        minimum: usize,
    ) -> Result<WalletIdentity, CustodyError> {
        let key_pair = recombine(shares, minimum)?;
        let identity = key_pair.identity();
        if normalize_address(&identity.address) != normalize_address(expected_address) {
            tracing::warn!(
                wallet_address = %expected_address,
                "Shares reconstruct a different wallet"
            );
            return Err(CustodyError::InvalidReconstruction(format!(
                "shares belong to {}, not {expected_address}",
                identity.address
            )));
        }
        Ok(self.cache_key(&key_pair, shares.len()))
    }

    fn cache_key(&self, key_pair: &KeyPair, share_count: usize) -> WalletIdentity {
        let identity = key_pair.identity();
        let replaced = self.cache().insert(&identity.address, key_pair.secret().clone());

        tracing::info!(
            wallet_address = %identity.address,
            shares = share_count,
            replaced,
            "Reconstructed wallet key"
        );

        identity
    }

    /// Cached private key for an address, if present and not expired.
    pub fn get_cached(&self, address: &str) -> Option<SecretKey> {
        self.cache().get(address)
    }

    /// Drop the cached key for an address. Returns the number cleared.
    pub fn clear(&self, address: &str) -> usize {
        let cleared = self.cache().remove(address);
        tracing::debug!(wallet_address = %address, cleared, "Cleared cached key");
        cleared
    }

    /// Drop every cached key. Returns the number cleared.
    pub fn clear_all(&self) -> usize {
        let cleared = self.cache().clear();
        tracing::debug!(cleared, "Cleared key cache");
        cleared
    }

    pub fn cached_count(&self) -> usize {
        self.cache().len()
    }
}

/// Combine shares and check the result is a usable secp256k1 key.
fn recombine(shares: &[Share], minimum: usize) -> Result<KeyPair, CustodyError> {
    let secret = shares::combine(shares, minimum)?;
    KeyPair::from_slice(secret.as_slice()).map_err(|_| {
        CustodyError::InvalidReconstruction("recovered bytes are not a valid key".to_string())
    })
}

impl Default for KeyCustodian {
    fn default() -> Self {
        Self::new(256, Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> KeyCustodian {
        let custodian = KeyCustodian::default();
        custodian.initialize();
        custodian
    }

    #[test]
    fn generate_requires_initialization() {
        let custodian = KeyCustodian::default();
        assert_eq!(custodian.generate().unwrap_err(), CustodyError::NotInitialized);

        custodian.initialize();
        assert!(custodian.generate().is_ok());
    }

    #[test]
    fn three_of_five_reconstructs_from_spread_indices() {
        let custodian = ready();
        let key_pair = custodian.generate().unwrap();
        let share_set = custodian.split(&key_pair, 3, 5).unwrap();

        let identity = custodian
            .reconstruct(&share_set.select(&[0, 2, 4]), 3)
            .unwrap();
        assert_eq!(identity, key_pair.identity());

        let cached = custodian.get_cached(&identity.address).unwrap();
        assert_eq!(cached.to_bytes(), key_pair.secret().to_bytes());
    }

    #[test]
    fn two_of_five_shares_are_insufficient() {
        let custodian = ready();
        let key_pair = custodian.generate().unwrap();
        let share_set = custodian.split(&key_pair, 3, 5).unwrap();

        let err = custodian
            .reconstruct(&share_set.select(&[0, 1]), 3)
            .unwrap_err();
        assert!(matches!(err, CustodyError::InsufficientShares { .. }));
        assert_eq!(custodian.cached_count(), 0);
    }

    #[test]
    fn split_rejects_invalid_parameters() {
        let custodian = ready();
        let key_pair = custodian.generate().unwrap();
        assert!(matches!(
            custodian.split(&key_pair, 4, 3),
            Err(CustodyError::InvalidParameters(_))
        ));
        assert!(matches!(
            custodian.split(&key_pair, 1, 3),
            Err(CustodyError::InvalidParameters(_))
        ));
    }

    #[test]
    fn create_wallet_uses_policy() {
        let custodian = ready();
        let (identity, share_set) = custodian.create_wallet(CustodyPolicy::default()).unwrap();
        assert_eq!(share_set.len(), 3);
        assert_eq!(share_set.threshold, 2);
        // Nothing is cached until reconstruction
        assert!(custodian.get_cached(&identity.address).is_none());

        let rebuilt = custodian.reconstruct(&share_set.select(&[1, 2]), 2).unwrap();
        assert_eq!(rebuilt, identity);
    }

    #[test]
    fn reconstruction_overwrites_previous_entry() {
        let custodian = ready();
        let (identity, share_set) = custodian.create_wallet(CustodyPolicy::default()).unwrap();

        custodian.reconstruct(&share_set.select(&[0, 1]), 2).unwrap();
        custodian.reconstruct(&share_set.select(&[1, 2]), 2).unwrap();
        assert_eq!(custodian.cached_count(), 1);
        assert!(custodian.get_cached(&identity.address).is_some());
    }

    #[test]
    fn clear_and_clear_all_are_idempotent() {
        let custodian = ready();
        let (a, shares_a) = custodian.create_wallet(CustodyPolicy::default()).unwrap();
        let (_, shares_b) = custodian.create_wallet(CustodyPolicy::default()).unwrap();
        custodian.reconstruct(&shares_a.shares, 2).unwrap();
        custodian.reconstruct(&shares_b.shares, 2).unwrap();

        assert_eq!(custodian.clear(&a.address), 1);
        assert_eq!(custodian.clear(&a.address), 0);
        assert_eq!(custodian.clear_all(), 1);
        assert_eq!(custodian.clear_all(), 0);
    }

    #[test]
    fn reconstruct_for_checks_the_wallet_before_caching() {
        let custodian = ready();
        let (a, _) = custodian.create_wallet(CustodyPolicy::default()).unwrap();
        let (b, shares_b) = custodian.create_wallet(CustodyPolicy::default()).unwrap();

        let err = custodian
            .reconstruct_for(&a.address, &shares_b.shares, 2)
            .unwrap_err();
        assert!(matches!(err, CustodyError::InvalidReconstruction(_)));
        assert_eq!(custodian.cached_count(), 0);

        let identity = custodian
            .reconstruct_for(&b.address.to_lowercase(), &shares_b.shares, 2)
            .unwrap();
        assert_eq!(identity, b);
        assert!(custodian.get_cached(&b.address).is_some());
    }

    #[test]
    fn policy_validates_parameters() {
        assert!(CustodyPolicy::new(3, 5).is_ok());
        assert!(CustodyPolicy::new(1, 3).is_err());
        assert!(CustodyPolicy::new(4, 3).is_err());
    }
}
