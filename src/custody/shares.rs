// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Threshold secret splitting (Shamir over GF(256)).
//!
//! A 32-byte private key is split into N shares, any T of which recover it.
//! Fewer than T shares reveal nothing about the key. Recovery checks an
//! embedded digest, so a wrong or short share set fails instead of producing
//! a different key.

use std::collections::BTreeMap;
use std::fmt;

use bc_rand::SecureRandomNumberGenerator;
use bc_shamir::{recover_secret, split_secret};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::CustodyError;

/// Smallest threshold that still protects the key.
pub const MIN_THRESHOLD: usize = 2;

/// Upper bound on shares supported by the sharing scheme.
pub const MAX_SHARE_COUNT: usize = 16;

/// Who holds a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    /// Kept by the enclave itself.
    Custodian,
    /// Handed to the wallet owner.
    Owner,
    /// Handed to a backup holder.
    Backup,
}

impl ShareRole {
    /// Role assigned to the share at `index` of a fresh split.
    pub fn for_index(index: usize) -> Self {
        match index {
            0 => ShareRole::Custodian,
            1 => ShareRole::Owner,
            _ => ShareRole::Backup,
        }
    }
}

/// One share of a split key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    /// Position of the share in the split (x-coordinate).
    pub index: usize,
    /// Share bytes, hex encoded.
    pub payload: String,
    /// Holder of the share. Optional on input; recovery ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ShareRole>,
}

impl Share {
    fn decode_payload(&self) -> Result<Zeroizing<Vec<u8>>, CustodyError> {
        alloy::hex::decode(self.payload.trim())
            .map(Zeroizing::new)
            .map_err(|e| {
                CustodyError::InvalidReconstruction(format!(
                    "share {} payload is not valid hex: {e}",
                    self.index
                ))
            })
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("role", &self.role)
            .field("payload", &"<redacted>")
            .finish()
    }
}

/// Ordered shares produced by a single split.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareSet {
    pub threshold: usize,
    pub shares: Vec<Share>,
}

impl ShareSet {
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Share> {
        self.shares.iter()
    }

    /// Clone the shares at the given positions.
    pub fn select(&self, indices: &[usize]) -> Vec<Share> {
        indices
            .iter()
            .filter_map(|i| self.shares.get(*i).cloned())
            .collect()
    }

    /// Share held by the given role (first match).
    pub fn by_role(&self, role: ShareRole) -> Option<&Share> {
        self.shares.iter().find(|s| s.role == Some(role))
    }
}

/// Validate a `(threshold, share_count)` pair.
pub fn validate_parameters(threshold: usize, share_count: usize) -> Result<(), CustodyError> {
    if threshold < MIN_THRESHOLD {
        return Err(CustodyError::InvalidParameters(format!(
            "threshold must be at least {MIN_THRESHOLD}, got {threshold}"
        )));
    }
    if threshold > share_count {
        return Err(CustodyError::InvalidParameters(format!(
            "threshold {threshold} exceeds share count {share_count}"
        )));
    }
    if share_count > MAX_SHARE_COUNT {
        return Err(CustodyError::InvalidParameters(format!(
            "share count {share_count} exceeds maximum of {MAX_SHARE_COUNT}"
        )));
    }
    Ok(())
}

/// Split `secret` into `share_count` shares with the given threshold.
pub fn split(secret: &[u8], threshold: usize, share_count: usize) -> Result<ShareSet, CustodyError> {
    validate_parameters(threshold, share_count)?;

    let mut rng = SecureRandomNumberGenerator;
    let raw = Zeroizing::new(
        split_secret(threshold, share_count, secret, &mut rng)
            .map_err(|e| CustodyError::InvalidParameters(e.to_string()))?,
    );

    let shares = raw
        .iter()
        .enumerate()
        .map(|(index, bytes)| Share {
            index,
            payload: alloy::hex::encode(bytes),
            role: Some(ShareRole::for_index(index)),
        })
        .collect();

    Ok(ShareSet { threshold, shares })
}

/// Recover a secret from at least `minimum` distinct shares.
///
/// Duplicate indices count once. A share set that passes the count check but
/// does not belong together fails the scheme's digest check and is reported
/// as `InvalidReconstruction`.
pub fn combine(shares: &[Share], minimum: usize) -> Result<Zeroizing<Vec<u8>>, CustodyError> {
    if minimum < MIN_THRESHOLD {
        return Err(CustodyError::InvalidParameters(format!(
            "reconstruction minimum must be at least {MIN_THRESHOLD}, got {minimum}"
        )));
    }

    let mut distinct: BTreeMap<usize, &Share> = BTreeMap::new();
    for share in shares {
        distinct.entry(share.index).or_insert(share);
    }

    if distinct.len() < minimum {
        return Err(CustodyError::InsufficientShares {
            provided: distinct.len(),
            required: minimum,
        });
    }

    let mut indexes = Vec::with_capacity(distinct.len());
    let mut payloads: Zeroizing<Vec<Vec<u8>>> = Zeroizing::new(Vec::with_capacity(distinct.len()));
    for (index, share) in distinct {
        if index >= MAX_SHARE_COUNT {
            return Err(CustodyError::InvalidReconstruction(format!(
                "share index {index} out of range"
            )));
        }
        indexes.push(index);
        payloads.push(share.decode_payload()?.to_vec());
    }

    recover_secret(&indexes, payloads.as_slice())
        .map(Zeroizing::new)
        .map_err(|e| CustodyError::InvalidReconstruction(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 32] = [0x42; 32];

    #[test]
    fn split_produces_requested_share_count() {
        let set = split(&SECRET, 3, 5).unwrap();
        assert_eq!(set.len(), 5);
        assert_eq!(set.threshold, 3);
        for (i, share) in set.iter().enumerate() {
            assert_eq!(share.index, i);
        }
    }

    #[test]
    fn roles_follow_index() {
        let set = split(&SECRET, 2, 4).unwrap();
        assert_eq!(set.shares[0].role, Some(ShareRole::Custodian));
        assert_eq!(set.shares[1].role, Some(ShareRole::Owner));
        assert_eq!(set.shares[2].role, Some(ShareRole::Backup));
        assert_eq!(set.shares[3].role, Some(ShareRole::Backup));
        assert_eq!(set.by_role(ShareRole::Owner).map(|s| s.index), Some(1));
    }

    #[test]
    fn every_threshold_subset_recovers() {
        for share_count in 2..=5 {
            for threshold in 2..=share_count {
                let set = split(&SECRET, threshold, share_count).unwrap();
                // sliding windows of exactly `threshold` shares
                for start in 0..=(share_count - threshold) {
                    let subset: Vec<usize> = (start..start + threshold).collect();
                    let recovered = combine(&set.select(&subset), threshold).unwrap();
                    assert_eq!(recovered.as_slice(), &SECRET);
                }
            }
        }
    }

    #[test]
    fn non_contiguous_subset_recovers() {
        let set = split(&SECRET, 3, 5).unwrap();
        let recovered = combine(&set.select(&[0, 2, 4]), 3).unwrap();
        assert_eq!(recovered.as_slice(), &SECRET);
    }

    #[test]
    fn below_minimum_is_insufficient() {
        let set = split(&SECRET, 3, 5).unwrap();
        let err = combine(&set.select(&[0, 1]), 3).unwrap_err();
        assert_eq!(
            err,
            CustodyError::InsufficientShares {
                provided: 2,
                required: 3
            }
        );
    }

    #[test]
    fn duplicate_indices_count_once() {
        let set = split(&SECRET, 3, 5).unwrap();
        let err = combine(&set.select(&[0, 1, 1]), 3).unwrap_err();
        assert!(matches!(err, CustodyError::InsufficientShares { provided: 2, .. }));
    }

    #[test]
    fn too_few_shares_for_real_threshold_fail_validation() {
        // Caller claims a minimum of 2 but the split used 3.
        let set = split(&SECRET, 3, 5).unwrap();
        let err = combine(&set.select(&[0, 1]), 2).unwrap_err();
        assert!(matches!(err, CustodyError::InvalidReconstruction(_)));
    }

    #[test]
    fn shares_from_different_splits_do_not_mix() {
        let a = split(&SECRET, 2, 3).unwrap();
        let b = split(&[0x17; 32], 2, 3).unwrap();
        let mixed = vec![a.shares[0].clone(), b.shares[1].clone()];
        assert!(matches!(
            combine(&mixed, 2),
            Err(CustodyError::InvalidReconstruction(_))
        ));
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(matches!(split(&SECRET, 1, 3), Err(CustodyError::InvalidParameters(_))));
        assert!(matches!(split(&SECRET, 4, 3), Err(CustodyError::InvalidParameters(_))));
        assert!(matches!(split(&SECRET, 2, 17), Err(CustodyError::InvalidParameters(_))));
        assert!(matches!(combine(&[], 1), Err(CustodyError::InvalidParameters(_))));
    }

    #[test]
    fn rejects_malformed_payload() {
        let mut shares = split(&SECRET, 2, 3).unwrap().shares;
        shares[0].payload = "not-hex".to_string();
        assert!(matches!(
            combine(&shares[..2], 2),
            Err(CustodyError::InvalidReconstruction(_))
        ));
    }

    #[test]
    fn shares_differ_from_secret_and_each_other() {
        let set = split(&SECRET, 2, 4).unwrap();
        let secret_hex = alloy::hex::encode(SECRET);
        for i in 0..set.len() {
            assert_ne!(set.shares[i].payload, secret_hex);
            for j in (i + 1)..set.len() {
                assert_ne!(set.shares[i].payload, set.shares[j].payload);
            }
        }
    }

    #[test]
    fn debug_redacts_payload() {
        let set = split(&SECRET, 2, 3).unwrap();
        let rendered = format!("{:?}", set.shares[0]);
        assert!(!rendered.contains(&set.shares[0].payload));
    }
}
