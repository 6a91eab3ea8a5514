// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! secp256k1 key generation and wallet identity derivation.
//!
//! Keys are drawn from the OS entropy source inside the enclave. A `KeyPair`
//! lives only as long as it takes to split or sign with it.

use std::fmt;

use alloy::primitives::{keccak256, Address};
use k256::elliptic_curve::rand_core::{OsRng, RngCore};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Length of a raw secp256k1 private key.
pub const PRIVATE_KEY_LEN: usize = 32;

/// A secp256k1 private/public key pair.
///
/// The secret is zeroized on drop by `k256`. `Debug` never prints it.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Draw 32 bytes from the OS entropy source and derive a key pair.
    ///
    /// Retries in the (negligible) case that the bytes are not a valid
    /// scalar (zero or above the curve order).
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        loop {
            OsRng.fill_bytes(bytes.as_mut());
            if let Ok(key_pair) = Self::from_slice(bytes.as_ref()) {
                return key_pair;
            }
        }
    }

    /// Derive a key pair from raw private key bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, k256::elliptic_curve::Error> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(k256::elliptic_curve::Error);
        }
        SecretKey::from_slice(bytes).map(Self::from_secret)
    }

    /// Wrap an existing secret key.
    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Raw private key bytes, zeroized when dropped.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
        let mut out = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    pub fn address(&self) -> Address {
        derive_address(&self.public)
    }

    pub fn identity(&self) -> WalletIdentity {
        WalletIdentity::from_public_key(&self.public)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Public identity of a wallet: its EVM address and public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletIdentity {
    /// EIP-55 checksummed address.
    pub address: String,
    /// Uncompressed SEC1 public key, 0x-prefixed hex (65 bytes).
    pub public_key: String,
}

impl WalletIdentity {
    pub fn from_public_key(public: &PublicKey) -> Self {
        let encoded = public.to_encoded_point(false);
        Self {
            address: derive_address(public).to_checksum(None),
            public_key: alloy::hex::encode_prefixed(encoded.as_bytes()),
        }
    }
}

/// Derive the EVM address of a public key.
///
/// keccak256 over the 64 bytes of the uncompressed point (without the 0x04
/// prefix), keeping the last 20 bytes.
pub fn derive_address(public: &PublicKey) -> Address {
    let encoded = public.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Normalize an address string for use as a lookup key.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}
