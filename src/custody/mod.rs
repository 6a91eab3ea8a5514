// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Custody
//!
//! Private keys are generated inside the enclave, split into threshold
//! shares and handed to distinct holders. A full key only exists in memory,
//! in the custodian's short-lived cache, after shares are recombined.
//!
//! ```text
//!   generate ──► KeyPair ──► split(T, N) ──► [custodian, owner, backup…]
//!                                                   │
//!                          reconstruct(≥T shares) ◄─┘
//!                                   │
//!                                   ▼
//!                        KeyCache: address → key (TTL)
//! ```

pub mod cache;
pub mod custodian;
pub mod keys;
pub mod shares;

pub use cache::KeyCache;
pub use custodian::{CustodyPolicy, KeyCustodian};
pub use keys::{derive_address, KeyPair, WalletIdentity};
pub use shares::{Share, ShareRole, ShareSet, MAX_SHARE_COUNT, MIN_THRESHOLD};

/// Errors from key custody operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustodyError {
    #[error("Key custodian not initialized")]
    NotInitialized,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Insufficient shares: {provided} provided, {required} required")]
    InsufficientShares { provided: usize, required: usize },

    #[error("Invalid reconstruction: {0}")]
    InvalidReconstruction(String),
}
