// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM transaction signing.
//!
//! This module provides:
//! - Legacy (EIP-155) and fee-market (EIP-1559) transaction signing
//! - Personal message signing and verification
//! - Local gas estimation and fee calculation

pub mod signing;
pub mod types;
pub mod units;

pub use signing::TransactionSigner;
pub use types::*;
