// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave Custody - Threshold Key Custody & Attested Signing
//!
//! Runs inside an isolated enclave. Private keys are generated in-enclave,
//! split into threshold shares that leave the enclave, and only recombined
//! in memory to sign EVM transactions. The host reaches it through a
//! request/response boundary and can ask for attestation evidence of what
//! code is running.
//!
//! ## Modules
//!
//! - `custody` - Key generation, Shamir splitting and the reconstructed key cache
//! - `blockchain` - EVM transaction and message signing
//! - `attestation` - Measurements and attestation documents (Nitro or development)
//! - `protocol` - Message envelope, operations and dispatch
//! - `transport` - vsock, HTTP and the host-side client

pub mod attestation;
pub mod blockchain;
pub mod config;
pub mod custody;
pub mod error;
pub mod protocol;
pub mod state;
pub mod telemetry;
pub mod transport;
