// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Communication Boundary
//!
//! The request/response protocol between the untrusted host and the enclave.
//! Every inbound request is parsed into an [`Operation`], dispatched to the
//! custodian, signer or attestation provider, and answered with a response
//! carrying the same `id`. Errors never cross the boundary as failures of the
//! protocol itself; they become `{ success: false, error }`.

pub mod boundary;
pub mod handlers;
pub mod message;
pub mod operation;

pub use boundary::{Boundary, OUTBOX_CAPACITY};
pub use message::{Message, Request, Response};
pub use operation::Operation;

/// Errors on the channel between host and enclave.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommunicationError {
    #[error("Channel not initialized")]
    ChannelNotInitialized,

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Carries the offending name for logs; the wire text is fixed.
    #[error("unknown operation")]
    UnknownOperation(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}
