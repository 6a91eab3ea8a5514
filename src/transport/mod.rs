// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Carriers for boundary messages.
//!
//! - [`vsock`]: production, length-prefixed frames over AF_VSOCK (Linux only)
//! - [`http`]: development, JSON over HTTP
//! - [`client`]: host-side [`EnclaveClient`] over any [`Channel`]

pub mod client;
pub mod frame;
pub mod http;
#[cfg(target_os = "linux")]
pub mod vsock;

pub use client::{Channel, EnclaveClient, LocalChannel};
pub use frame::MAX_FRAME_LEN;
pub use http::HttpChannel;
#[cfg(target_os = "linux")]
pub use vsock::VsockChannel;
