// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Production transport over AF_VSOCK.

use std::thread;
use std::time::Duration;

use vsock::{VsockListener, VsockStream};

use super::client::Channel;
use super::frame;
use crate::protocol::{Boundary, CommunicationError, Message};

/// Listen on every CID assigned to this instance.
pub const VMADDR_CID_ANY: u32 = u32::MAX;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Longest a peer may stall a read or write before its connection is dropped.
pub const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Accept connections on `port` forever, serving one at a time.
///
/// A peer that stalls longer than [`IO_TIMEOUT`] mid-frame or between
/// frames is disconnected so the next caller can be served.
///
/// Returns only if the listener cannot be bound.
pub fn serve(port: u32, boundary: &Boundary) -> Result<(), CommunicationError> {
    let listener = VsockListener::bind_with_cid_port(VMADDR_CID_ANY, port).map_err(|e| {
        CommunicationError::TransportFailure(format!("vsock bind on port {port} failed: {e}"))
    })?;
    tracing::info!(port, "Vsock transport listening");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .map(|addr| format!("{}:{}", addr.cid(), addr.port()))
                    .unwrap_or_else(|_| "unknown".to_string());
                tracing::debug!(peer = %peer, "Accepted vsock connection");
                if let Err(e) = set_timeouts(&stream) {
                    tracing::warn!(peer = %peer, error = %e, "Dropped vsock connection");
                    continue;
                }
                if let Err(e) = frame::serve_connection(stream, boundary) {
                    tracing::warn!(peer = %peer, error = %e, "Vsock connection ended with error");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Vsock accept failed");
                thread::sleep(ACCEPT_BACKOFF);
            }
        }
    }
    Ok(())
}

fn set_timeouts(stream: &VsockStream) -> Result<(), CommunicationError> {
    stream
        .set_read_timeout(Some(IO_TIMEOUT))
        .and_then(|()| stream.set_write_timeout(Some(IO_TIMEOUT)))
        .map_err(|e| CommunicationError::TransportFailure(format!("cannot set socket timeout: {e}")))
}

/// Host-side channel: one vsock connection per exchange.
#[derive(Clone, Copy, Debug)]
pub struct VsockChannel {
    cid: u32,
    port: u32,
}

impl VsockChannel {
    /// `cid` is the enclave's context id, assigned when it is launched.
    pub fn new(cid: u32, port: u32) -> Self {
        Self { cid, port }
    }
}

impl Channel for VsockChannel {
    async fn exchange(&self, message: Message) -> Result<Message, CommunicationError> {
        let Self { cid, port } = *self;
        let body = frame::encode(&message)?;

        tokio::task::spawn_blocking(move || {
            let mut stream = VsockStream::connect_with_cid_port(cid, port).map_err(|e| {
                CommunicationError::TransportFailure(format!(
                    "vsock connect to {cid}:{port} failed: {e}"
                ))
            })?;
            set_timeouts(&stream)?;
            frame::write_frame(&mut stream, &body)?;
            frame::read_message(&mut stream)
        })
        .await
        .map_err(|e| CommunicationError::TransportFailure(e.to_string()))?
    }
}
