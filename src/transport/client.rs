// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Host-side client for the enclave boundary.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::protocol::{Boundary, CommunicationError, Message, Request, Response};

/// A request/response link to the enclave.
pub trait Channel: Send + Sync {
    /// Deliver `message` and return the enclave's reply.
    fn exchange(
        &self,
        message: Message,
    ) -> impl Future<Output = Result<Message, CommunicationError>> + Send;
}

/// Channel to a boundary living in the same process.
#[derive(Clone, Debug)]
pub struct LocalChannel {
    boundary: Arc<Boundary>,
}

impl LocalChannel {
    pub fn new(boundary: Arc<Boundary>) -> Self {
        Self { boundary }
    }
}

impl Channel for LocalChannel {
    async fn exchange(&self, message: Message) -> Result<Message, CommunicationError> {
        Ok(self.boundary.handle(message))
    }
}

/// Issues requests and matches each reply to its request id.
///
/// The client adds no timeout or retry. Callers that need them wrap
/// [`EnclaveClient::call`] themselves.
#[derive(Debug)]
pub struct EnclaveClient<C> {
    channel: Option<C>,
}

impl<C> Default for EnclaveClient<C> {
    fn default() -> Self {
        Self { channel: None }
    }
}

impl<C: Channel> EnclaveClient<C> {
    /// Client with no channel yet. Calls fail until [`connect`](Self::connect).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(channel: C) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    pub fn connect(&mut self, channel: C) {
        self.channel = Some(channel);
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Send `operation` with `params` and wait for the matching response.
    ///
    /// A response with `success: false` is returned as `Ok`; only channel
    /// problems are errors.
    pub async fn call(
        &self,
        operation: &str,
        params: Value,
    ) -> Result<Response, CommunicationError> {
        self.send(Request::new(operation, params)).await
    }

    pub async fn send(&self, request: Request) -> Result<Response, CommunicationError> {
        let channel = self
            .channel
            .as_ref()
            .ok_or(CommunicationError::ChannelNotInitialized)?;

        let id = request.id.clone();
        let operation = request.operation.clone();
        let reply = channel.exchange(Message::Request(request)).await?;

        match reply {
            Message::Response(response) if response.id == id => {
                tracing::debug!(
                    request_id = %id,
                    operation = %operation,
                    success = response.success,
                    "Received enclave response"
                );
                Ok(response)
            }
            Message::Response(response) => Err(CommunicationError::TransportFailure(format!(
                "response id {} does not match request id {id}",
                response.id
            ))),
            Message::Request(_) => Err(CommunicationError::TransportFailure(
                "enclave replied with a request".to_string(),
            )),
        }
    }
}
