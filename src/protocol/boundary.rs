// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request dispatch and the diagnostic outbox.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;

use super::handlers;
use super::message::{Message, Request, Response};
use super::operation::Operation;
use crate::error::EnclaveError;
use crate::state::EnclaveState;

/// Responses kept for diagnostics.
pub const OUTBOX_CAPACITY: usize = 64;

/// Enclave side of the boundary.
///
/// Requests are handled one at a time: a reconstruction and the signature
/// that follows it see the same cache.
#[derive(Debug)]
pub struct Boundary {
    state: EnclaveState,
    in_flight: Mutex<()>,
    outbox: Mutex<VecDeque<Message>>,
}

impl Boundary {
    pub fn new(state: EnclaveState) -> Self {
        Self {
            state,
            in_flight: Mutex::new(()),
            outbox: Mutex::new(VecDeque::with_capacity(OUTBOX_CAPACITY)),
        }
    }

    pub fn state(&self) -> &EnclaveState {
        &self.state
    }

    /// Answer one inbound message.
    ///
    /// Never fails: every problem becomes a response with `success: false`.
    pub fn handle(&self, message: Message) -> Message {
        let response = match message {
            Message::Request(request) => self.handle_request(request),
            Message::Response(response) => {
                tracing::warn!(request_id = %response.id, "Rejected inbound response message");
                Response::failure(response.id, "expected a request message")
            }
        };
        let reply = Message::Response(response);
        self.record(reply.clone());
        reply
    }

    pub fn handle_request(&self, request: Request) -> Response {
        let Request {
            id,
            operation,
            params,
            ..
        } = request;

        let result = Operation::parse(&operation, params)
            .map_err(EnclaveError::from)
            .and_then(|op| {
                let _guard = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
                self.dispatch(op)
            });

        match result {
            Ok(data) => {
                tracing::debug!(request_id = %id, operation = %operation, "Request succeeded");
                Response::success(id, data)
            }
            Err(e) => {
                tracing::warn!(request_id = %id, operation = %operation, error = %e, "Request failed");
                Response::failure(id, e.to_string())
            }
        }
    }

    fn dispatch(&self, operation: Operation) -> Result<Value, EnclaveError> {
        let state = &self.state;
        match operation {
            Operation::GenerateKeys(params) => to_value(handlers::generate_keys(state, params)?),
            Operation::ReconstructKey(params) => to_value(handlers::reconstruct_key(state, params)?),
            Operation::SignTransaction(params) => {
                to_value(handlers::sign_transaction(state, params)?)
            }
            Operation::SignMessage(params) => to_value(handlers::sign_message(state, params)?),
            Operation::GetAttestation(params) => to_value(handlers::get_attestation(state, params)?),
            Operation::VerifyAttestation(params) => {
                to_value(handlers::verify_attestation(state, params)?)
            }
            Operation::ClearKeys(params) => to_value(handlers::clear_keys(state, params)?),
            Operation::Health => to_value(handlers::health(state)),
            Operation::Ping => to_value(handlers::ping()),
        }
    }

    fn outbox(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, message: Message) {
        let mut outbox = self.outbox();
        if outbox.len() == OUTBOX_CAPACITY {
            outbox.pop_front();
        }
        outbox.push_back(message);
    }

    /// Pop the oldest recorded response.
    pub fn get_message(&self) -> Option<Message> {
        self.outbox().pop_front()
    }

    /// Empty the outbox. Returns the number of messages dropped.
    pub fn clear_queue(&self) -> usize {
        let mut outbox = self.outbox();
        let count = outbox.len();
        outbox.clear();
        count
    }

    pub fn queue_len(&self) -> usize {
        self.outbox().len()
    }
}

fn to_value<T: Serialize>(result: T) -> Result<Value, EnclaveError> {
    serde_json::to_value(result).map_err(|e| EnclaveError::Internal(e.to_string()))
}
