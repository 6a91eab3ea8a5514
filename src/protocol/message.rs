// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire envelope exchanged across the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message on the wire, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    /// Correlation id.
    pub fn id(&self) -> &str {
        match self {
            Message::Request(request) => &request.id,
            Message::Response(response) => &response.id,
        }
    }
}

/// `{ kind: "request", id, operation, params, issuedAt }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: String,
    pub operation: String,
    #[serde(default)]
    pub params: Value,
    pub issued_at: DateTime<Utc>,
}

impl Request {
    /// New request with a random id, stamped now.
    pub fn new(operation: impl Into<String>, params: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            params,
            issued_at: Utc::now(),
        }
    }
}

/// `{ kind: "response", id, success, data?, error?, issuedAt }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl Response {
    pub fn success(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            success: true,
            data: Some(data),
            error: None,
            issued_at: Utc::now(),
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            issued_at: Utc::now(),
        }
    }
}
