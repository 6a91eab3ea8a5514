// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::attestation::AttestationError;
use crate::blockchain::SigningError;
use crate::config::ConfigError;
use crate::custody::CustodyError;
use crate::protocol::CommunicationError;
use crate::transport::MAX_FRAME_LEN;

/// Any error an enclave operation can produce.
///
/// Rendered with `Display` into `Response.error` at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum EnclaveError {
    #[error(transparent)]
    Custody(#[from] CustodyError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Attestation(#[from] AttestationError),

    #[error(transparent)]
    Communication(#[from] CommunicationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error reply of the development HTTP transport.
///
/// Only envelope problems become HTTP errors. Operation failures travel
/// inside a `200` response as `{ success: false, error }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<CommunicationError> for ApiError {
    fn from(err: CommunicationError) -> Self {
        let status = match err {
            CommunicationError::MalformedMessage(_) | CommunicationError::UnknownOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            CommunicationError::ChannelNotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            CommunicationError::TransportFailure(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        let status = rejection.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::new(status, format!("message exceeds {MAX_FRAME_LEN} bytes"))
        } else {
            Self::new(status, rejection.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn component_errors_keep_their_message() {
        let err: EnclaveError = CustodyError::NotInitialized.into();
        assert_eq!(err.to_string(), "Key custodian not initialized");

        let err: EnclaveError = CommunicationError::UnknownOperation("x".to_string()).into();
        assert_eq!(err.to_string(), "unknown operation");

        let err: EnclaveError = SigningError::AmbiguousFeeModel.into();
        assert!(err.to_string().starts_with("Ambiguous fee model"));
    }

    #[test]
    fn communication_errors_map_to_status() {
        let malformed: ApiError = CommunicationError::MalformedMessage("eof".to_string()).into();
        assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
        assert_eq!(malformed.message, "Malformed message: eof");

        let transport: ApiError = CommunicationError::TransportFailure("reset".to_string()).into();
        assert_eq!(transport.status, StatusCode::BAD_GATEWAY);

        let closed: ApiError = CommunicationError::ChannelNotInitialized.into();
        assert_eq!(closed.status, StatusCode::SERVICE_UNAVAILABLE);

        assert_eq!(
            ApiError::internal("boom").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::new(StatusCode::BAD_REQUEST, "bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }
}
