// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Development transport: the boundary over plain HTTP.
//!
//! | Method | Path          | Body                 |
//! |--------|---------------|----------------------|
//! | POST   | `/v1/message` | JSON `Message`       |
//! | GET    | `/health`     | none                 |
//!
//! Only for running outside an enclave. Nothing here is authenticated or
//! encrypted.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use url::Url;

use super::client::Channel;
use super::frame::{self, MAX_FRAME_LEN};
use crate::error::ApiError;
use crate::protocol::{handlers, operation::HealthResult, Boundary, CommunicationError, Message};

const MESSAGE_PATH: &str = "v1/message";
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn router(boundary: Arc<Boundary>) -> Router {
    Router::new()
        .route("/v1/message", post(post_message))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_FRAME_LEN))
        .layer(TraceLayer::new_for_http())
        .with_state(boundary)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, boundary: Arc<Boundary>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Development HTTP transport listening");
    axum::serve(listener, router(boundary))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn post_message(
    State(boundary): State<Arc<Boundary>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Message>, ApiError> {
    let message = frame::decode(&body?)?;

    let reply = tokio::task::spawn_blocking(move || boundary.handle(message))
        .await
        .map_err(|e| ApiError::internal(format!("request handler failed: {e}")))?;
    Ok(Json(reply))
}

async fn health(State(boundary): State<Arc<Boundary>>) -> Json<HealthResult> {
    Json(handlers::health(boundary.state()))
}

/// Host-side channel to the development HTTP transport.
#[derive(Clone, Debug)]
pub struct HttpChannel {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpChannel {
    /// `base` is the server root, e.g. `http://127.0.0.1:8088/`.
    pub fn new(base: &str) -> Result<Self, CommunicationError> {
        let base = Url::parse(base)
            .map_err(|e| CommunicationError::TransportFailure(format!("invalid base url: {e}")))?;
        let endpoint = base
            .join(MESSAGE_PATH)
            .map_err(|e| CommunicationError::TransportFailure(format!("invalid base url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .map_err(|e| CommunicationError::TransportFailure(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Channel for HttpChannel {
    async fn exchange(&self, message: Message) -> Result<Message, CommunicationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&message)
            .send()
            .await
            .map_err(|e| CommunicationError::TransportFailure(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(CommunicationError::TransportFailure(format!(
                "HTTP {status} from enclave: {detail}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CommunicationError::MalformedMessage(e.to_string()))
    }
}
