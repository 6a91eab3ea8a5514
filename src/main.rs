// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use enclave_custody::config::{EnclaveConfig, EnclaveMode};
use enclave_custody::protocol::Boundary;
use enclave_custody::state::EnclaveState;
use enclave_custody::{telemetry, transport};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match EnclaveConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Refusing to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init(config.log_format) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let state = match EnclaveState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, mode = %config.mode, "Refusing to start");
            return ExitCode::FAILURE;
        }
    };
    let boundary = Arc::new(Boundary::new(state));

    let result = match config.mode {
        EnclaveMode::Production => run_vsock(config.vsock_port, boundary).await,
        EnclaveMode::Development => {
            tracing::warn!("Development mode: attestation is placeholder data");
            transport::http::serve(config.dev_bind_addr, boundary, shutdown_signal())
                .await
                .map_err(|e| e.to_string())
        }
    };

    match result {
        Ok(()) => {
            tracing::info!("Enclave stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Enclave transport failed");
            ExitCode::FAILURE
        }
    }
}

/// Serve vsock on a dedicated thread until it fails or a signal arrives.
#[cfg(target_os = "linux")]
async fn run_vsock(port: u32, boundary: Arc<Boundary>) -> Result<(), String> {
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    std::thread::Builder::new()
        .name("vsock-server".to_string())
        .spawn(move || {
            let _ = done_tx.send(transport::vsock::serve(port, &boundary));
        })
        .map_err(|e| format!("failed to start vsock thread: {e}"))?;

    tokio::select! {
        outcome = done_rx => match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("vsock server thread exited unexpectedly".to_string()),
        },
        () = shutdown_signal() => Ok(()),
    }
}

#[cfg(not(target_os = "linux"))]
async fn run_vsock(_port: u32, _boundary: Arc<Boundary>) -> Result<(), String> {
    Err("the vsock transport is only available on Linux".to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
