// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Attestation
//!
//! Issues and verifies documents describing the measured state of the
//! enclave. Measurements are loaded once at `initialize()` and are read-only
//! afterwards.
//!
//! ## Trust levels
//!
//! Documents from the Nitro backend carry `trustLevel = hardware` and a
//! certificate chain rooted in the platform. Development documents carry
//! `trustLevel = development`, placeholder measurements and no chain.
//!
//! ## Limitations
//!
//! `verify` checks freshness and measurements only. The certificate chain is
//! NOT validated cryptographically; a caller that needs platform-rooted trust
//! must validate `rawDocument` against the vendor root itself.

pub mod backend;
pub mod measurements;

use std::sync::{Once, OnceLock};

use chrono::{DateTime, Duration, Utc};
use k256::elliptic_curve::rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

pub use backend::{AttestationBackend, DevelopmentBackend, Evidence, EvidenceRequest, TrustLevel};
pub use measurements::{MeasurementLayer, MeasurementSet};

#[cfg(feature = "nitro")]
pub use backend::NitroBackend;

/// How long a document stays valid after `issuedAt`.
pub const FRESHNESS_WINDOW_SECS: i64 = 300;

/// How far `issuedAt` may lie ahead of the verifier's clock.
pub const CLOCK_SKEW_SECS: i64 = 30;

/// Length of a challenge nonce.
pub const NONCE_LEN: usize = 32;

/// Errors from the attestation provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttestationError {
    #[error("Attestation provider not initialized")]
    NotInitialized,

    #[error("Attestation document is stale ({age_secs}s old)")]
    StaleDocument { age_secs: i64 },

    #[error("Attestation document is dated {ahead_secs}s in the future")]
    IssuedInFuture { ahead_secs: i64 },

    #[error("Measurement mismatch: {0}")]
    MeasurementMismatch(String),

    #[error("Attestation unavailable: {0}")]
    Unavailable(String),

    #[error("Production mode requires a build with the `nitro` feature")]
    ProductionBackendMissing,
}

/// A signed statement of the enclave's measured state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationDocument {
    pub instance_id: String,
    pub issued_at: DateTime<Utc>,
    pub digest: String,
    pub measurements: MeasurementSet,
    pub certificate_chain: Vec<String>,
    pub trust_level: TrustLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_document: Option<String>,
}

static CHAIN_NOT_VERIFIED: Once = Once::new();

/// Issues and verifies attestation documents.
#[derive(Debug)]
pub struct AttestationProvider {
    backend: Box<dyn AttestationBackend>,
    measurements: OnceLock<MeasurementSet>,
    freshness_window: Duration,
    clock_skew: Duration,
}

impl AttestationProvider {
    pub fn new(backend: Box<dyn AttestationBackend>) -> Self {
        Self {
            backend,
            measurements: OnceLock::new(),
            freshness_window: Duration::seconds(FRESHNESS_WINDOW_SECS),
            clock_skew: Duration::seconds(CLOCK_SKEW_SECS),
        }
    }

    /// Provider over the placeholder backend.
    pub fn development(seed: &str) -> Self {
        Self::new(Box::new(DevelopmentBackend::new(seed)))
    }

    /// Load the measurement set. Later calls are no-ops.
    pub fn initialize(&self) -> Result<(), AttestationError> {
        if self.measurements.get().is_some() {
            return Ok(());
        }
        let measurements = self.backend.measurements()?;
        if self.measurements.set(measurements).is_ok() {
            tracing::info!(
                trust_level = %self.backend.trust_level(),
                "Attestation provider initialized"
            );
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.measurements.get().is_some()
    }

    pub fn trust_level(&self) -> TrustLevel {
        self.backend.trust_level()
    }

    pub fn measurements(&self) -> Result<&MeasurementSet, AttestationError> {
        self.measurements.get().ok_or(AttestationError::NotInitialized)
    }

    /// Issue a fresh document binding the given data.
    pub fn generate(&self, request: &EvidenceRequest) -> Result<AttestationDocument, AttestationError> {
        let measurements = self.measurements()?.clone();
        let evidence = self.backend.attest(request)?;

        let document = AttestationDocument {
            instance_id: evidence.instance_id,
            issued_at: Utc::now(),
            digest: evidence.digest,
            measurements,
            certificate_chain: evidence.certificate_chain,
            trust_level: self.backend.trust_level(),
            bound_public_key: request.public_key.as_ref().map(alloy::hex::encode),
            user_data: request.user_data.as_ref().map(alloy::hex::encode),
            nonce: request.nonce.as_ref().map(alloy::hex::encode),
            raw_document: evidence.raw_document,
        };

        tracing::debug!(
            instance_id = %document.instance_id,
            trust_level = %document.trust_level,
            "Issued attestation document"
        );

        Ok(document)
    }

    /// Check freshness and, if given, expected measurements at time `now`.
    pub fn check_at(
        &self,
        document: &AttestationDocument,
        expected: Option<&MeasurementSet>,
        now: DateTime<Utc>,
    ) -> Result<(), AttestationError> {
        CHAIN_NOT_VERIFIED.call_once(|| {
            tracing::warn!("Attestation certificate chains are not cryptographically verified");
        });

        let age = now - document.issued_at;
        if age > self.freshness_window {
            return Err(AttestationError::StaleDocument {
                age_secs: age.num_seconds(),
            });
        }
        if -age > self.clock_skew {
            return Err(AttestationError::IssuedInFuture {
                ahead_secs: (-age).num_seconds(),
            });
        }

        if let Some(expected) = expected {
            document
                .measurements
                .check_expected(expected)
                .map_err(AttestationError::MeasurementMismatch)?;
        }

        Ok(())
    }

    pub fn check(
        &self,
        document: &AttestationDocument,
        expected: Option<&MeasurementSet>,
    ) -> Result<(), AttestationError> {
        self.check_at(document, expected, Utc::now())
    }

    pub fn verify_at(
        &self,
        document: &AttestationDocument,
        expected: Option<&MeasurementSet>,
        now: DateTime<Utc>,
    ) -> bool {
        match self.check_at(document, expected, now) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(instance_id = %document.instance_id, error = %e, "Attestation rejected");
                false
            }
        }
    }

    /// `true` if the document is fresh and matches `expected`.
    pub fn verify(&self, document: &AttestationDocument, expected: Option<&MeasurementSet>) -> bool {
        self.verify_at(document, expected, Utc::now())
    }

    /// 32 random bytes for challenge/response freshness binding.
    pub fn nonce() -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}
