// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::attestation::{AttestationBackend, AttestationError, AttestationProvider, DevelopmentBackend};
use crate::blockchain::TransactionSigner;
use crate::config::{EnclaveConfig, EnclaveMode};
use crate::custody::{CustodyPolicy, KeyCustodian};
use crate::error::EnclaveError;

/// Handles to the enclave components, passed to request handlers.
#[derive(Clone, Debug)]
pub struct EnclaveState {
    pub custodian: Arc<KeyCustodian>,
    pub signer: TransactionSigner,
    pub attestation: Arc<AttestationProvider>,
    pub policy: CustodyPolicy,
    pub mode: EnclaveMode,
}

impl EnclaveState {
    /// Assemble state from initialized components.
    pub fn new(
        custodian: KeyCustodian,
        attestation: AttestationProvider,
        policy: CustodyPolicy,
        mode: EnclaveMode,
    ) -> Self {
        Self {
            custodian: Arc::new(custodian),
            signer: TransactionSigner::new(),
            attestation: Arc::new(attestation),
            policy,
            mode,
        }
    }

    /// Build and initialize every component for `config`.
    pub fn from_config(config: &EnclaveConfig) -> Result<Self, EnclaveError> {
        let custodian = KeyCustodian::new(config.key_cache_capacity, config.key_cache_ttl);
        custodian.initialize();

        let attestation = AttestationProvider::new(attestation_backend(config)?);
        attestation.initialize()?;

        tracing::info!(
            mode = %config.mode,
            threshold = config.policy.threshold,
            share_count = config.policy.share_count,
            trust_level = %attestation.trust_level(),
            "Enclave state ready"
        );

        Ok(Self::new(custodian, attestation, config.policy, config.mode))
    }
}

impl Default for EnclaveState {
    /// Development state with default configuration, fully initialized.
    fn default() -> Self {
        let config = EnclaveConfig::default();
        let custodian = KeyCustodian::new(config.key_cache_capacity, config.key_cache_ttl);
        custodian.initialize();
        let attestation = AttestationProvider::development(&config.measurement_seed);
        // The development backend cannot fail to load measurements.
        let _ = attestation.initialize();
        Self::new(custodian, attestation, config.policy, config.mode)
    }
}

/// Pick the attestation backend for the configured mode.
///
/// Production never falls back to the development backend.
fn attestation_backend(
    config: &EnclaveConfig,
) -> Result<Box<dyn AttestationBackend>, AttestationError> {
    match config.mode {
        EnclaveMode::Development => Ok(Box::new(DevelopmentBackend::new(
            config.measurement_seed.clone(),
        ))),
        EnclaveMode::Production => production_backend(),
    }
}

#[cfg(feature = "nitro")]
fn production_backend() -> Result<Box<dyn AttestationBackend>, AttestationError> {
    Ok(Box::new(crate::attestation::NitroBackend::open()?))
}

#[cfg(not(feature = "nitro"))]
fn production_backend() -> Result<Box<dyn AttestationBackend>, AttestationError> {
    Err(AttestationError::ProductionBackendMissing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::TrustLevel;

    #[test]
    fn development_config_builds_initialized_state() {
        let state = EnclaveState::from_config(&EnclaveConfig::default()).unwrap();
        assert!(state.custodian.is_initialized());
        assert!(state.attestation.is_initialized());
        assert_eq!(state.attestation.trust_level(), TrustLevel::Development);
        assert_eq!(state.mode, EnclaveMode::Development);
    }

    #[test]
    fn default_state_is_initialized() {
        let state = EnclaveState::default();
        assert!(state.custodian.is_initialized());
        assert!(state.attestation.measurements().is_ok());
    }

    #[cfg(not(feature = "nitro"))]
    #[test]
    fn production_without_hardware_backend_refuses_to_start() {
        let config = EnclaveConfig {
            mode: EnclaveMode::Production,
            ..EnclaveConfig::default()
        };
        let err = EnclaveState::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            EnclaveError::Attestation(AttestationError::ProductionBackendMissing)
        ));
    }
}
