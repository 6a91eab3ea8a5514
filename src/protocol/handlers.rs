// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operation handlers. Each takes the enclave state and typed params and
//! returns a typed result.

use chrono::Utc;
use k256::SecretKey;

use super::operation::*;
use super::CommunicationError;
use crate::attestation::EvidenceRequest;
use crate::blockchain::SigningError;
use crate::custody::Share;
use crate::error::EnclaveError;
use crate::state::EnclaveState;

pub fn generate_keys(
    state: &EnclaveState,
    params: GenerateKeysParams,
) -> Result<GenerateKeysResult, EnclaveError> {
    let (identity, share_set) = state.custodian.create_wallet(state.policy)?;

    tracing::info!(
        wallet_address = %identity.address,
        wallet_name = %params.wallet_name,
        user_id = %params.user_id,
        "Created wallet"
    );

    Ok(GenerateKeysResult {
        wallet_address: identity.address,
        public_key: identity.public_key,
        threshold: share_set.threshold,
        shares: share_set.shares,
    })
}

pub fn reconstruct_key(
    state: &EnclaveState,
    params: ReconstructKeyParams,
) -> Result<ReconstructKeyResult, EnclaveError> {
    let minimum = params.threshold.unwrap_or(state.policy.threshold);
    let identity = state.custodian.reconstruct(&params.shares, minimum)?;

    Ok(ReconstructKeyResult {
        wallet_address: identity.address,
        public_key: identity.public_key,
        key_reconstructed: true,
    })
}

pub fn sign_transaction(
    state: &EnclaveState,
    params: SignTransactionParams,
) -> Result<SignTransactionResult, EnclaveError> {
    let secret = signing_key(state, &params.wallet_address, params.shares.as_deref())?;
    let signed = state.signer.sign(&params.transaction, &secret)?;

    tracing::info!(
        wallet_address = %signed.from,
        tx_hash = %signed.hash,
        "Signed transaction"
    );

    Ok(SignTransactionResult {
        signed_transaction: signed.raw_transaction,
        tx_hash: signed.hash,
        wallet_address: signed.from,
    })
}

pub fn sign_message(
    state: &EnclaveState,
    params: SignMessageParams,
) -> Result<SignMessageResult, EnclaveError> {
    let secret = signing_key(state, &params.wallet_address, params.shares.as_deref())?;
    let signature = state.signer.sign_message(&params.message, &secret)?;

    Ok(SignMessageResult {
        signature,
        wallet_address: params.wallet_address,
    })
}

pub fn get_attestation(
    state: &EnclaveState,
    params: GetAttestationParams,
) -> Result<GetAttestationResult, EnclaveError> {
    let request = EvidenceRequest {
        user_data: decode_hex("userData", params.user_data.as_deref())?,
        nonce: decode_hex("nonce", params.nonce.as_deref())?,
        public_key: decode_hex("publicKey", params.public_key.as_deref())?,
    };

    let attestation = state.attestation.generate(&request)?;
    let measurements = state.attestation.measurements()?.clone();

    Ok(GetAttestationResult {
        attestation,
        measurements,
    })
}

pub fn verify_attestation(
    state: &EnclaveState,
    params: VerifyAttestationParams,
) -> Result<VerifyAttestationResult, EnclaveError> {
    let outcome = state
        .attestation
        .check(&params.attestation, params.expected_measurements.as_ref());

    Ok(VerifyAttestationResult {
        valid: outcome.is_ok(),
        reason: outcome.err().map(|e| e.to_string()),
    })
}

pub fn clear_keys(
    state: &EnclaveState,
    params: ClearKeysParams,
) -> Result<ClearKeysResult, EnclaveError> {
    let cleared = match params.wallet_address.as_deref() {
        Some(address) => state.custodian.clear(address),
        None => state.custodian.clear_all(),
    };
    Ok(ClearKeysResult { cleared })
}

pub fn health(state: &EnclaveState) -> HealthResult {
    HealthResult {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        trust_level: state.attestation.trust_level(),
        cached_keys: state.custodian.cached_count(),
    }
}

pub fn ping() -> PingResult {
    PingResult {
        pong: true,
        timestamp: Utc::now(),
    }
}

/// Key for `wallet_address`, reconstructing from `shares` when given.
///
/// Shares that rebuild a different wallet are rejected without touching
/// the cache.
fn signing_key(
    state: &EnclaveState,
    wallet_address: &str,
    shares: Option<&[Share]>,
) -> Result<SecretKey, EnclaveError> {
    if let Some(shares) = shares {
        state
            .custodian
            .reconstruct_for(wallet_address, shares, state.policy.threshold)?;
    }

    state
        .custodian
        .get_cached(wallet_address)
        .ok_or_else(|| SigningError::KeyUnavailable(wallet_address.to_string()).into())
}

fn decode_hex(field: &str, value: Option<&str>) -> Result<Option<Vec<u8>>, CommunicationError> {
    value
        .map(|hex| {
            alloy::hex::decode(hex.trim()).map_err(|e| {
                CommunicationError::MalformedMessage(format!("{field} is not valid hex: {e}"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::TrustLevel;
    use crate::blockchain::TransactionRequest;
    use crate::custody::CustodyError;

    fn generate(state: &EnclaveState) -> GenerateKeysResult {
        generate_keys(
            state,
            GenerateKeysParams {
                wallet_name: "main".to_string(),
                user_id: "user-1".to_string(),
            },
        )
        .unwrap()
    }

    fn transfer() -> TransactionRequest {
        TransactionRequest {
            to: Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string()),
            value: Some("1.0".to_string()),
            gas_price: Some("20".to_string()),
            chain_id: 1,
            ..Default::default()
        }
    }

    #[test]
    fn generate_then_reconstruct() {
        let state = EnclaveState::default();
        let wallet = generate(&state);
        assert_eq!(wallet.shares.len(), state.policy.share_count);

        let rebuilt = reconstruct_key(
            &state,
            ReconstructKeyParams {
                shares: wallet.shares[1..].to_vec(),
                threshold: None,
            },
        )
        .unwrap();
        assert!(rebuilt.key_reconstructed);
        assert_eq!(rebuilt.wallet_address, wallet.wallet_address);
        assert_eq!(rebuilt.public_key, wallet.public_key);
    }

    #[test]
    fn reconstruct_rejects_threshold_below_two() {
        let state = EnclaveState::default();
        let wallet = generate(&state);
        let err = reconstruct_key(
            &state,
            ReconstructKeyParams {
                shares: wallet.shares,
                threshold: Some(1),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EnclaveError::Custody(CustodyError::InvalidParameters(_))
        ));
    }

    #[test]
    fn sign_with_shares_then_from_cache() {
        let state = EnclaveState::default();
        let wallet = generate(&state);

        let signed = sign_transaction(
            &state,
            SignTransactionParams {
                transaction: transfer(),
                wallet_address: wallet.wallet_address.clone(),
                shares: Some(wallet.shares[..2].to_vec()),
            },
        )
        .unwrap();
        assert_eq!(signed.wallet_address, wallet.wallet_address);

        let again = sign_transaction(
            &state,
            SignTransactionParams {
                transaction: transfer(),
                wallet_address: wallet.wallet_address.to_lowercase(),
                shares: None,
            },
        )
        .unwrap();
        assert_eq!(again.tx_hash, signed.tx_hash);

        let verification = state.signer.verify_transaction_signature(&signed.signed_transaction);
        assert!(verification.is_valid);
        assert_eq!(verification.signer, wallet.wallet_address);
    }

    #[test]
    fn sign_without_cached_key_is_unavailable() {
        let state = EnclaveState::default();
        let wallet = generate(&state);
        let err = sign_transaction(
            &state,
            SignTransactionParams {
                transaction: transfer(),
                wallet_address: wallet.wallet_address,
                shares: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, EnclaveError::Signing(SigningError::KeyUnavailable(_))));
    }

    #[test]
    fn shares_for_another_wallet_are_rejected() {
        let state = EnclaveState::default();
        let a = generate(&state);
        let b = generate(&state);

        let err = sign_message(
            &state,
            SignMessageParams {
                message: "hi".to_string(),
                wallet_address: a.wallet_address,
                shares: Some(b.shares),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EnclaveError::Custody(CustodyError::InvalidReconstruction(_))
        ));
        assert_eq!(state.custodian.cached_count(), 0);
    }

    #[test]
    fn mismatched_shares_keep_other_cached_keys() {
        let state = EnclaveState::default();
        let a = generate(&state);
        let b = generate(&state);
        reconstruct_key(
            &state,
            ReconstructKeyParams {
                shares: b.shares.clone(),
                threshold: None,
            },
        )
        .unwrap();

        let err = sign_transaction(
            &state,
            SignTransactionParams {
                transaction: transfer(),
                wallet_address: a.wallet_address,
                shares: Some(b.shares),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EnclaveError::Custody(CustodyError::InvalidReconstruction(_))
        ));
        assert!(state.custodian.get_cached(&b.wallet_address).is_some());
        assert_eq!(state.custodian.cached_count(), 1);
    }

    #[test]
    fn sign_message_verifies() {
        let state = EnclaveState::default();
        let wallet = generate(&state);
        let result = sign_message(
            &state,
            SignMessageParams {
                message: "attest me".to_string(),
                wallet_address: wallet.wallet_address.clone(),
                shares: Some(wallet.shares.clone()),
            },
        )
        .unwrap();
        assert!(state
            .signer
            .verify_message("attest me", &result.signature, &wallet.wallet_address));
    }

    #[test]
    fn attestation_round_trip() {
        let state = EnclaveState::default();
        let issued = get_attestation(
            &state,
            GetAttestationParams {
                nonce: Some("0x0102".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(issued.attestation.trust_level, TrustLevel::Development);
        assert_eq!(issued.attestation.nonce.as_deref(), Some("0102"));

        let verified = verify_attestation(
            &state,
            VerifyAttestationParams {
                attestation: issued.attestation,
                expected_measurements: Some(issued.measurements),
            },
        )
        .unwrap();
        assert!(verified.valid);
        assert!(verified.reason.is_none());
    }

    #[test]
    fn attestation_rejects_bad_hex() {
        let state = EnclaveState::default();
        let err = get_attestation(
            &state,
            GetAttestationParams {
                user_data: Some("zz".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EnclaveError::Communication(CommunicationError::MalformedMessage(_))
        ));
    }

    #[test]
    fn clear_keys_one_or_all() {
        let state = EnclaveState::default();
        let a = generate(&state);
        let b = generate(&state);
        reconstruct_key(&state, ReconstructKeyParams { shares: a.shares, threshold: None }).unwrap();
        reconstruct_key(&state, ReconstructKeyParams { shares: b.shares, threshold: None }).unwrap();

        let one = clear_keys(
            &state,
            ClearKeysParams {
                wallet_address: Some(a.wallet_address),
            },
        )
        .unwrap();
        assert_eq!(one.cleared, 1);
        assert_eq!(clear_keys(&state, ClearKeysParams::default()).unwrap().cleared, 1);
        assert_eq!(clear_keys(&state, ClearKeysParams::default()).unwrap().cleared, 0);
    }

    #[test]
    fn health_reports_healthy() {
        let state = EnclaveState::default();
        let result = health(&state);
        assert_eq!(result.status, "healthy");
        assert_eq!(result.cached_keys, 0);
        assert!(ping().pong);
    }
}
