// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction and message signing inside the enclave.
//!
//! The signer is stateless. It takes a private key from the key custodian for
//! the duration of one call and never stores it. Sender address and hash are
//! recovered from the encoded, signed envelope, so the output verifies itself.

use std::str::FromStr;

use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy},
    eips::eip2718::{Decodable2718, Encodable2718},
    primitives::{Address, Bytes, Signature, TxKind, B256, U256},
    signers::{local::PrivateKeySigner, SignerSync},
};
use k256::{ecdsa::SigningKey, SecretKey};

use super::types::{FeeModel, SignedTransaction, SigningError, TransactionRequest, TxVerification};
use super::units::{format_units, parse_ether, parse_gwei, ETHER_DECIMALS};

/// Gas used by a plain value transfer.
pub const BASE_TRANSFER_GAS: u64 = 21_000;

/// Gas charged per byte of calldata in the local estimate.
pub const GAS_PER_DATA_BYTE: u64 = 16;

/// Execution margin added when calldata is present.
pub const CONTRACT_EXECUTION_MARGIN: u64 = 50_000;

/// Largest chain id whose EIP-155 `v` fits in a `u64` (EIP-2294).
pub const MAX_CHAIN_ID: u64 = u64::MAX / 2 - 36;

/// Signs EVM transactions and messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionSigner;

impl TransactionSigner {
    pub fn new() -> Self {
        Self
    }

    /// Sign a transaction with `secret`.
    ///
    /// Legacy requests produce an EIP-155 transaction, fee-market requests an
    /// EIP-1559 one. A missing gas limit is filled from `estimate_gas`.
    pub fn sign(
        &self,
        request: &TransactionRequest,
        secret: &SecretKey,
    ) -> Result<SignedTransaction, SigningError> {
        if request.chain_id > MAX_CHAIN_ID {
            return Err(SigningError::InvalidRequest(format!(
                "Chain id {} exceeds {MAX_CHAIN_ID}",
                request.chain_id
            )));
        }
        let fee_model = request.fee_model()?;

        let to = match request.to.as_deref() {
            Some(addr) => TxKind::Call(parse_address(addr)?),
            None => TxKind::Create,
        };
        let value = match request.value.as_deref() {
            Some(value) => parse_ether(value)?,
            None => U256::ZERO,
        };
        let input = Bytes::from(request.data_bytes()?);
        let gas_limit = request.gas_limit.unwrap_or_else(|| self.estimate_gas(request));

        let signer = signer_for(secret);

        let envelope: TxEnvelope = match fee_model {
            FeeModel::Legacy { gas_price } => {
                let tx = TxLegacy {
                    chain_id: Some(request.chain_id),
                    nonce: request.nonce,
                    gas_price: parse_gwei(gas_price)?,
                    gas_limit,
                    to,
                    value,
                    input,
                };
                let signature = sign_hash(&signer, &tx.signature_hash())?;
                tx.into_signed(signature).into()
            }
            FeeModel::FeeMarket {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let tx = TxEip1559 {
                    chain_id: request.chain_id,
                    nonce: request.nonce,
                    gas_limit,
                    max_fee_per_gas: parse_gwei(max_fee_per_gas)?,
                    max_priority_fee_per_gas: parse_gwei(max_priority_fee_per_gas)?,
                    to,
                    value,
                    input,
                    ..Default::default()
                };
                let signature = sign_hash(&signer, &tx.signature_hash())?;
                tx.into_signed(signature).into()
            }
        };

        let recovered = recover(&envelope).ok_or_else(|| {
            SigningError::InvalidRequest("signature does not recover a sender".to_string())
        })?;

        let signed = SignedTransaction {
            transaction: TransactionRequest {
                gas_limit: Some(gas_limit),
                ..request.clone()
            },
            raw_transaction: alloy::hex::encode_prefixed(envelope.encoded_2718()),
            hash: alloy::hex::encode_prefixed(envelope.tx_hash()),
            from: recovered.signer.to_checksum(None),
            r: alloy::hex::encode_prefixed(recovered.signature.r().to_be_bytes::<32>()),
            s: alloy::hex::encode_prefixed(recovered.signature.s().to_be_bytes::<32>()),
            v: recovered.v,
            recovery_id: u8::from(recovered.signature.v()),
        };

        tracing::debug!(
            from = %signed.from,
            tx_hash = %signed.hash,
            chain_id = request.chain_id,
            nonce = request.nonce,
            "Signed transaction"
        );

        Ok(signed)
    }

    /// Sign transactions in order. The first failure aborts the batch.
    pub fn batch_sign(
        &self,
        requests: &[TransactionRequest],
        secret: &SecretKey,
    ) -> Result<Vec<SignedTransaction>, SigningError> {
        requests
            .iter()
            .map(|request| self.sign(request, secret))
            .collect()
    }

    /// Sign a text message (EIP-191 personal message). Returns 65-byte hex.
    pub fn sign_message(&self, message: &str, secret: &SecretKey) -> Result<String, SigningError> {
        let signature = signer_for(secret)
            .sign_message_sync(message.as_bytes())
            .map_err(|e| SigningError::InvalidRequest(format!("Message signing failed: {e}")))?;
        Ok(alloy::hex::encode_prefixed(signature.as_bytes()))
    }

    /// Check that `signature` over `message` recovers to `expected_signer`.
    pub fn verify_message(&self, message: &str, signature: &str, expected_signer: &str) -> bool {
        let Ok(expected) = parse_address(expected_signer) else {
            return false;
        };
        let Ok(bytes) = alloy::hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(signature) = Signature::from_raw(&bytes) else {
            return false;
        };
        signature
            .recover_address_from_msg(message.as_bytes())
            .is_ok_and(|recovered| recovered == expected)
    }

    /// Decode a raw signed transaction and recover its signer.
    ///
    /// Never fails: undecodable input yields `is_valid = false` with zeroed
    /// signer and hash.
    pub fn verify_transaction_signature(&self, raw_transaction: &str) -> TxVerification {
        let Ok(bytes) = alloy::hex::decode(raw_transaction.trim()) else {
            return TxVerification::invalid();
        };
        let Ok(envelope) = TxEnvelope::decode_2718(&mut bytes.as_slice()) else {
            return TxVerification::invalid();
        };
        match recover(&envelope) {
            Some(recovered) => TxVerification {
                is_valid: true,
                signer: recovered.signer.to_checksum(None),
                hash: alloy::hex::encode_prefixed(envelope.tx_hash()),
            },
            None => TxVerification::invalid(),
        }
    }

    /// Conservative local gas estimate.
    ///
    /// 21000 for a plain transfer; with calldata, 21000 + 16 per byte + 50000.
    pub fn estimate_gas(&self, request: &TransactionRequest) -> u64 {
        let hex = request
            .data
            .as_deref()
            .map(|d| d.trim().trim_start_matches("0x"))
            .unwrap_or_default();
        if hex.is_empty() {
            return BASE_TRANSFER_GAS;
        }
        let data_len = hex.len().div_ceil(2) as u64;
        BASE_TRANSFER_GAS + GAS_PER_DATA_BYTE * data_len + CONTRACT_EXECUTION_MARGIN
    }

    /// Maximum fee in ether: `gas_limit × (max_fee_per_gas ?? gas_price)`.
    ///
    /// Prices are in gwei.
    pub fn calculate_fee(
        &self,
        gas_limit: u64,
        gas_price: Option<&str>,
        max_fee_per_gas: Option<&str>,
    ) -> Result<String, SigningError> {
        let price = max_fee_per_gas
            .or(gas_price)
            .ok_or(SigningError::MissingFeeParameter)?;
        let fee = U256::from(gas_limit) * U256::from(parse_gwei(price)?);
        Ok(format_units(fee, ETHER_DECIMALS))
    }
}

struct Recovered {
    signer: Address,
    signature: Signature,
    v: u64,
}

fn signer_for(secret: &SecretKey) -> PrivateKeySigner {
    PrivateKeySigner::from_signing_key(SigningKey::from(secret))
}

fn sign_hash(signer: &PrivateKeySigner, hash: &B256) -> Result<Signature, SigningError> {
    signer
        .sign_hash_sync(hash)
        .map_err(|e| SigningError::InvalidRequest(format!("Signing failed: {e}")))
}

fn parse_address(raw: &str) -> Result<Address, SigningError> {
    Address::from_str(raw.trim())
        .map_err(|e| SigningError::InvalidRequest(format!("Invalid address {raw:?}: {e}")))
}

/// Recover signer, signature and wire `v` from a signed envelope.
fn recover(envelope: &TxEnvelope) -> Option<Recovered> {
    let (signature, hash, v) = match envelope {
        TxEnvelope::Legacy(signed) => {
            let signature = *signed.signature();
            let parity = u64::from(signature.v());
            let v = match signed.tx().chain_id {
                Some(chain_id) => chain_id.checked_mul(2)?.checked_add(35 + parity)?,
                None => 27 + parity,
            };
            (signature, signed.signature_hash(), v)
        }
        TxEnvelope::Eip2930(signed) => {
            let signature = *signed.signature();
            (signature, signed.signature_hash(), u64::from(signature.v()))
        }
        TxEnvelope::Eip1559(signed) => {
            let signature = *signed.signature();
            (signature, signed.signature_hash(), u64::from(signature.v()))
        }
        _ => return None,
    };

    let signer = signature.recover_address_from_prehash(&hash).ok()?;
    Some(Recovered {
        signer,
        signature,
        v,
    })
}
