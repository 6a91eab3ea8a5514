// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Named operations and their typed parameters and results.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CommunicationError;
use crate::attestation::{AttestationDocument, MeasurementSet, TrustLevel};
use crate::blockchain::TransactionRequest;
use crate::custody::Share;

/// An operation the enclave accepts, with decoded parameters.
#[derive(Debug, Clone)]
pub enum Operation {
    GenerateKeys(GenerateKeysParams),
    ReconstructKey(ReconstructKeyParams),
    SignTransaction(SignTransactionParams),
    SignMessage(SignMessageParams),
    GetAttestation(GetAttestationParams),
    VerifyAttestation(VerifyAttestationParams),
    ClearKeys(ClearKeysParams),
    Health,
    Ping,
}

impl Operation {
    /// Decode an operation from its wire name and params.
    ///
    /// Missing (`null`) params are treated as `{}`.
    pub fn parse(name: &str, params: Value) -> Result<Self, CommunicationError> {
        let params = if params.is_null() {
            Value::Object(Default::default())
        } else {
            params
        };

        let operation = match name {
            "generateKeys" => Operation::GenerateKeys(decode(name, params)?),
            "reconstructKey" => Operation::ReconstructKey(decode(name, params)?),
            "signTransaction" => Operation::SignTransaction(decode(name, params)?),
            "signMessage" => Operation::SignMessage(decode(name, params)?),
            "getAttestation" => Operation::GetAttestation(decode(name, params)?),
            "verifyAttestation" => Operation::VerifyAttestation(decode(name, params)?),
            "clearKeys" => Operation::ClearKeys(decode(name, params)?),
            "health" => Operation::Health,
            "ping" => Operation::Ping,
            other => return Err(CommunicationError::UnknownOperation(other.to_string())),
        };
        Ok(operation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::GenerateKeys(_) => "generateKeys",
            Operation::ReconstructKey(_) => "reconstructKey",
            Operation::SignTransaction(_) => "signTransaction",
            Operation::SignMessage(_) => "signMessage",
            Operation::GetAttestation(_) => "getAttestation",
            Operation::VerifyAttestation(_) => "verifyAttestation",
            Operation::ClearKeys(_) => "clearKeys",
            Operation::Health => "health",
            Operation::Ping => "ping",
        }
    }
}

fn decode<T: DeserializeOwned>(name: &str, params: Value) -> Result<T, CommunicationError> {
    serde_json::from_value(params)
        .map_err(|e| CommunicationError::MalformedMessage(format!("invalid {name} params: {e}")))
}

// -----------------------------------------------------------------------------
// Parameters
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateKeysParams {
    pub wallet_name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructKeyParams {
    pub shares: Vec<Share>,
    /// Overrides the configured reconstruction minimum.
    #[serde(default)]
    pub threshold: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionParams {
    pub transaction: TransactionRequest,
    pub wallet_address: String,
    /// Reconstruct from these first; otherwise use the cached key.
    #[serde(default)]
    pub shares: Option<Vec<Share>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageParams {
    pub message: String,
    pub wallet_address: String,
    #[serde(default)]
    pub shares: Option<Vec<Share>>,
}

/// Optional data to bind into the document, hex encoded.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAttestationParams {
    #[serde(default)]
    pub user_data: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAttestationParams {
    pub attestation: AttestationDocument,
    #[serde(default)]
    pub expected_measurements: Option<MeasurementSet>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearKeysParams {
    /// Clear one wallet; all wallets when absent.
    #[serde(default)]
    pub wallet_address: Option<String>,
}

// -----------------------------------------------------------------------------
// Results
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateKeysResult {
    pub wallet_address: String,
    pub public_key: String,
    pub threshold: usize,
    pub shares: Vec<Share>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructKeyResult {
    pub wallet_address: String,
    pub public_key: String,
    pub key_reconstructed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionResult {
    /// Raw signed transaction, 0x-prefixed hex.
    pub signed_transaction: String,
    pub tx_hash: String,
    pub wallet_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageResult {
    pub signature: String,
    pub wallet_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAttestationResult {
    pub attestation: AttestationDocument,
    pub measurements: MeasurementSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAttestationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearKeysResult {
    pub cleared: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResult {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub trust_level: TrustLevel,
    pub cached_keys: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub pong: bool,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_operations() {
        let op = Operation::parse(
            "generateKeys",
            json!({ "walletName": "main", "userId": "user-1" }),
        )
        .unwrap();
        match op {
            Operation::GenerateKeys(params) => {
                assert_eq!(params.wallet_name, "main");
                assert_eq!(params.user_id, "user-1");
            }
            other => panic!("unexpected operation {}", other.name()),
        }

        assert!(matches!(Operation::parse("health", Value::Null), Ok(Operation::Health)));
        assert!(matches!(Operation::parse("ping", json!({})), Ok(Operation::Ping)));
        assert!(matches!(
            Operation::parse("getAttestation", Value::Null),
            Ok(Operation::GetAttestation(_))
        ));
        assert!(matches!(
            Operation::parse("clearKeys", json!({})),
            Ok(Operation::ClearKeys(ClearKeysParams { wallet_address: None }))
        ));
    }

    #[test]
    fn names_round_trip() {
        for name in ["health", "ping", "clearKeys", "getAttestation"] {
            assert_eq!(Operation::parse(name, Value::Null).unwrap().name(), name);
        }
    }

    #[test]
    fn unknown_operation_has_fixed_message() {
        let err = Operation::parse("launchMissiles", json!({})).unwrap_err();
        assert_eq!(err, CommunicationError::UnknownOperation("launchMissiles".to_string()));
        assert_eq!(err.to_string(), "unknown operation");
    }

    #[test]
    fn bad_params_are_malformed() {
        let err = Operation::parse("reconstructKey", json!({ "shares": "nope" })).unwrap_err();
        assert!(matches!(err, CommunicationError::MalformedMessage(_)));

        let err = Operation::parse("generateKeys", Value::Null).unwrap_err();
        assert!(matches!(err, CommunicationError::MalformedMessage(_)));
    }

    #[test]
    fn reconstruct_params_accept_shares_without_role() {
        let op = Operation::parse(
            "reconstructKey",
            json!({ "shares": [{ "index": 0, "payload": "ab" }, { "index": 2, "payload": "cd" }] }),
        )
        .unwrap();
        let Operation::ReconstructKey(params) = op else {
            panic!("expected reconstructKey");
        };
        assert_eq!(params.shares.len(), 2);
        assert!(params.shares[0].role.is_none());
        assert!(params.threshold.is_none());
    }
}
