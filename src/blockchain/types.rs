// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction signing types and errors.

use serde::{Deserialize, Serialize};

/// Errors from the transaction signer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("Ambiguous fee model: set either gasPrice or both maxFeePerGas and maxPriorityFeePerGas")]
    AmbiguousFeeModel,

    #[error("Missing fee parameter: gasPrice or maxFeePerGas is required")]
    MissingFeeParameter,

    #[error("No key available for wallet {0}")]
    KeyUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// A transaction to sign.
///
/// `value` is in ether, gas prices are in gwei and `data` is 0x-prefixed hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Recipient. `None` deploys a contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Defaults to the local gas estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Legacy fee model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    /// Fee-market model, set together with `max_priority_fee_per_gas`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(default)]
    pub nonce: u64,
    pub chain_id: u64,
}

/// Which fee model a request uses, with the raw gwei strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeModel<'a> {
    Legacy {
        gas_price: &'a str,
    },
    FeeMarket {
        max_fee_per_gas: &'a str,
        max_priority_fee_per_gas: &'a str,
    },
}

impl TransactionRequest {
    /// Resolve the fee model.
    ///
    /// Exactly one of `gasPrice` or the `maxFeePerGas`/`maxPriorityFeePerGas`
    /// pair must be set, and the pair must be complete.
    pub fn fee_model(&self) -> Result<FeeModel<'_>, SigningError> {
        match (
            self.gas_price.as_deref(),
            self.max_fee_per_gas.as_deref(),
            self.max_priority_fee_per_gas.as_deref(),
        ) {
            (Some(gas_price), None, None) => Ok(FeeModel::Legacy { gas_price }),
            (None, Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) => {
                Ok(FeeModel::FeeMarket {
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                })
            }
            _ => Err(SigningError::AmbiguousFeeModel),
        }
    }

    /// Payload bytes, empty when `data` is absent.
    pub fn data_bytes(&self) -> Result<Vec<u8>, SigningError> {
        match self.data.as_deref().map(str::trim) {
            None | Some("") | Some("0x") => Ok(Vec::new()),
            Some(hex) => alloy::hex::decode(hex)
                .map_err(|e| SigningError::InvalidRequest(format!("Invalid data hex: {e}"))),
        }
    }
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    /// The request as signed, with the gas limit filled in.
    pub transaction: TransactionRequest,
    /// EIP-2718 encoded signed transaction, 0x-prefixed hex.
    pub raw_transaction: String,
    pub hash: String,
    /// Sender recovered from the signature.
    pub from: String,
    pub r: String,
    pub s: String,
    /// EIP-155 `v` for legacy transactions, y-parity for typed ones.
    pub v: u64,
    pub recovery_id: u8,
}

/// Result of checking a raw signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxVerification {
    pub is_valid: bool,
    pub signer: String,
    pub hash: String,
}

impl TxVerification {
    /// Result for a payload that could not be decoded or recovered.
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            signer: alloy::primitives::Address::ZERO.to_checksum(None),
            hash: alloy::hex::encode_prefixed(alloy::primitives::B256::ZERO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TransactionRequest {
        TransactionRequest {
            to: Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string()),
            value: Some("1.0".to_string()),
            chain_id: 1,
            ..Default::default()
        }
    }

    #[test]
    fn legacy_fee_model() {
        let tx = TransactionRequest {
            gas_price: Some("20".to_string()),
            ..request()
        };
        assert_eq!(tx.fee_model(), Ok(FeeModel::Legacy { gas_price: "20" }));
    }

    #[test]
    fn fee_market_requires_both_fields() {
        let tx = TransactionRequest {
            max_fee_per_gas: Some("30".to_string()),
            max_priority_fee_per_gas: Some("2".to_string()),
            ..request()
        };
        assert!(matches!(tx.fee_model(), Ok(FeeModel::FeeMarket { .. })));

        let partial = TransactionRequest {
            max_fee_per_gas: Some("30".to_string()),
            ..request()
        };
        assert_eq!(partial.fee_model(), Err(SigningError::AmbiguousFeeModel));
    }

    #[test]
    fn mixed_or_missing_fee_model_is_ambiguous() {
        let mixed = TransactionRequest {
            gas_price: Some("20".to_string()),
            max_fee_per_gas: Some("30".to_string()),
            ..request()
        };
        assert_eq!(mixed.fee_model(), Err(SigningError::AmbiguousFeeModel));
        assert_eq!(request().fee_model(), Err(SigningError::AmbiguousFeeModel));
    }

    #[test]
    fn request_uses_camel_case_on_the_wire() {
        let tx: TransactionRequest = serde_json::from_value(serde_json::json!({
            "to": "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "value": "1.0",
            "gasPrice": "20",
            "nonce": 0,
            "chainId": 1
        }))
        .unwrap();
        assert_eq!(tx.gas_price.as_deref(), Some("20"));
        assert_eq!(tx.chain_id, 1);
        assert!(tx.gas_limit.is_none());
    }

    #[test]
    fn data_bytes_decodes_hex() {
        let mut tx = request();
        assert!(tx.data_bytes().unwrap().is_empty());
        tx.data = Some("0xdeadbeef".to_string());
        assert_eq!(tx.data_bytes().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        tx.data = Some("0xzz".to_string());
        assert!(matches!(tx.data_bytes(), Err(SigningError::InvalidRequest(_))));
    }
}
