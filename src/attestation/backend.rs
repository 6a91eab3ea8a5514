// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Attestation backends.
//!
//! The hardware backend talks to the Nitro Secure Module and produces a
//! document signed by the platform. The development backend produces clearly
//! labelled placeholder evidence. The two are told apart by `TrustLevel`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::measurements::MeasurementSet;
use super::AttestationError;

/// How far a document can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// Signed by the platform's secure module.
    Hardware,
    /// Placeholder evidence from a non-isolated process.
    Development,
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustLevel::Hardware => f.write_str("hardware"),
            TrustLevel::Development => f.write_str("development"),
        }
    }
}

/// Data to bind into a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceRequest {
    pub user_data: Option<Vec<u8>>,
    pub nonce: Option<Vec<u8>>,
    pub public_key: Option<Vec<u8>>,
}

/// What a backend returns for one attestation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    pub instance_id: String,
    /// Digest algorithm of the measurements, e.g. `SHA384`.
    pub digest: String,
    /// Base64 DER certificates, leaf first. Empty for development.
    pub certificate_chain: Vec<String>,
    /// Base64 of the platform-signed document, when there is one.
    pub raw_document: Option<String>,
}

/// Source of measurements and signed evidence.
pub trait AttestationBackend: Send + Sync + fmt::Debug {
    fn trust_level(&self) -> TrustLevel;

    /// Read the platform measurements. Called once at initialization.
    fn measurements(&self) -> Result<MeasurementSet, AttestationError>;

    /// Produce fresh evidence binding the requested data.
    fn attest(&self, request: &EvidenceRequest) -> Result<Evidence, AttestationError>;
}

/// Placeholder backend for development outside an enclave.
#[derive(Debug, Clone)]
pub struct DevelopmentBackend {
    seed: String,
    instance_id: String,
}

impl DevelopmentBackend {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            instance_id: format!("dev-{}", uuid::Uuid::new_v4()),
        }
    }
}

impl AttestationBackend for DevelopmentBackend {
    fn trust_level(&self) -> TrustLevel {
        TrustLevel::Development
    }

    fn measurements(&self) -> Result<MeasurementSet, AttestationError> {
        Ok(MeasurementSet::development(&self.seed))
    }

    fn attest(&self, _request: &EvidenceRequest) -> Result<Evidence, AttestationError> {
        Ok(Evidence {
            instance_id: self.instance_id.clone(),
            digest: "SHA384".to_string(),
            certificate_chain: Vec::new(),
            raw_document: None,
        })
    }
}

#[cfg(feature = "nitro")]
pub use nitro::NitroBackend;

#[cfg(feature = "nitro")]
mod nitro {
    use base64ct::{Base64, Encoding};
    use nsm_api::api::{AttestationDoc, Request as NsmRequest, Response as NsmResponse};
    use nsm_api::driver;
    use serde_bytes::ByteBuf;

    use super::{AttestationBackend, Evidence, EvidenceRequest, TrustLevel};
    use crate::attestation::measurements::{MeasurementLayer, MeasurementSet};
    use crate::attestation::AttestationError;

    /// Backend on the Nitro Secure Module (`/dev/nsm`).
    #[derive(Debug)]
    pub struct NitroBackend {
        fd: i32,
    }

    impl NitroBackend {
        /// Open the secure module. Fails outside a Nitro enclave.
        pub fn open() -> Result<Self, AttestationError> {
            let fd = driver::nsm_init();
            if fd < 0 {
                return Err(AttestationError::Unavailable(
                    "cannot open /dev/nsm".to_string(),
                ));
            }
            tracing::info!("Opened Nitro Secure Module");
            Ok(Self { fd })
        }

        fn describe_pcr(&self, index: u16) -> Result<Vec<u8>, AttestationError> {
            match driver::nsm_process_request(self.fd, NsmRequest::DescribePCR { index }) {
                NsmResponse::DescribePCR { data, .. } => Ok(data),
                NsmResponse::Error(code) => Err(AttestationError::Unavailable(format!(
                    "DescribePCR {index} failed: {code:?}"
                ))),
                _ => Err(AttestationError::Unavailable(
                    "unexpected secure module response".to_string(),
                )),
            }
        }
    }

    impl Drop for NitroBackend {
        fn drop(&mut self) {
            driver::nsm_exit(self.fd);
        }
    }

    impl AttestationBackend for NitroBackend {
        fn trust_level(&self) -> TrustLevel {
            TrustLevel::Hardware
        }

        fn measurements(&self) -> Result<MeasurementSet, AttestationError> {
            MeasurementLayer::ALL
                .iter()
                .map(|layer| {
                    self.describe_pcr(layer.pcr_index())
                        .map(|data| (layer.name(), alloy::hex::encode(data)))
                })
                .collect()
        }

        fn attest(&self, request: &EvidenceRequest) -> Result<Evidence, AttestationError> {
            let nsm_request = NsmRequest::Attestation {
                user_data: request.user_data.clone().map(ByteBuf::from),
                nonce: request.nonce.clone().map(ByteBuf::from),
                public_key: request.public_key.clone().map(ByteBuf::from),
            };

            let document = match driver::nsm_process_request(self.fd, nsm_request) {
                NsmResponse::Attestation { document } => document,
                NsmResponse::Error(code) => {
                    return Err(AttestationError::Unavailable(format!(
                        "attestation request failed: {code:?}"
                    )))
                }
                _ => {
                    return Err(AttestationError::Unavailable(
                        "unexpected secure module response".to_string(),
                    ))
                }
            };

            let payload = cose_payload(&document)?;
            let doc = AttestationDoc::from_binary(&payload).map_err(|e| {
                AttestationError::Unavailable(format!("cannot decode attestation document: {e:?}"))
            })?;

            let certificate_chain = std::iter::once(&doc.certificate)
                .chain(doc.cabundle.iter())
                .map(|cert| Base64::encode_string(cert))
                .collect();

            Ok(Evidence {
                instance_id: doc.module_id,
                digest: format!("{:?}", doc.digest),
                certificate_chain,
                raw_document: Some(Base64::encode_string(&document)),
            })
        }
    }

    /// Payload of a COSE_Sign1 structure: `[protected, unprotected, payload, signature]`.
    fn cose_payload(document: &[u8]) -> Result<Vec<u8>, AttestationError> {
        use ciborium::Value;

        let malformed =
            |what: &str| AttestationError::Unavailable(format!("malformed COSE document: {what}"));

        let value: Value = ciborium::de::from_reader(document).map_err(|_| malformed("not CBOR"))?;
        let value = match value {
            Value::Tag(_, inner) => *inner,
            other => other,
        };
        let Value::Array(mut parts) = value else {
            return Err(malformed("not an array"));
        };
        if parts.len() != 4 {
            return Err(malformed("expected 4 elements"));
        }
        match parts.swap_remove(2) {
            Value::Bytes(payload) => Ok(payload),
            _ => Err(malformed("payload is not a byte string")),
        }
    }
}
