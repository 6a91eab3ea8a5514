// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Platform measurements (PCR values) of the running enclave.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha384};

/// A measured layer of the enclave and the PCR that records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementLayer {
    /// Enclave image file.
    BaseImage,
    /// Kernel and bootstrap.
    Kernel,
    /// Application code.
    Application,
    /// Signing certificate of the boot image.
    Boot,
}

impl MeasurementLayer {
    pub const ALL: [MeasurementLayer; 4] = [
        MeasurementLayer::BaseImage,
        MeasurementLayer::Kernel,
        MeasurementLayer::Application,
        MeasurementLayer::Boot,
    ];

    pub fn pcr_index(self) -> u16 {
        match self {
            MeasurementLayer::BaseImage => 0,
            MeasurementLayer::Kernel => 1,
            MeasurementLayer::Application => 2,
            MeasurementLayer::Boot => 8,
        }
    }

    /// Name used as the key in a `MeasurementSet`, e.g. `PCR0`.
    pub fn name(self) -> String {
        format!("PCR{}", self.pcr_index())
    }

    fn label(self) -> &'static str {
        match self {
            MeasurementLayer::BaseImage => "base-image",
            MeasurementLayer::Kernel => "kernel",
            MeasurementLayer::Application => "application",
            MeasurementLayer::Boot => "boot",
        }
    }
}

/// Named measurement digests, hex encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementSet(BTreeMap<String, String>);

impl MeasurementSet {
    /// Placeholder measurements: SHA-384 of `"{seed}:{layer}"` per layer.
    ///
    /// Deterministic for a seed, and never equal to a hardware PCR.
    pub fn development(seed: &str) -> Self {
        MeasurementLayer::ALL
            .iter()
            .map(|layer| {
                let digest = Sha384::digest(format!("{seed}:{}", layer.label()).as_bytes());
                (layer.name(), alloy::hex::encode(digest))
            })
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check that every entry of `expected` is present here with the same value.
    ///
    /// Returns the name of the first measurement that differs or is missing.
    pub fn check_expected(&self, expected: &MeasurementSet) -> Result<(), String> {
        for (name, want) in expected.iter() {
            match self.get(name) {
                Some(have) if normalize(have) == normalize(want) => {}
                _ => return Err(name.to_string()),
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for MeasurementSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn normalize(hex: &str) -> String {
    hex.trim().trim_start_matches("0x").to_ascii_lowercase()
}
