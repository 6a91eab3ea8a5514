// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the enclave. Configuration is loaded from the environment once
//! at startup; an invalid value stops the process.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ENCLAVE_MODE` | `production` (Nitro attestation, vsock) or `development` | `development` |
//! | `VSOCK_PORT` | vsock port the enclave listens on | `5005` |
//! | `DEV_BIND_ADDR` | HTTP bind address in development | `127.0.0.1:8088` |
//! | `SHARE_THRESHOLD` | Shares needed to reconstruct a key | `2` |
//! | `SHARE_COUNT` | Shares produced per key | `3` |
//! | `KEY_CACHE_TTL_SECS` | Lifetime of a reconstructed key | `300` |
//! | `KEY_CACHE_CAPACITY` | Max wallets held in the key cache | `256` |
//! | `MEASUREMENT_SEED` | Seed of development placeholder measurements | `enclave-custody-dev` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,enclave_custody=debug` |

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::custody::{CustodyError, CustodyPolicy};

/// Environment variable name for the runtime mode.
///
/// `production` requires a build with the `nitro` feature. There is no
/// fallback to placeholder attestation.
pub const ENCLAVE_MODE_ENV: &str = "ENCLAVE_MODE";

/// Environment variable name for the vsock listen port.
pub const VSOCK_PORT_ENV: &str = "VSOCK_PORT";

/// Default vsock port.
pub const DEFAULT_VSOCK_PORT: u32 = 5005;

/// Environment variable name for the development HTTP bind address.
pub const DEV_BIND_ADDR_ENV: &str = "DEV_BIND_ADDR";

/// Default development bind address. Loopback only.
pub const DEFAULT_DEV_BIND_ADDR: &str = "127.0.0.1:8088";

/// Environment variable name for the share threshold.
///
/// Also used as the minimum at reconstruction, so shares are always
/// recombined under the threshold they were split with.
pub const SHARE_THRESHOLD_ENV: &str = "SHARE_THRESHOLD";

/// Environment variable name for the number of shares per key.
pub const SHARE_COUNT_ENV: &str = "SHARE_COUNT";

/// Environment variable name for the key cache TTL in seconds.
pub const KEY_CACHE_TTL_ENV: &str = "KEY_CACHE_TTL_SECS";

/// Default key cache TTL (5 minutes).
pub const DEFAULT_KEY_CACHE_TTL_SECS: u64 = 300;

/// Environment variable name for the key cache capacity.
pub const KEY_CACHE_CAPACITY_ENV: &str = "KEY_CACHE_CAPACITY";

/// Default key cache capacity.
pub const DEFAULT_KEY_CACHE_CAPACITY: usize = 256;

/// Environment variable name for the development measurement seed.
pub const MEASUREMENT_SEED_ENV: &str = "MEASUREMENT_SEED";

/// Default development measurement seed.
pub const DEFAULT_MEASUREMENT_SEED: &str = "enclave-custody-dev";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default `RUST_LOG` filter.
pub const DEFAULT_LOG_FILTER: &str = "info,enclave_custody=debug";

/// Errors while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid custody policy: {0}")]
    Policy(#[from] CustodyError),
}

/// Where the enclave runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnclaveMode {
    /// Inside a Nitro enclave: hardware attestation, vsock transport.
    Production,
    /// Ordinary process: placeholder attestation, HTTP transport.
    #[default]
    Development,
}

impl FromStr for EnclaveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(EnclaveMode::Production),
            "development" | "dev" => Ok(EnclaveMode::Development),
            other => Err(format!("expected `production` or `development`, got `{other}`")),
        }
    }
}

impl fmt::Display for EnclaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnclaveMode::Production => f.write_str("production"),
            EnclaveMode::Development => f.write_str("development"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("expected `json` or `pretty`, got `{other}`")),
        }
    }
}

/// Enclave configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclaveConfig {
    pub mode: EnclaveMode,
    pub vsock_port: u32,
    pub dev_bind_addr: SocketAddr,
    pub policy: CustodyPolicy,
    pub key_cache_ttl: Duration,
    pub key_cache_capacity: usize,
    pub measurement_seed: String,
    pub log_format: LogFormat,
}

impl Default for EnclaveConfig {
    fn default() -> Self {
        Self {
            mode: EnclaveMode::Development,
            vsock_port: DEFAULT_VSOCK_PORT,
            dev_bind_addr: SocketAddr::from(([127, 0, 0, 1], 8088)),
            policy: CustodyPolicy::default(),
            key_cache_ttl: Duration::from_secs(DEFAULT_KEY_CACHE_TTL_SECS),
            key_cache_capacity: DEFAULT_KEY_CACHE_CAPACITY,
            measurement_seed: DEFAULT_MEASUREMENT_SEED.to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl EnclaveConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let threshold = parse_var(&lookup, SHARE_THRESHOLD_ENV, defaults.policy.threshold)?;
        let share_count = parse_var(&lookup, SHARE_COUNT_ENV, defaults.policy.share_count)?;
        let ttl_secs = parse_var(&lookup, KEY_CACHE_TTL_ENV, DEFAULT_KEY_CACHE_TTL_SECS)?;
        let key_cache_capacity =
            parse_var(&lookup, KEY_CACHE_CAPACITY_ENV, defaults.key_cache_capacity)?;

        if ttl_secs == 0 {
            return Err(invalid(KEY_CACHE_TTL_ENV, "0", "must be greater than zero"));
        }
        if key_cache_capacity == 0 {
            return Err(invalid(KEY_CACHE_CAPACITY_ENV, "0", "must be greater than zero"));
        }

        Ok(Self {
            mode: parse_var(&lookup, ENCLAVE_MODE_ENV, defaults.mode)?,
            vsock_port: parse_var(&lookup, VSOCK_PORT_ENV, defaults.vsock_port)?,
            dev_bind_addr: parse_var(&lookup, DEV_BIND_ADDR_ENV, defaults.dev_bind_addr)?,
            policy: CustodyPolicy::new(threshold, share_count)?,
            key_cache_ttl: Duration::from_secs(ttl_secs),
            key_cache_capacity,
            measurement_seed: lookup(MEASUREMENT_SEED_ENV)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.measurement_seed),
            log_format: parse_var(&lookup, LOG_FORMAT_ENV, defaults.log_format)?,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(var) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &raw, e.to_string())),
        _ => Ok(default),
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = EnclaveConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EnclaveConfig::default());
        assert_eq!(config.dev_bind_addr.to_string(), DEFAULT_DEV_BIND_ADDR);
        assert_eq!(config.mode, EnclaveMode::Development);
        assert_eq!(config.policy, CustodyPolicy::default());
    }

    #[test]
    fn reads_all_variables() {
        let config = EnclaveConfig::from_lookup(lookup(&[
            (ENCLAVE_MODE_ENV, "production"),
            (VSOCK_PORT_ENV, "7000"),
            (DEV_BIND_ADDR_ENV, "0.0.0.0:9000"),
            (SHARE_THRESHOLD_ENV, "3"),
            (SHARE_COUNT_ENV, "5"),
            (KEY_CACHE_TTL_ENV, "60"),
            (KEY_CACHE_CAPACITY_ENV, "8"),
            (MEASUREMENT_SEED_ENV, "custom"),
            (LOG_FORMAT_ENV, "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.mode, EnclaveMode::Production);
        assert_eq!(config.vsock_port, 7000);
        assert_eq!(config.dev_bind_addr.port(), 9000);
        assert_eq!(config.policy, CustodyPolicy::new(3, 5).unwrap());
        assert_eq!(config.key_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.key_cache_capacity, 8);
        assert_eq!(config.measurement_seed, "custom");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = EnclaveConfig::from_lookup(lookup(&[(ENCLAVE_MODE_ENV, "staging")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENCLAVE_MODE_ENV, .. }));

        let err = EnclaveConfig::from_lookup(lookup(&[(VSOCK_PORT_ENV, "port")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: VSOCK_PORT_ENV, .. }));

        let err = EnclaveConfig::from_lookup(lookup(&[(KEY_CACHE_TTL_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: KEY_CACHE_TTL_ENV, .. }));
    }

    #[test]
    fn rejects_unsafe_policy() {
        let err = EnclaveConfig::from_lookup(lookup(&[(SHARE_THRESHOLD_ENV, "1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Policy(CustodyError::InvalidParameters(_))));

        let err = EnclaveConfig::from_lookup(lookup(&[
            (SHARE_THRESHOLD_ENV, "4"),
            (SHARE_COUNT_ENV, "3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Policy(_)));
    }

    #[test]
    fn blank_values_use_defaults() {
        let config = EnclaveConfig::from_lookup(lookup(&[
            (MEASUREMENT_SEED_ENV, "  "),
            (LOG_FORMAT_ENV, ""),
        ]))
        .unwrap();
        assert_eq!(config.measurement_seed, DEFAULT_MEASUREMENT_SEED);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }
}
