// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decimal amount parsing and formatting (ether, gwei).

use alloy::primitives::U256;

use super::types::SigningError;

/// Decimals of one ether in wei.
pub const ETHER_DECIMALS: u8 = 18;

/// Decimals of one gwei in wei.
pub const GWEI_DECIMALS: u8 = 9;

/// Parse a human-readable amount to its smallest unit.
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "1.5")
/// * `decimals` - Number of decimals (18 for ether, 9 for gwei)
pub fn parse_units(amount: &str, decimals: u8) -> Result<u128, SigningError> {
    let amount = amount.trim();
    let parts: Vec<&str> = amount.split('.').collect();

    if amount.is_empty() || parts.len() > 2 {
        return Err(SigningError::InvalidRequest(format!(
            "Invalid amount format: {amount:?}"
        )));
    }

    let whole = if parts[0].is_empty() {
        0u128
    } else {
        parts[0]
            .parse::<u128>()
            .map_err(|_| SigningError::InvalidRequest(format!("Invalid whole number: {amount:?}")))?
    };

    let decimal_part = if parts.len() == 2 && !parts[1].is_empty() {
        let dec_str = parts[1];
        if dec_str.len() > decimals as usize {
            return Err(SigningError::InvalidRequest(format!(
                "Too many decimal places (max {decimals})"
            )));
        }
        // Pad with zeros to match decimals
        let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
        padded
            .parse::<u128>()
            .map_err(|_| SigningError::InvalidRequest(format!("Invalid decimal: {amount:?}")))?
    } else {
        0u128
    };

    let multiplier = 10u128.pow(decimals as u32);
    whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(decimal_part))
        .ok_or_else(|| SigningError::InvalidRequest("Amount overflow".to_string()))
}

/// Parse an ether amount to wei.
pub fn parse_ether(amount: &str) -> Result<U256, SigningError> {
    parse_units(amount, ETHER_DECIMALS).map(U256::from)
}

/// Parse a gwei amount to wei.
pub fn parse_gwei(amount: &str) -> Result<u128, SigningError> {
    parse_units(amount, GWEI_DECIMALS)
}

/// Format a smallest-unit amount as a decimal string.
pub fn format_units(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        return whole.to_string();
    }

    let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
    let trimmed = decimal_str.trim_end_matches('0');
    format!("{whole}.{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ether_whole_and_decimal() {
        assert_eq!(parse_ether("1").unwrap(), U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(parse_ether("1.0").unwrap(), U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(parse_ether("1.5").unwrap(), U256::from(1_500_000_000_000_000_000u64));
        assert_eq!(parse_ether("0.001").unwrap(), U256::from(1_000_000_000_000_000u64));
        assert_eq!(parse_ether(".5").unwrap(), U256::from(500_000_000_000_000_000u64));
    }

    #[test]
    fn parse_gwei_values() {
        assert_eq!(parse_gwei("20").unwrap(), 20_000_000_000);
        assert_eq!(parse_gwei("1.5").unwrap(), 1_500_000_000);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units("1.2.3", 18).is_err());
        assert!(parse_units("-1", 18).is_err());
        assert!(parse_units("abc", 18).is_err());
        assert!(parse_units("0.0000000001", 9).is_err());
    }

    #[test]
    fn format_trims_trailing_zeros() {
        assert_eq!(format_units(U256::from(1_000_000_000_000_000_000u64), 18), "1");
        assert_eq!(format_units(U256::from(1_500_000_000_000_000_000u64), 18), "1.5");
        assert_eq!(format_units(U256::from(420_000_000_000_000u64), 18), "0.00042");
        assert_eq!(format_units(U256::ZERO, 18), "0");
    }
}
