//! Decimal amount strings to and from integer base units.
//!
//! Amounts travel as decimal strings (`"1.5"`) and are converted with
//! integer arithmetic only. A string with more fractional digits than the
//! asset has decimals is an error; nothing is rounded or truncated.

use crate::error::{WalletError, WalletResult};

/// Decimals of the native coin (1 TON = 10^9 nanotons).
pub const TON_DECIMALS: u32 = 9;

/// Largest amount a `Coins` field can hold.
pub const MAX_COINS: u128 = (1u128 << 120) - 1;

fn invalid(amount: &str, reason: impl Into<String>) -> WalletError {
    WalletError::InvalidAmount {
        amount: amount.to_string(),
        reason: reason.into(),
    }
}

/// Parse a non-negative decimal string into base units with `decimals`
/// fractional digits.
///
/// ```
/// use ton_wallet::amount::parse_units;
///
/// assert_eq!(parse_units("1.5", 9).unwrap(), 1_500_000_000);
/// assert_eq!(parse_units("1.000000001", 9).unwrap(), 1_000_000_001);
/// assert!(parse_units("1.0000000001", 9).is_err());
/// ```
pub fn parse_units(text: &str, decimals: u32) -> WalletResult<u128> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid(text, "empty"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid(text, "negative"));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(text, "not a decimal number"));
    }
    if trimmed.contains('.') && fraction.is_empty() {
        return Err(invalid(text, "missing fractional digits"));
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(text, "not a decimal number"));
    }
    if fraction.len() > decimals as usize {
        return Err(invalid(
            text,
            format!("more than {decimals} fractional digits"),
        ));
    }

    let overflow = || invalid(text, "too large");
    let scale = 10u128.checked_pow(decimals).ok_or_else(overflow)?;

    let whole_units = whole
        .parse::<u128>()
        .map_err(|_| overflow())?
        .checked_mul(scale)
        .ok_or_else(overflow)?;

    let fraction_units = if fraction.is_empty() {
        0
    } else {
        let padding = decimals - fraction.len() as u32;
        fraction
            .parse::<u128>()
            .map_err(|_| overflow())?
            .checked_mul(10u128.pow(padding))
            .ok_or_else(overflow)?
    };

    let units = whole_units.checked_add(fraction_units).ok_or_else(overflow)?;
    if units > MAX_COINS {
        return Err(overflow());
    }
    Ok(units)
}

/// Like [`parse_units`] but also rejects zero.
pub fn parse_positive_units(text: &str, decimals: u32) -> WalletResult<u128> {
    match parse_units(text, decimals)? {
        0 => Err(invalid(text, "must be greater than zero")),
        units => Ok(units),
    }
}

/// Render base units as a decimal string without trailing zeros.
pub fn format_units(units: u128, decimals: u32) -> String {
    let decimals = decimals as usize;
    let digits = format!("{units:0>width$}", width = decimals + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}
