//! Token Amount Conversion
//!
//! Converts between human-readable decimal strings and raw token base units
//! using integer arithmetic only. On-chain amounts never pass through `f64`.

use alloy::primitives::U256;

use crate::error::TransferError;

/// Highest decimals value whose scale factor fits in a U256
pub const MAX_DECIMALS: u8 = 77;

/// Convert a human-readable amount to raw token units.
///
/// Accepts plain decimal notation (`"10"`, `"10.5"`, `".5"`, `"10."`). Signs,
/// exponents and non-digit characters are rejected. Fractional digits beyond
/// `decimals` are rounded half-up, so the result equals
/// `round(amount * 10^decimals)`.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256, TransferError> {
    let invalid = |reason: &str| TransferError::InvalidAmount {
        amount: amount.to_string(),
        reason: reason.to_string(),
    };

    if decimals > MAX_DECIMALS {
        return Err(invalid("token decimals out of range"));
    }

    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(invalid("amount is empty"));
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (trimmed, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid("amount has no digits"));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid("amount must be a non-negative decimal number"));
    }

    let scale = decimals as usize;
    let (kept, dropped) = if frac_part.len() > scale {
        frac_part.split_at(scale)
    } else {
        (frac_part, "")
    };

    let mut digits = String::with_capacity(int_part.len() + scale);
    digits.push_str(int_part);
    digits.push_str(kept);
    for _ in kept.len()..scale {
        digits.push('0');
    }
    let digits = digits.trim_start_matches('0');

    let mut value = if digits.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(digits, 10).map_err(|_| invalid("amount exceeds 256 bits"))?
    };

    if dropped.as_bytes().first().is_some_and(|&d| d >= b'5') {
        value = value
            .checked_add(U256::from(1u8))
            .ok_or_else(|| invalid("amount exceeds 256 bits"))?;
    }

    Ok(value)
}

/// Convert raw token units back to a human-readable decimal string.
///
/// Trailing fractional zeros are dropped (`1500000` @ 6 -> `"1.5"`).
pub fn from_base_units(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let scale = decimals as usize;
    if scale == 0 {
        return digits;
    }

    let padded = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
    } else {
        digits
    };

    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}
