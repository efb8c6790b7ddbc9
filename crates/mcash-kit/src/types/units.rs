//! MCASH amounts.
//!
//! Amounts travel over the wire as integers of the smallest unit, the
//! matoshi (10^-8 MCASH).

use crate::error::ParseAmountError;

/// Matoshi per MCASH.
pub const MATOSHI_PER_MCASH: u64 = 100_000_000;

/// Number of decimal places in one MCASH.
const DECIMALS: usize = 8;

/// Convert a decimal MCASH string into matoshi.
///
/// Digits beyond the eighth decimal place are truncated.
pub fn to_matoshi(mcash: &str) -> Result<u64, ParseAmountError> {
    let s = mcash.trim();
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((s, ""));

    if integer_part.is_empty() && decimal_part.is_empty() {
        return Err(ParseAmountError::InvalidNumber(s.to_string()));
    }

    // `u64::from_str` would also take a sign.
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !digits(integer_part) || !digits(decimal_part) {
        return Err(ParseAmountError::InvalidNumber(s.to_string()));
    }

    let integer: u64 = if integer_part.is_empty() {
        0
    } else {
        integer_part
            .parse()
            .map_err(|_| ParseAmountError::InvalidNumber(s.to_string()))?
    };

    let decimal_str = &decimal_part[..decimal_part.len().min(DECIMALS)];
    let decimal: u64 = if decimal_str.is_empty() {
        0
    } else {
        decimal_str
            .parse()
            .map_err(|_| ParseAmountError::InvalidNumber(s.to_string()))?
    };
    let decimal_matoshi = decimal * 10u64.pow((DECIMALS - decimal_str.len()) as u32);

    integer
        .checked_mul(MATOSHI_PER_MCASH)
        .and_then(|v| v.checked_add(decimal_matoshi))
        .ok_or(ParseAmountError::Overflow)
}

/// Render a matoshi amount as a decimal MCASH string without trailing zeros.
pub fn from_matoshi(matoshi: u64) -> String {
    let whole = matoshi / MATOSHI_PER_MCASH;
    let remainder = matoshi % MATOSHI_PER_MCASH;
    if remainder == 0 {
        return whole.to_string();
    }
    let decimal = format!("{:0width$}", remainder, width = DECIMALS);
    format!("{}.{}", whole, decimal.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_matoshi() {
        assert_eq!(to_matoshi("1").unwrap(), 100_000_000);
        assert_eq!(to_matoshi("1.5").unwrap(), 150_000_000);
        assert_eq!(to_matoshi(".00000001").unwrap(), 1);
        assert_eq!(to_matoshi("0.123456789").unwrap(), 12_345_678);
    }

    #[test]
    fn test_to_matoshi_invalid() {
        assert!(matches!(to_matoshi("abc"), Err(ParseAmountError::InvalidNumber(_))));
        assert!(matches!(to_matoshi("."), Err(ParseAmountError::InvalidNumber(_))));
        assert!(matches!(to_matoshi("1.+5"), Err(ParseAmountError::InvalidNumber(_))));
        assert!(matches!(to_matoshi("+1"), Err(ParseAmountError::InvalidNumber(_))));
        assert!(matches!(to_matoshi("1.-5"), Err(ParseAmountError::InvalidNumber(_))));
        assert!(matches!(to_matoshi("1 .5"), Err(ParseAmountError::InvalidNumber(_))));
        assert!(matches!(
            to_matoshi("999999999999999999"),
            Err(ParseAmountError::Overflow)
        ));
    }

    #[test]
    fn test_from_matoshi() {
        assert_eq!(from_matoshi(0), "0");
        assert_eq!(from_matoshi(100_000_000), "1");
        assert_eq!(from_matoshi(150_000_000), "1.5");
        assert_eq!(from_matoshi(1), "0.00000001");
    }
}
