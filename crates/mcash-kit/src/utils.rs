//! Hex, UTF-8 and hashing helpers shared across the crate.

use sha3::{Digest, Keccak256};

use crate::error::Error;

/// Check whether a string is hex, with or without a `0x` prefix.
pub fn is_hex(s: &str) -> bool {
    let body = s.strip_prefix("0x").unwrap_or(s);
    !body.is_empty() && body.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Strip an optional `0x` prefix.
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Keccak-256 of raw bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Keccak-256 of a UTF-8 string, rendered as hex.
///
/// ```
/// assert_eq!(
///     mcash_kit::utils::sha3("transfer(address,uint256)", false)[..8].to_string(),
///     "a9059cbb"
/// );
/// ```
pub fn sha3(s: &str, prefix: bool) -> String {
    let digest = hex::encode(keccak256(s.as_bytes()));
    if prefix { format!("0x{digest}") } else { digest }
}

/// Decode hex into a UTF-8 string. Invalid sequences become U+FFFD.
pub fn to_utf8(hex: &str) -> Result<String, Error> {
    if !is_hex(hex) {
        return Err(Error::validation("The passed value is not a valid hex string"));
    }
    let bytes = decode_hex(hex)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Encode a UTF-8 string as `0x`-prefixed hex.
pub fn from_utf8(s: &str) -> String {
    format!("0x{}", hex::encode(s.as_bytes()))
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

/// Decode hex with an optional `0x` prefix. Odd lengths get a leading zero.
pub(crate) fn decode_hex(s: &str) -> Result<Vec<u8>, Error> {
    let body = strip_0x(s);
    let decoded = if body.len() % 2 == 1 {
        hex::decode(format!("0{body}"))
    } else {
        hex::decode(body)
    };
    decoded.map_err(|_| Error::validation("The passed value is not a valid hex string"))
}
