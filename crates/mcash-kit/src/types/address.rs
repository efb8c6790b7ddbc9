//! MCASH addresses.
//!
//! An address is 21 bytes: the network prefix byte `0x32` followed by the
//! last 20 bytes of the keccak256 hash of an uncompressed secp256k1 public key.
//! It has two textual forms:
//!
//! - **base58check** (`MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE`) for people
//! - **prefixed hex** (`32bf82fd…`) on the wire
//!
//! The free functions [`to_hex`], [`from_hex`], [`from_private_key`] and
//! [`is_address`] work on strings in either form; [`Address`] is the validated
//! value type.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::error::{Error, SignerError};
use crate::utils::is_hex;

/// Network prefix byte of every address.
pub const ADDRESS_PREFIX_BYTE: u8 = 0x32;
/// Network prefix rendered as hex.
pub const ADDRESS_PREFIX: &str = "32";
/// Length of an address in bytes (prefix + 20 byte hash).
pub const ADDRESS_LENGTH: usize = 21;
/// Length of the hex form.
pub const ADDRESS_HEX_LENGTH: usize = 42;
/// Length of the base58check form.
pub const ADDRESS_BASE58_LENGTH: usize = 34;

/// A validated 21-byte MCASH address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Create from raw bytes, checking the network prefix.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; ADDRESS_LENGTH] = bytes
            .try_into()
            .map_err(|_| Error::validation("Invalid address provided"))?;
        if bytes[0] != ADDRESS_PREFIX_BYTE {
            return Err(Error::validation("Invalid address provided"));
        }
        Ok(Self(bytes))
    }

    /// Build an address from a 20-byte account hash (the ABI `address` form).
    pub fn from_account_hash(hash: [u8; 20]) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[0] = ADDRESS_PREFIX_BYTE;
        bytes[1..].copy_from_slice(&hash);
        Self(bytes)
    }

    /// Derive the address of an uncompressed secp256k1 public key
    /// (65 bytes, leading `0x04`).
    pub fn from_public_key(uncompressed: &[u8]) -> Result<Self, Error> {
        if uncompressed.len() != 65 || uncompressed[0] != 0x04 {
            return Err(SignerError::InvalidSignature("expected uncompressed public key".into()).into());
        }
        let digest = Keccak256::digest(&uncompressed[1..]);
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&digest[12..]);
        Ok(Self::from_account_hash(hash))
    }

    /// The raw 21 bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// The 20-byte hash without the network prefix.
    pub fn account_hash(&self) -> [u8; 20] {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&self.0[1..]);
        hash
    }

    /// Lowercase prefixed hex form (`32…`).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Base58check form.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).with_check().into_string()
    }

    /// Chain-neutral form used inside ABI payloads (`0x` + 20 byte hash).
    pub fn to_abi_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0[1..]))
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parse either textual form. `0x`-prefixed hex is read as if the
    /// prefix were the network byte.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_address(s) {
            let normalized = s.to_lowercase();
            // `0x` + 40 hex chars is accepted as an ABI style address.
            if let Some(body) = normalized.strip_prefix("0x") {
                if body.len() == 40 && is_hex(body) {
                    let bytes = hex::decode(format!("{ADDRESS_PREFIX}{body}"))
                        .map_err(|_| Error::validation("Invalid address provided"))?;
                    return Self::from_bytes(&bytes);
                }
            }
            return Err(Error::validation("Invalid address provided"));
        }
        let hex = to_hex(s)?;
        let bytes = hex::decode(hex).map_err(|_| Error::validation("Invalid address provided"))?;
        Self::from_bytes(&bytes)
    }
}

impl TryFrom<&str> for Address {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// String codec
// ============================================================================

/// Convert an address to prefixed lowercase hex.
///
/// Hex input is returned lowercased with a leading `0x` swapped for the
/// network prefix, so the call is idempotent. Base58 input must carry a
/// valid checksum.
pub fn to_hex(address: &str) -> Result<String, Error> {
    if is_hex(address) {
        let lower = address.to_lowercase();
        return Ok(match lower.strip_prefix("0x") {
            Some(body) => format!("{ADDRESS_PREFIX}{body}"),
            None => lower,
        });
    }
    let bytes = decode_base58(address)?;
    Ok(hex::encode(bytes))
}

/// Convert an address to base58check.
///
/// Anything that is not hex is returned unchanged, so the call is idempotent.
pub fn from_hex(address: &str) -> Result<String, Error> {
    if !is_hex(address) {
        return Ok(address.to_string());
    }
    let lower = address.to_lowercase();
    let body = match lower.strip_prefix("0x") {
        Some(body) => format!("{ADDRESS_PREFIX}{body}"),
        None => lower,
    };
    let bytes = hex::decode(&body).map_err(|_| Error::validation("Invalid address provided"))?;
    Ok(bs58::encode(bytes).with_check().into_string())
}

/// Derive the base58 address owned by a hex private key.
///
/// Returns `None` for anything that is not a valid secp256k1 scalar.
pub fn from_private_key(private_key: &str) -> Option<String> {
    crate::client::PrivateKey::from_hex(private_key)
        .ok()
        .map(|key| key.address().to_base58())
}

/// Check whether a string is a well-formed address in either form.
///
/// Never fails: malformed input of any kind yields `false`.
pub fn is_address(candidate: &str) -> bool {
    if candidate.len() == ADDRESS_HEX_LENGTH {
        return match hex::decode(candidate) {
            Ok(bytes) => is_address(&bs58::encode(bytes).with_check().into_string()),
            Err(_) => false,
        };
    }
    is_valid_base58(candidate)
}

fn is_valid_base58(candidate: &str) -> bool {
    if candidate.len() != ADDRESS_BASE58_LENGTH {
        return false;
    }
    match bs58::decode(candidate).with_check(None).into_vec() {
        Ok(bytes) => bytes.len() == ADDRESS_LENGTH && bytes[0] == ADDRESS_PREFIX_BYTE,
        Err(_) => false,
    }
}

fn decode_base58(address: &str) -> Result<Vec<u8>, Error> {
    let bytes = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|_| Error::validation("Invalid address provided"))?;
    if bytes.len() != ADDRESS_LENGTH || bytes[0] != ADDRESS_PREFIX_BYTE {
        return Err(Error::validation("Invalid address provided"));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS_HEX: &str = "32bf82fd6597cd3200c468220ecd7cf47c1a4cb149";
    const ADDRESS_BASE58: &str = "MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE";
    const PRIVATE_KEY: &str = "1c78d4d86dc31acb08a9eb132b9306bd1c86ea426083e0e0b32308606d212a98";

    // ========================================================================
    // Conversion tests
    // ========================================================================

    #[test]
    fn test_to_hex_from_base58() {
        assert_eq!(to_hex(ADDRESS_BASE58).unwrap(), ADDRESS_HEX);
    }

    #[test]
    fn test_to_hex_is_idempotent() {
        assert_eq!(to_hex(ADDRESS_HEX).unwrap(), ADDRESS_HEX);
        assert_eq!(to_hex(&ADDRESS_HEX.to_uppercase()).unwrap(), ADDRESS_HEX);
    }

    #[test]
    fn test_to_hex_replaces_0x_with_prefix() {
        let evm = format!("0x{}", &ADDRESS_HEX[2..]);
        assert_eq!(to_hex(&evm).unwrap(), ADDRESS_HEX);
    }

    #[test]
    fn test_from_hex() {
        assert_eq!(from_hex(ADDRESS_HEX).unwrap(), ADDRESS_BASE58);
        assert_eq!(from_hex(ADDRESS_BASE58).unwrap(), ADDRESS_BASE58);
    }

    #[test]
    fn test_round_trip_both_forms() {
        for address in [ADDRESS_HEX, ADDRESS_BASE58] {
            let hex = to_hex(address).unwrap();
            let base58 = from_hex(address).unwrap();
            assert_eq!(to_hex(&from_hex(&hex).unwrap()).unwrap(), hex);
            assert_eq!(from_hex(&to_hex(&base58).unwrap()).unwrap(), base58);
        }
    }

    #[test]
    fn test_to_hex_rejects_bad_checksum() {
        let mut tampered = ADDRESS_BASE58.to_string();
        tampered.pop();
        tampered.push('F');
        assert!(to_hex(&tampered).is_err());
    }

    // ========================================================================
    // Validation tests
    // ========================================================================

    #[test]
    fn test_is_address() {
        assert!(is_address(ADDRESS_BASE58));
        assert!(is_address(ADDRESS_HEX));
    }

    #[test]
    fn test_is_address_rejects_malformed() {
        assert!(!is_address(""));
        assert!(!is_address(&ADDRESS_BASE58[..33]));
        assert!(!is_address(&ADDRESS_HEX[..41]));
        assert!(!is_address("0x02fd6597cd3200c468220ecd7cf47c1a4cb149aa"));
        assert!(!is_address("zz".repeat(21).as_str()));
        assert!(!is_address("not an address at all"));
    }

    #[test]
    fn test_is_address_rejects_wrong_prefix() {
        let other_network = format!("41{}", &ADDRESS_HEX[2..]);
        assert!(!is_address(&other_network));
    }

    // ========================================================================
    // Key derivation tests
    // ========================================================================

    #[test]
    fn test_from_private_key() {
        assert_eq!(from_private_key(PRIVATE_KEY).as_deref(), Some(ADDRESS_BASE58));
    }

    #[test]
    fn test_from_private_key_invalid() {
        assert_eq!(from_private_key("xyz"), None);
        assert_eq!(from_private_key(&"00".repeat(32)), None);
    }

    // ========================================================================
    // Address type tests
    // ========================================================================

    #[test]
    fn test_address_parse_both_forms() {
        let a: Address = ADDRESS_BASE58.parse().unwrap();
        let b: Address = ADDRESS_HEX.parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), ADDRESS_HEX);
        assert_eq!(a.to_base58(), ADDRESS_BASE58);
        assert_eq!(a.to_string(), ADDRESS_BASE58);
    }

    #[test]
    fn test_address_abi_hex() {
        let a: Address = ADDRESS_HEX.parse().unwrap();
        assert_eq!(a.to_abi_hex(), "0xbf82fd6597cd3200c468220ecd7cf47c1a4cb149");
        let back: Address = a.to_abi_hex().parse().unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_address_serde_uses_hex() {
        let a: Address = ADDRESS_BASE58.parse().unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", ADDRESS_HEX));
        let back: Address = serde_json::from_str(&format!("\"{}\"", ADDRESS_BASE58)).unwrap();
        assert_eq!(back, a);
    }
}
