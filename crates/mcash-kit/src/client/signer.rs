//! Private keys and secp256k1 signing.
//!
//! Transactions are signed over the raw bytes of their id. Free-form
//! messages are signed over `keccak256(header || message)`, where the header
//! is [`MCASH_MESSAGE_HEADER`] or, for compatibility with Ethereum wallets,
//! [`ETH_MESSAGE_HEADER`].
//!
//! Every signature is rendered as `r || s || v` in hex, with `v` being the
//! recovery id plus 27.
//!
//! # Example
//!
//! ```rust
//! use mcash_kit::client::{PrivateKey, sign_message, verify_signature};
//!
//! let key = PrivateKey::random();
//! let signature = sign_message("0xdeadbeef", &key, true).unwrap();
//! assert!(verify_signature("0xdeadbeef", &key.address().to_base58(), &signature, true));
//! ```

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::error::{Error, SignerError};
use crate::types::{Address, Transaction};
use crate::utils::{decode_hex, is_hex, keccak256, strip_0x};

/// Header prepended to messages signed for the MCASH chain.
pub const MCASH_MESSAGE_HEADER: &str = "\x19MCASH Signed Message:\n32";

/// Header prepended to messages signed in Ethereum-compatible mode.
pub const ETH_MESSAGE_HEADER: &str = "\x19Ethereum Signed Message:\n32";

// ============================================================================
// PrivateKey
// ============================================================================

/// A secp256k1 private key.
///
/// `Debug` shows the derived address, never the key material.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Parse 32 bytes of hex, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, SignerError> {
        let body = strip_0x(s.trim());
        if body.len() != 64 {
            return Err(SignerError::InvalidPrivateKey);
        }
        let bytes = hex::decode(body).map_err(|_| SignerError::InvalidPrivateKey)?;
        SigningKey::from_slice(&bytes)
            .map(Self)
            .map_err(|_| SignerError::InvalidPrivateKey)
    }

    /// Generate a key from the thread RNG.
    pub fn random() -> Self {
        Self(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Lowercase hex, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// Uncompressed SEC1 public key (65 bytes, leading `0x04`).
    pub fn public_key(&self) -> Vec<u8> {
        self.0
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// The address this key controls.
    pub fn address(&self) -> Address {
        address_of(self.0.verifying_key())
    }

    /// Sign a 32-byte digest. The signature is normalized to low-S.
    pub fn sign_digest(&self, digest: &[u8]) -> Result<RecoverableSignature, SignerError> {
        let (signature, recovery_id) = self
            .0
            .sign_prehash_recoverable(digest)
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;

        let (signature, recovery_id) = match signature.normalize_s() {
            Some(normalized) => {
                let flipped = RecoveryId::from_byte(recovery_id.to_byte() ^ 1)
                    .ok_or_else(|| SignerError::SigningFailed("invalid recovery id".into()))?;
                (normalized, flipped)
            }
            None => (signature, recovery_id),
        };

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(RecoverableSignature {
            r,
            s,
            v: recovery_id.to_byte() + 27,
        })
    }
}

impl FromStr for PrivateKey {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.address())
    }
}

fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest[12..]);
    Address::from_account_hash(hash)
}

// ============================================================================
// RecoverableSignature
// ============================================================================

/// An ECDSA signature with its recovery byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// 27 or 28.
    pub v: u8,
}

impl RecoverableSignature {
    /// `r || s || v` as lowercase hex without a prefix.
    pub fn to_hex(&self) -> String {
        format!(
            "{}{}{}",
            hex::encode(self.r),
            hex::encode(self.s),
            hex::encode([self.v])
        )
    }

    /// Parse `r || s || v` hex. The recovery byte is read as 1 when it is
    /// `1c` and as 0 otherwise.
    pub fn from_hex(signature: &str) -> Result<Self, SignerError> {
        let body = strip_0x(signature);
        if body.len() < 130 || !body.is_ascii() {
            return Err(SignerError::InvalidSignature(signature.to_string()));
        }
        let decode = |range: std::ops::Range<usize>| -> Result<[u8; 32], SignerError> {
            let bytes = hex::decode(&body[range])
                .map_err(|_| SignerError::InvalidSignature(signature.to_string()))?;
            let mut out = [0u8; 32];
            out.copy_from_slice(&bytes);
            Ok(out)
        };
        let v = if body[128..130].eq_ignore_ascii_case("1c") { 28 } else { 27 };
        Ok(Self {
            r: decode(0..64)?,
            s: decode(64..128)?,
            v,
        })
    }

    /// Recover the signing address for a 32-byte digest.
    pub fn recover(&self, digest: &[u8]) -> Result<Address, SignerError> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        let signature = Signature::from_slice(&bytes)
            .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
        let recovery_id = RecoveryId::try_from(self.v.saturating_sub(27))
            .map_err(|e| SignerError::RecoveryFailed(e.to_string()))?;
        let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
            .map_err(|e| SignerError::RecoveryFailed(e.to_string()))?;
        Ok(address_of(&key))
    }
}

// ============================================================================
// Message signing
// ============================================================================

fn message_digest(message: &str, use_mcash_header: bool) -> Result<[u8; 32], Error> {
    let header = if use_mcash_header {
        MCASH_MESSAGE_HEADER
    } else {
        ETH_MESSAGE_HEADER
    };
    let mut bytes = header.as_bytes().to_vec();
    bytes.extend(decode_hex(message)?);
    Ok(keccak256(&bytes))
}

/// Sign a hex message. Returns `0x`-prefixed `r || s || v`.
pub fn sign_message(message: &str, key: &PrivateKey, use_mcash_header: bool) -> Result<String, Error> {
    if !is_hex(message) {
        return Err(Error::validation("Expected hex message input"));
    }
    let digest = message_digest(message, use_mcash_header)?;
    Ok(format!("0x{}", key.sign_digest(&digest)?.to_hex()))
}

/// Check that `signature` over a hex `message` was produced by `address`
/// (either address form). Never fails: malformed input yields `false`.
pub fn verify_signature(message: &str, address: &str, signature: &str, use_mcash_header: bool) -> bool {
    let Ok(digest) = message_digest(message, use_mcash_header) else {
        return false;
    };
    let Ok(expected) = address.parse::<Address>() else {
        return false;
    };
    RecoverableSignature::from_hex(signature)
        .and_then(|signature| signature.recover(&digest))
        .is_ok_and(|recovered| recovered == expected)
}

// ============================================================================
// Transaction signing
// ============================================================================

/// Sign a transaction id and append the signature.
///
/// Existing signatures are kept, so multi-signature transactions accumulate
/// one entry per signer.
pub fn sign_transaction(key: &PrivateKey, transaction: &mut Transaction) -> Result<(), Error> {
    let id = hex::decode(strip_0x(&transaction.tx_id))
        .map_err(|_| Error::validation("Invalid transaction provided"))?;
    if id.len() != 32 {
        return Err(Error::validation("Invalid transaction provided"));
    }
    let signature = key.sign_digest(&id)?;
    transaction.signature.push(signature.to_hex());
    Ok(())
}

/// A freshly generated key pair.
#[derive(Clone, Debug)]
pub struct GeneratedAccount {
    /// Hex private key.
    pub private_key: String,
    /// Hex uncompressed public key.
    pub public_key: String,
    pub address: Address,
}

impl GeneratedAccount {
    pub(crate) fn generate() -> Self {
        let key = PrivateKey::random();
        Self {
            private_key: key.to_hex(),
            public_key: hex::encode(key.public_key()),
            address: key.address(),
        }
    }
}
