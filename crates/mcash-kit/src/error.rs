//! Error types for mcash-kit.
//!
//! # Error Hierarchy
//!
//! - [`Error`](enum@Error): Main error type, returned by most operations
//!   - [`RpcError`]: Transport failures (HTTP status, malformed JSON, retries)
//!   - [`AbiError`]: ABI encoding and decoding failures
//!   - [`ParseAmountError`]: Invalid MCASH amount format
//!   - [`SignerError`]: Key parsing, signing and recovery failures
//!   - [`PluginError`]: Plugin registration failures
//!
//! Validation failures are reported before any request is made and carry the
//! exact message of the first rule that failed:
//!
//! ```rust,no_run
//! use mcash_kit::*;
//!
//! # async fn example() -> Result<(), Error> {
//! let mcash = Mcash::full_host("https://api.mcash.network").build()?;
//!
//! match mcash.transaction_builder().send_mcash("not-an-address", 10, TransferOptions::default()).await {
//!     Err(Error::Validation(message)) => assert_eq!(message, "Invalid recipient address provided"),
//!     other => println!("{:?}", other),
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

use crate::types::Transaction;

// ============================================================================
// Leaf errors
// ============================================================================

/// Error parsing or using a private key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("Invalid private key provided")]
    InvalidPrivateKey,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Public key recovery failed: {0}")]
    RecoveryFailed(String),
}

/// Error parsing an MCASH amount.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseAmountError {
    #[error("Invalid number in amount: '{0}'")]
    InvalidNumber(String),

    #[error("Amount overflow: value too large")]
    Overflow,
}

/// Error encoding or decoding ABI parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("invalid type: {0}")]
    InvalidType(String),

    #[error("types/values length mismatch (count={{\"types\":{types},\"values\":{values}}})")]
    LengthMismatch { types: usize, values: usize },

    #[error("invalid {kind} value: {value}")]
    InvalidValue { kind: String, value: String },

    #[error("hex string must have 0x prefix")]
    MissingHexPrefix,

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("The encoded string is not valid. Its length must be a multiple of 64.")]
    InvalidLength,

    #[error("invalid offset {offset} for data of length {length}")]
    InvalidOffset { offset: usize, length: usize },

    #[error("dynamic bytes count too large")]
    TruncatedData,
}

/// Transport-level errors raised by a [`Provider`](crate::Provider).
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {message}")]
    Network {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
    },

    #[error("Timeout after {0} retries")]
    Timeout(u32),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
}

impl RpcError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Http(e) => e.is_timeout() || e.is_connect(),
            RpcError::Timeout(_) => true,
            RpcError::Network { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>, status_code: Option<u16>, retryable: bool) -> Self {
        RpcError::Network {
            message: message.into(),
            status_code,
            retryable,
        }
    }
}

/// Error registering a plugin.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PluginError {
    #[error("The plugin is not compatible with this version of mcash-kit")]
    Incompatible { requires: String, version: String },

    #[error("Invalid plugin version requirement '{0}'")]
    InvalidRequirement(String),
}

/// Identifies which permission failure the node reported while checking
/// multi-signature weight.
///
/// The node phrases these as free text; the identifiers keep its wording
/// (`"not contained of permission"`, `"permission isn't exit"`) so callers
/// can match on a stable kind instead of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionErrorKind {
    /// The signing key is not part of the selected permission.
    NotContainedOfPermission,
    /// The selected permission id does not exist on the account.
    PermissionIsntExit,
    /// Any other `PERMISSION_ERROR` message.
    Other,
}

impl PermissionErrorKind {
    /// Classify a node permission message.
    pub fn classify(message: &str) -> Self {
        if message.contains("not contained of permission") {
            PermissionErrorKind::NotContainedOfPermission
        } else if message.contains("permission isn't exit") {
            PermissionErrorKind::PermissionIsntExit
        } else {
            PermissionErrorKind::Other
        }
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

/// Main error type for mcash-kit operations.
#[derive(Debug, Error)]
pub enum Error {
    // ─── Configuration ───
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No event server configured")]
    NoEventServer,

    #[error("Function requires either a private key or address to be set")]
    NoSigner,

    // ─── Local checks ───
    /// A rule from the parameter validator (or an equivalent local check)
    /// rejected the input. The message is the one shown to end users.
    #[error("{0}")]
    Validation(String),

    /// The operation is not valid for the current lifecycle state.
    #[error("{0}")]
    State(String),

    #[error(transparent)]
    ParseAmount(#[from] ParseAmountError),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    // ─── Remote ───
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The node answered with an error message, passed through unmodified.
    #[error("{0}")]
    Remote(String),

    #[error("{message}")]
    Permission {
        kind: PermissionErrorKind,
        message: String,
    },

    #[error("Broadcast failed ({code}): {message}")]
    Broadcast { code: String, message: String },

    // ─── Contract execution ───
    /// A constant call reverted.
    #[error("{0}")]
    Revert(String),

    #[error("{message}")]
    Execution {
        message: String,
        transaction: Box<Transaction>,
        output: Option<serde_json::Value>,
    },

    #[error("Cannot find result in solidity node")]
    ResultNotFound { transaction: Box<Transaction> },
}

impl Error {
    /// Shorthand for a validation failure.
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Shorthand for a lifecycle-state failure.
    pub(crate) fn state(message: impl Into<String>) -> Self {
        Error::State(message.into())
    }

    /// The transaction attached to an execution or polling failure.
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            Error::Execution { transaction, .. } | Error::ResultNotFound { transaction } => {
                Some(transaction)
            }
            _ => None,
        }
    }

    /// Returns true if the node reported the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Remote(message) | Error::Validation(message) => {
                message.contains("does not exist") || message.contains("not found")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Display tests
    // ========================================================================

    #[test]
    fn test_validation_error_display_is_verbatim() {
        let err = Error::validation("Invalid recipient address provided");
        assert_eq!(err.to_string(), "Invalid recipient address provided");
    }

    #[test]
    fn test_abi_error_display() {
        assert_eq!(
            AbiError::InvalidLength.to_string(),
            "The encoded string is not valid. Its length must be a multiple of 64."
        );
        assert_eq!(
            AbiError::MissingHexPrefix.to_string(),
            "hex string must have 0x prefix"
        );
        assert_eq!(
            AbiError::TruncatedData.to_string(),
            "dynamic bytes count too large"
        );
    }

    #[test]
    fn test_result_not_found_carries_transaction() {
        let tx: Transaction = serde_json::from_value(serde_json::json!({
            "tx_id": "ab",
            "raw_data": {}
        }))
        .unwrap();
        let err = Error::ResultNotFound {
            transaction: Box::new(tx),
        };
        assert_eq!(err.to_string(), "Cannot find result in solidity node");
        assert_eq!(err.transaction().unwrap().tx_id, "ab");
    }

    #[test]
    fn test_plugin_error_display() {
        let err = PluginError::Incompatible {
            requires: "^9".into(),
            version: "0.3.0".into(),
        };
        assert_eq!(
            err.to_string(),
            "The plugin is not compatible with this version of mcash-kit"
        );
    }

    // ========================================================================
    // Classification tests
    // ========================================================================

    #[test]
    fn test_permission_kind_classify() {
        assert_eq!(
            PermissionErrorKind::classify("address xyz is not contained of permission"),
            PermissionErrorKind::NotContainedOfPermission
        );
        assert_eq!(
            PermissionErrorKind::classify("permission isn't exit"),
            PermissionErrorKind::PermissionIsntExit
        );
        assert_eq!(
            PermissionErrorKind::classify("something else"),
            PermissionErrorKind::Other
        );
    }

    #[test]
    fn test_rpc_error_retryable() {
        assert!(RpcError::network("HTTP 503", Some(503), true).is_retryable());
        assert!(!RpcError::network("HTTP 400", Some(400), false).is_retryable());
        assert!(RpcError::Timeout(3).is_retryable());
        assert!(!RpcError::InvalidResponse("x".into()).is_retryable());
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::Remote("Contract does not exist".into()).is_not_found());
        assert!(!Error::Remote("boom".into()).is_not_found());
    }
}
