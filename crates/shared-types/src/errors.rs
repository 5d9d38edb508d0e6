//! # Error Types
//!
//! Errors raised while decoding shared value types.

use thiserror::Error;

/// An app hash string returned by the execution engine could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashDecodeError {
    /// The string is not valid hexadecimal.
    #[error("Malformed app hash {input:?}: {reason}")]
    Malformed { input: String, reason: String },
}

/// A key type selector from configuration is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown key type: {0} (expected ed25519 or secp256k1)")]
pub struct UnknownKeyType(pub String);
