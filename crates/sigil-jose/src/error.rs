//! Error types for the JOSE engine.
//!
//! Verification and decryption failures are deliberately generic so that
//! callers cannot be used as a padding or MAC oracle. Structural problems
//! (bad segment counts, unparseable keys) carry detail because they are
//! caller bugs, not attacker-controlled outcomes.

use thiserror::Error;

/// Result type alias for JOSE operations.
pub type JoseResult<T> = std::result::Result<T, JoseError>;

/// Error type for JOSE operations.
#[derive(Debug, Error)]
pub enum JoseError {
    /// Algorithm identifier is unknown or disabled by policy.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No key with the requested `kid` in the supplied key set.
    ///
    /// Distinct from [`JoseError::InvalidSignature`]: a missing key is
    /// recoverable by refreshing the key set, a failed signature is not.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Key material could not be parsed or does not fit the algorithm.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Token structure does not match its declared algorithm.
    ///
    /// Covers bad segment counts, undecodable base64url, and headers that
    /// are not well-formed JSON. A parse error is not a verification
    /// failure.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Signature did not verify.
    ///
    /// Only produced by callers that demand a valid signature; the
    /// lower-level verify operation reports a mismatch as `Ok(false)`.
    #[error("signature verification failed")]
    InvalidSignature,

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed.
    ///
    /// Carries no detail: key-unwrap failure and authentication-tag
    /// mismatch are indistinguishable from the outside.
    #[error("decryption failed")]
    DecryptionFailed,
}
