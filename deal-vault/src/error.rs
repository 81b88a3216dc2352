//! Error types for deal-vault.

use thiserror::Error;

/// Errors that can occur while sealing or opening a credential.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VaultError {
    /// No secret was supplied.
    #[error("secret must not be empty")]
    EmptySecret,

    /// Encryption operation failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Key has the wrong length for AES-256.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// IV has the wrong length for GCM.
    #[error("invalid iv length: expected {expected}, got {actual}")]
    InvalidIvLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Ciphertext is too short to carry an authentication tag.
    #[error("invalid ciphertext length: {0} bytes")]
    InvalidCiphertext(usize),

    /// Decryption failed (authentication error).
    /// No details provided to prevent timing attacks.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Decrypted bytes are not a UTF-8 string.
    #[error("decrypted secret is not valid UTF-8")]
    InvalidUtf8,
}
