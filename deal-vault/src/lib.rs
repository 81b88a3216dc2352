//! # deal-vault
//!
//! Credential vault for the CRM webhook secret.
//!
//! The webhook URL embeds an access token, so it is never stored in
//! plaintext. [`initialize`] generates a fresh key and IV, encrypts the URL,
//! and hands back all three as a [`Credential`] for the caller to persist.
//! On every sync call the credential is decrypted back into the URL.
//!
//! ```text
//! webhook URL → AES-256-GCM(key, iv) → encrypted_link
//!                   ↑        ↑
//!           32 random bytes  12 random bytes (getrandom)
//! ```
//!
//! GCM authenticates the ciphertext, so decrypting with the wrong key or IV
//! fails with [`VaultError::DecryptionFailed`] instead of yielding garbage.
//!
//! ## Example
//!
//! ```rust
//! let credential = dealsync_vault::initialize("https://example.bitrix/webhook").unwrap();
//! assert_eq!(credential.decrypt().unwrap(), "https://example.bitrix/webhook");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod encrypt;
mod error;

pub use encrypt::{decrypt, encrypt, initialize, Credential, IV_SIZE, KEY_SIZE, TAG_SIZE};
pub use error::VaultError;
