//! AES-256-GCM sealing of the webhook credential.
//!
//! This module provides:
//! - Fresh key and IV generation from the OS CSPRNG
//! - AES-256-GCM encryption of the webhook URL
//! - Length-checked, authenticated decryption

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::VaultError;

/// Size of the AES-256 key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the GCM initialization vector in bytes (96 bits).
pub const IV_SIZE: usize = 12;

/// Size of the GCM authentication tag appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// A sealed webhook credential: key, IV and ciphertext.
///
/// All three values are persisted together; the plaintext never is.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    /// AES-256 key.
    pub secret_key: Vec<u8>,
    /// GCM initialization vector.
    pub iv: Vec<u8>,
    /// Ciphertext of the webhook URL, tag included.
    pub encrypted_link: Vec<u8>,
}

impl Credential {
    /// Decrypt the stored webhook URL.
    pub fn decrypt(&self) -> Result<String, VaultError> {
        decrypt(&self.encrypted_link, &self.secret_key, &self.iv)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret_key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .field(
                "encrypted_link",
                &format!("[{} bytes]", self.encrypted_link.len()),
            )
            .finish()
    }
}

/// Seal a webhook URL under a freshly generated key and IV.
pub fn initialize(secret: &str) -> Result<Credential, VaultError> {
    if secret.trim().is_empty() {
        return Err(VaultError::EmptySecret);
    }

    let mut secret_key = vec![0u8; KEY_SIZE];
    let mut iv = vec![0u8; IV_SIZE];
    getrandom::getrandom(&mut secret_key)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;
    getrandom::getrandom(&mut iv).map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let encrypted_link = encrypt(secret.as_bytes(), &secret_key, &iv)?;

    Ok(Credential {
        secret_key,
        iv,
        encrypted_link,
    })
}

/// Encrypt `plaintext` with an explicit key and IV.
///
/// An IV must never be reused with the same key; [`initialize`] always draws
/// both fresh.
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, VaultError> {
    let cipher = cipher(key)?;
    let nonce = nonce(iv)?;
    cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))
}

/// Decrypt a credential ciphertext back into the webhook URL.
///
/// Returns `DecryptionFailed` if authentication fails, which is what a wrong
/// key, a wrong IV or a tampered ciphertext all look like.
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<String, VaultError> {
    let cipher = cipher(key)?;
    let nonce = nonce(iv)?;
    if ciphertext.len() < TAG_SIZE {
        return Err(VaultError::InvalidCiphertext(ciphertext.len()));
    }

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::DecryptionFailed)?;
    String::from_utf8(plaintext).map_err(|_| VaultError::InvalidUtf8)
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm, VaultError> {
    Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::InvalidKeyLength {
        expected: KEY_SIZE,
        actual: key.len(),
    })
}

fn nonce(iv: &[u8]) -> Result<&Nonce<aes_gcm::aead::consts::U12>, VaultError> {
    if iv.len() != IV_SIZE {
        return Err(VaultError::InvalidIvLength {
            expected: IV_SIZE,
            actual: iv.len(),
        });
    }
    Ok(Nonce::from_slice(iv))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBHOOK: &str = "https://example.bitrix/webhook";

    #[test]
    fn initialize_then_decrypt_returns_the_url() {
        let credential = initialize(WEBHOOK).unwrap();
        assert_eq!(credential.decrypt().unwrap(), WEBHOOK);
    }

    #[test]
    fn initialize_generates_cipher_sized_material() {
        let credential = initialize(WEBHOOK).unwrap();
        assert_eq!(credential.secret_key.len(), KEY_SIZE);
        assert_eq!(credential.iv.len(), IV_SIZE);
        assert_eq!(credential.encrypted_link.len(), WEBHOOK.len() + TAG_SIZE);
    }

    #[test]
    fn ciphertext_does_not_contain_the_url() {
        let credential = initialize(WEBHOOK).unwrap();
        let haystack = String::from_utf8_lossy(&credential.encrypted_link);
        assert!(!haystack.contains("example.bitrix"));
    }

    #[test]
    fn each_initialize_draws_fresh_key_and_iv() {
        let a = initialize(WEBHOOK).unwrap();
        let b = initialize(WEBHOOK).unwrap();
        assert_ne!(a.secret_key, b.secret_key);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.encrypted_link, b.encrypted_link);
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert_eq!(initialize(""), Err(VaultError::EmptySecret));
        assert_eq!(initialize("   "), Err(VaultError::EmptySecret));
    }

    #[test]
    fn roundtrip_with_explicit_key_and_iv() {
        let key = [0x11; KEY_SIZE];
        let iv = [0x22; IV_SIZE];
        let secrets = [
            "https://portal.example/rest/1/abcdef/",
            "x",
            "юникод-вебхук",
        ];
        for secret in secrets {
            let ciphertext = encrypt(secret.as_bytes(), &key, &iv).unwrap();
            assert_eq!(decrypt(&ciphertext, &key, &iv).unwrap(), secret);
        }
    }

    #[test]
    fn decrypt_wrong_key_fails() {
        let credential = initialize(WEBHOOK).unwrap();
        let wrong_key = [0xAB; KEY_SIZE];

        let result = decrypt(&credential.encrypted_link, &wrong_key, &credential.iv);
        assert_eq!(result, Err(VaultError::DecryptionFailed));
    }

    #[test]
    fn decrypt_wrong_iv_fails() {
        let credential = initialize(WEBHOOK).unwrap();
        let wrong_iv = [0xFF; IV_SIZE];

        let result = decrypt(&credential.encrypted_link, &credential.secret_key, &wrong_iv);
        assert_eq!(result, Err(VaultError::DecryptionFailed));
    }

    #[test]
    fn decrypt_tampered_ciphertext_fails() {
        let credential = initialize(WEBHOOK).unwrap();
        let mut tampered = credential.encrypted_link.clone();
        tampered[0] ^= 0x01;

        let result = decrypt(&tampered, &credential.secret_key, &credential.iv);
        assert_eq!(result, Err(VaultError::DecryptionFailed));
    }

    #[test]
    fn decrypt_rejects_bad_lengths() {
        let key = [0x11; KEY_SIZE];
        let iv = [0x22; IV_SIZE];

        assert_eq!(
            decrypt(&[0u8; 32], &key[..16], &iv),
            Err(VaultError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: 16
            })
        );
        assert_eq!(
            decrypt(&[0u8; 32], &key, &iv[..8]),
            Err(VaultError::InvalidIvLength {
                expected: IV_SIZE,
                actual: 8
            })
        );
        assert_eq!(
            decrypt(&[0u8; 4], &key, &iv),
            Err(VaultError::InvalidCiphertext(4))
        );
    }

    #[test]
    fn debug_output_redacts_key_material() {
        let credential = initialize(WEBHOOK).unwrap();
        let debug = format!("{credential:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&format!("{:?}", credential.secret_key)));
    }
}
