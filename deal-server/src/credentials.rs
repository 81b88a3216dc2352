//! Credential file persistence.
//!
//! The sealed webhook credential is stored as hex-encoded JSON:
//!
//! ```json
//! { "secret_key": "…", "iv": "…", "encrypted_link": "…" }
//! ```
//!
//! The file is owner-only (`0600`) on Unix. The plaintext URL is never written.
//! Saves go through a sibling temp file that is created owner-only and then
//! renamed over the target, so readers see either the old or the new
//! credential in full.

use crate::error::CredentialFileError;
use deal_vault::Credential;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Serialize, Deserialize)]
struct CredentialFile {
    secret_key: String,
    iv: String,
    encrypted_link: String,
}

/// Reads and writes the credential file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// A store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a credential has been saved.
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Write `credential`, replacing any previous one.
    pub async fn save(&self, credential: &Credential) -> Result<(), CredentialFileError> {
        let file = CredentialFile {
            secret_key: hex::encode(&credential.secret_key),
            iv: hex::encode(&credential.iv),
            encrypted_link: hex::encode(&credential.encrypted_link),
        };
        let contents =
            serde_json::to_string_pretty(&file).map_err(|e| CredentialFileError::Serialize {
                path: self.path.clone(),
                source: e,
            })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let tmp = self.temp_path()?;
        if let Err(e) = write_private(&tmp, contents.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.io_error(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.io_error(e));
        }

        tracing::info!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    /// Read the stored credential. `Ok(None)` if none has been saved.
    pub async fn load(&self) -> Result<Option<Credential>, CredentialFileError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let file: CredentialFile =
            serde_json::from_str(&contents).map_err(|e| CredentialFileError::Parse {
                path: self.path.clone(),
                source: e,
            })?;

        Ok(Some(Credential {
            secret_key: decode_field("secret_key", &file.secret_key)?,
            iv: decode_field("iv", &file.iv)?,
            encrypted_link: decode_field("encrypted_link", &file.encrypted_link)?,
        }))
    }

    /// `.<name>.tmp` next to the credential file.
    fn temp_path(&self) -> Result<PathBuf, CredentialFileError> {
        let name = self.path.file_name().ok_or_else(|| {
            self.io_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "credential path has no file name",
            ))
        })?;
        let mut tmp_name = OsString::from(".");
        tmp_name.push(name);
        tmp_name.push(".tmp");
        Ok(self.path.with_file_name(tmp_name))
    }

    fn io_error(&self, source: std::io::Error) -> CredentialFileError {
        CredentialFileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Create `path` fresh, owner-only on Unix, and flush `contents` to disk.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    // A leftover from an interrupted save may carry other permissions.
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, CredentialFileError> {
    hex::decode(value).map_err(|source| CredentialFileError::Hex { field, source })
}
