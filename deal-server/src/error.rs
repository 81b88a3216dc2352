//! Error types for dealsync-server.

use std::path::PathBuf;

use axum::http::StatusCode;
use deal_client::ClientError;
use deal_types::Ineligible;
use deal_vault::VaultError;

/// Errors surfaced by a sync operation.
///
/// Each variant maps to one HTTP status; see [`SyncError::status_code`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Missing or malformed caller input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The remote deal failed the category/price-type check.
    #[error(transparent)]
    Eligibility(#[from] Ineligible),

    /// The stored credential could not be decrypted.
    #[error("credential decryption failed: {0}")]
    Decryption(#[source] VaultError),

    /// A new credential could not be sealed.
    #[error("credential encryption failed: {0}")]
    Encryption(#[source] VaultError),

    /// No credential has been initialized yet.
    #[error("no credential configured")]
    CredentialMissing,

    /// The credential file could not be read or written.
    #[error("credential file error: {0}")]
    Credential(#[from] CredentialFileError),

    /// The remote reports no deal with this id.
    #[error("deal {0} not found")]
    NotFound(i64),

    /// The remote could not be reached or broke its contract.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(#[from] ClientError),

    /// Store failure that could not be degraded.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The call did not finish within the configured timeout.
    #[error("sync call timed out after {0} seconds")]
    Timeout(u64),
}

impl SyncError {
    /// HTTP status for this error kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::Validation(_) => StatusCode::BAD_REQUEST,
            SyncError::Eligibility(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SyncError::Decryption(_)
            | SyncError::Encryption(_)
            | SyncError::Credential(_)
            | SyncError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SyncError::CredentialMissing => StatusCode::CONFLICT,
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::RemoteUnavailable(_) => StatusCode::BAD_GATEWAY,
            SyncError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Message safe to return to callers.
    ///
    /// Internal detail (SQL, cipher and file errors) is replaced by a generic
    /// text; the full error is logged by the HTTP layer.
    pub fn public_message(&self) -> String {
        match self {
            SyncError::Decryption(_) => "credential could not be decrypted".to_string(),
            SyncError::Encryption(_) => "credential could not be sealed".to_string(),
            SyncError::Credential(_) => "credential file could not be accessed".to_string(),
            SyncError::Storage(_) => "local store failure".to_string(),
            SyncError::RemoteUnavailable(_) => "remote CRM unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// `upsert_many` was called with no records.
    #[error("empty batch for table {table}")]
    EmptyBatch {
        /// Target table.
        table: &'static str,
    },

    /// Every row of a batch failed.
    #[error("all {count} rows failed for table {table}: {first}")]
    BatchFailed {
        /// Target table.
        table: &'static str,
        /// Number of rows attempted.
        count: usize,
        /// First row error.
        first: String,
    },

    /// A filter named a column the table does not have.
    #[error("unknown column {column} for table {table}")]
    UnknownColumn {
        /// Target table.
        table: &'static str,
        /// The rejected column.
        column: String,
    },

    /// A stored row could not be converted back into a record.
    #[error("invalid row in {table}: {reason}")]
    InvalidRow {
        /// Source table.
        table: &'static str,
        /// Conversion failure.
        reason: String,
    },

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Credential file errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialFileError {
    /// Reading or writing the file failed.
    #[error("credential file {path}: {source}")]
    Io {
        /// Credential file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid credential JSON.
    #[error("credential file {path} is malformed: {source}")]
    Parse {
        /// Credential file path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The credential could not be encoded for writing.
    #[error("credential for {path} could not be encoded: {source}")]
    Serialize {
        /// Credential file path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A field is not valid hex.
    #[error("credential field {field} is not hex: {source}")]
    Hex {
        /// Field name.
        field: &'static str,
        /// Underlying decode error.
        source: hex::FromHexError,
    },
}

/// Result type alias for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
