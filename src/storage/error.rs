// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! Error taxonomy for the storage layer.
//!
//! Backend- and database-specific errors are converted into [`StorageError`]
//! at the client and façade boundaries. Callers never see a raw `reqwest` or
//! `redb` error.

use super::kv::KvError;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No encryption key exists and none could be created or supplied.
    #[error("encryption unavailable: {0}")]
    EncryptionUnavailable(String),

    /// Wrong key or corrupt ciphertext.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The content-addressing backend could not be reached at initialization.
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    /// A backend call exceeded the configured timeout.
    #[error("backend {operation} timed out after {timeout_ms} ms")]
    BackendTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Unknown content identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// The envelope could not be written anywhere.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The persisted index document failed to parse.
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    /// A polled result did not become ready within the retry ceiling.
    #[error("result unavailable after {attempts} attempts")]
    ResultUnavailable { attempts: u32 },

    /// The operation needs a connected backend.
    #[error("{operation} is not supported in local-only mode")]
    Unsupported { operation: &'static str },

    /// A connected-mode backend call failed.
    #[error("backend {operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    /// The embedded key-value store failed.
    #[error("local store error: {0}")]
    LocalStore(#[from] KvError),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Stable machine-readable code, used in API error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::EncryptionUnavailable(_) => "encryption_unavailable",
            StorageError::DecryptionFailed(_) => "decryption_failed",
            StorageError::BackendUnreachable(_) => "backend_unreachable",
            StorageError::BackendTimeout { .. } => "backend_timeout",
            StorageError::NotFound(_) => "not_found",
            StorageError::StorageUnavailable(_) => "storage_unavailable",
            StorageError::IndexCorrupt(_) => "index_corrupt",
            StorageError::ResultUnavailable { .. } => "result_unavailable",
            StorageError::Unsupported { .. } => "unsupported",
            StorageError::Backend { .. } => "backend_error",
            StorageError::LocalStore(_) => "local_store_error",
            StorageError::PasswordHash(_) => "password_hash_error",
            StorageError::Serialization(_) => "serialization_error",
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = StorageError::BackendTimeout {
            operation: "cat",
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "backend cat timed out after 250 ms");

        let err = StorageError::Unsupported { operation: "pin" };
        assert_eq!(err.to_string(), "pin is not supported in local-only mode");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(StorageError::NotFound("x".into()).code(), "not_found");
        assert_eq!(
            StorageError::ResultUnavailable { attempts: 3 }.code(),
            "result_unavailable"
        );
        assert_eq!(
            StorageError::EncryptionUnavailable("no key".into()).code(),
            "encryption_unavailable"
        );
    }
}
