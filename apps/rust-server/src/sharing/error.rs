// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy of the sharing core.
//!
//! Every failure of a sharing operation is reported as exactly one of these
//! kinds. Lower-level errors are folded in through the `From` impls below;
//! anything unexpected becomes `Internal`, whose detail is logged but never
//! sent to the client.

use axum::http::StatusCode;

use crate::crypto::{CipherError, ReferenceError};
use crate::storage::{DbError, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    /// Malformed, tampered or foreign file reference.
    #[error("Invalid or malformed file ID.")]
    InvalidReference,

    /// Missing or malformed request field.
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated,

    /// Authenticated, but neither owner nor holder of a suitable grant.
    #[error("You do not have permission to {operation} this file.")]
    PermissionDenied { operation: &'static str },

    /// File, user or grant absent.
    #[error("{0}")]
    NotFound(String),

    /// Bad key, IV, padding or ciphertext. Never retried.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Content operation exceeded its time bound.
    #[error("The operation timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ShareError {
    /// Stable machine-readable kind, used in logs and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            ShareError::InvalidReference => "invalid_reference",
            ShareError::Validation(_) => "validation_error",
            ShareError::Unauthenticated => "unauthenticated",
            ShareError::PermissionDenied { .. } => "permission_denied",
            ShareError::NotFound(_) => "not_found",
            ShareError::Decryption(_) => "decryption_error",
            ShareError::Timeout => "timeout",
            ShareError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ShareError::InvalidReference | ShareError::Validation(_) => StatusCode::BAD_REQUEST,
            ShareError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ShareError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            ShareError::NotFound(_) => StatusCode::NOT_FOUND,
            ShareError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ShareError::Decryption(_) | ShareError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to the client.
    pub fn public_message(&self) -> String {
        match self {
            ShareError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ShareError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ShareError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ShareError::Internal(message.into())
    }
}

impl From<ReferenceError> for ShareError {
    fn from(e: ReferenceError) -> Self {
        match e {
            ReferenceError::Invalid => ShareError::InvalidReference,
            other => ShareError::Internal(other.to_string()),
        }
    }
}

impl From<DbError> for ShareError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ShareError::NotFound(what),
            DbError::InvalidInput(what) => ShareError::Validation(what),
            DbError::Conflict(what) => ShareError::Validation(what),
            other => ShareError::Internal(other.to_string()),
        }
    }
}

impl From<CipherError> for ShareError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::InvalidKeyLength(_)
            | CipherError::InvalidIvLength(_)
            | CipherError::InvalidCiphertextLength(_)
            | CipherError::InvalidPadding => ShareError::Decryption(e.to_string()),
            CipherError::MissingAtRestKey | CipherError::TruncatedContent | CipherError::Rng => {
                ShareError::Internal(e.to_string())
            }
        }
    }
}

impl From<StorageError> for ShareError {
    fn from(e: StorageError) -> Self {
        ShareError::Internal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ShareError {
    fn from(e: tokio::task::JoinError) -> Self {
        ShareError::Internal(format!("background task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (ShareError::InvalidReference, 400),
            (ShareError::validation("missing field"), 400),
            (ShareError::Unauthenticated, 401),
            (ShareError::PermissionDenied { operation: "view" }, 403),
            (ShareError::not_found("File not found"), 404),
            (ShareError::Decryption("invalid padding".into()), 500),
            (ShareError::Timeout, 504),
            (ShareError::internal("disk on fire"), 500),
        ];
        for (error, status) in cases {
            assert_eq!(error.status_code().as_u16(), status, "{}", error.kind());
        }
    }

    #[test]
    fn internal_detail_is_not_public() {
        let error = ShareError::internal("redb commit error: /data/db");
        assert_eq!(error.public_message(), "Internal server error");
    }

    #[test]
    fn decryption_message_includes_reason() {
        let error: ShareError = CipherError::InvalidPadding.into();
        assert_eq!(error.kind(), "decryption_error");
        assert_eq!(error.public_message(), "Decryption failed: invalid padding");
    }

    #[test]
    fn reference_errors_fail_closed() {
        let error: ShareError = ReferenceError::Invalid.into();
        assert!(matches!(error, ShareError::InvalidReference));
    }

    #[test]
    fn db_errors_map_by_kind() {
        assert!(matches!(
            ShareError::from(DbError::NotFound("File 3".into())),
            ShareError::NotFound(_)
        ));
        assert!(matches!(
            ShareError::from(DbError::InvalidInput("bad".into())),
            ShareError::Validation(_)
        ));
        assert!(matches!(
            ShareError::from(DbError::SequenceExhausted("file_id")),
            ShareError::Internal(_)
        ));
    }

    #[test]
    fn rng_failure_is_internal() {
        assert!(matches!(
            ShareError::from(CipherError::Rng),
            ShareError::Internal(_)
        ));
    }
}
