// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! At-rest protection of stored file content.
//!
//! Disabled by default: blobs are stored as the plaintext recovered from the
//! upload. When `AT_REST_KEY` is configured, each blob is written as
//! `iv || AES-256-CBC(content)` under the server key. Every file records
//! which form it was stored in, so turning the key on later does not break
//! files written before.

use super::cipher::{self, CipherError, IV_LEN, TRANSPORT_KEY_LEN};
use super::random_bytes;

/// Content plus whether it was encrypted under the server key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedContent {
    pub bytes: Vec<u8>,
    pub encrypted: bool,
}

#[derive(Clone)]
pub enum AtRestPolicy {
    Plaintext,
    ServerKey([u8; TRANSPORT_KEY_LEN]),
}

impl std::fmt::Debug for AtRestPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plaintext => f.write_str("Plaintext"),
            Self::ServerKey(_) => f.write_str("ServerKey([REDACTED])"),
        }
    }
}

impl AtRestPolicy {
    /// Build the policy from an optional 64 character hex key.
    pub fn from_hex_key(key: Option<&str>) -> Result<Self, CipherError> {
        let Some(key) = key else {
            return Ok(Self::Plaintext);
        };
        let bytes = hex::decode(key.trim()).map_err(|_| CipherError::InvalidKeyLength(0))?;
        let len = bytes.len();
        let key: [u8; TRANSPORT_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength(len))?;
        Ok(Self::ServerKey(key))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::ServerKey(_))
    }

    /// Prepare plaintext for storage.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedContent, CipherError> {
        match self {
            Self::Plaintext => Ok(SealedContent {
                bytes: plaintext.to_vec(),
                encrypted: false,
            }),
            Self::ServerKey(key) => {
                let iv = random_bytes::<IV_LEN>()?;
                let ciphertext = cipher::encrypt(plaintext, key, &iv)?;
                let mut bytes = Vec::with_capacity(IV_LEN + ciphertext.len());
                bytes.extend_from_slice(&iv);
                bytes.extend_from_slice(&ciphertext);
                Ok(SealedContent {
                    bytes,
                    encrypted: true,
                })
            }
        }
    }

    /// Recover plaintext from stored bytes.
    pub fn open(&self, stored: &[u8], encrypted: bool) -> Result<Vec<u8>, CipherError> {
        if !encrypted {
            return Ok(stored.to_vec());
        }
        let Self::ServerKey(key) = self else {
            return Err(CipherError::MissingAtRestKey);
        };
        if stored.len() < IV_LEN {
            return Err(CipherError::TruncatedContent);
        }
        let (iv, ciphertext) = stored.split_at(IV_LEN);
        cipher::decrypt(ciphertext, key, iv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_key() -> AtRestPolicy {
        AtRestPolicy::from_hex_key(Some(&"5a".repeat(32))).unwrap()
    }

    #[test]
    fn plaintext_policy_stores_bytes_unchanged() {
        let policy = AtRestPolicy::Plaintext;
        let sealed = policy.seal(b"hello").unwrap();
        assert!(!sealed.encrypted);
        assert_eq!(sealed.bytes, b"hello");
        assert_eq!(policy.open(&sealed.bytes, false).unwrap(), b"hello");
    }

    #[test]
    fn server_key_round_trip() {
        let policy = server_key();
        assert!(policy.is_enabled());

        let sealed = policy.seal(b"ledger export").unwrap();
        assert!(sealed.encrypted);
        assert_ne!(&sealed.bytes[IV_LEN..], b"ledger export");
        assert_eq!(policy.open(&sealed.bytes, true).unwrap(), b"ledger export");
    }

    #[test]
    fn legacy_plaintext_blobs_open_under_server_key() {
        assert_eq!(server_key().open(b"old blob", false).unwrap(), b"old blob");
    }

    #[test]
    fn encrypted_blob_without_key_fails() {
        let sealed = server_key().seal(b"data").unwrap();
        assert_eq!(
            AtRestPolicy::Plaintext.open(&sealed.bytes, true),
            Err(CipherError::MissingAtRestKey)
        );
    }

    #[test]
    fn truncated_blob_fails() {
        assert_eq!(
            server_key().open(&[0u8; 4], true),
            Err(CipherError::TruncatedContent)
        );
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(AtRestPolicy::from_hex_key(Some("abcd")).is_err());
        assert!(AtRestPolicy::from_hex_key(Some("not hex")).is_err());
        assert!(!AtRestPolicy::from_hex_key(None).unwrap().is_enabled());
    }

    #[test]
    fn debug_redacts_key() {
        assert_eq!(format!("{:?}", server_key()), "ServerKey([REDACTED])");
    }
}
