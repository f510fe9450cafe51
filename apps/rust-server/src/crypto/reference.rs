// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Opaque file references.
//!
//! Internal file ids are never handed to clients. A reference is one AES-256
//! block holding `id (u64 big-endian) || HMAC-SHA256(id)[..8]`, encoded as
//! unpadded base64url (22 characters). The transform is deterministic and
//! reversible; decoding fails closed on anything that does not decrypt to a
//! correctly tagged id in `1..=MAX_FILE_ID`.
//!
//! ## Key lifetime
//!
//! The tokenizer key must outlive every reference issued under it. It is
//! either supplied explicitly (`REFERENCE_KEY`) or persisted once in the
//! data directory and reloaded on every start. Rotating it invalidates all
//! outstanding references.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::random_bytes;

type HmacSha256 = Hmac<Sha256>;

/// Length of the tokenizer master key in bytes.
pub const REFERENCE_KEY_LEN: usize = 32;

/// Largest file id that can be referenced.
pub const MAX_FILE_ID: u64 = i64::MAX as u64;

const TAG_LEN: usize = 8;
const BLOCK_LEN: usize = 16;
const TOKEN_LEN: usize = 22;

const ENC_LABEL: &[u8] = b"vaultshare/reference/enc/v1";
const MAC_LABEL: &[u8] = b"vaultshare/reference/mac/v1";

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// Malformed, tampered, or foreign reference. Deliberately carries no detail.
    #[error("invalid or malformed file reference")]
    Invalid,

    #[error("file id {0} is outside the referenceable range")]
    OutOfRange(u64),

    #[error("reference key must be {REFERENCE_KEY_LEN} bytes encoded as hex")]
    InvalidKey,

    #[error("reference key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Master key for the reference tokenizer.
#[derive(Clone, PartialEq, Eq)]
pub struct ReferenceKey([u8; REFERENCE_KEY_LEN]);

impl std::fmt::Debug for ReferenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ReferenceKey([REDACTED])")
    }
}

impl ReferenceKey {
    pub fn from_bytes(bytes: [u8; REFERENCE_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64 character hex string.
    pub fn from_hex(encoded: &str) -> Result<Self, ReferenceError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| ReferenceError::InvalidKey)?;
        let bytes: [u8; REFERENCE_KEY_LEN] =
            bytes.try_into().map_err(|_| ReferenceError::InvalidKey)?;
        Ok(Self(bytes))
    }

    pub fn generate() -> Result<Self, ReferenceError> {
        random_bytes::<REFERENCE_KEY_LEN>()
            .map(Self)
            .map_err(|_| ReferenceError::InvalidKey)
    }

    /// Load the key persisted at `path`, creating it on first use.
    ///
    /// An existing file is never overwritten; a file with invalid contents is
    /// an error rather than a reason to mint a new key.
    pub fn load_or_create(path: &Path) -> Result<Self, ReferenceError> {
        let key_file_error = |source| ReferenceError::KeyFile {
            path: path.display().to_string(),
            source,
        };

        match fs::read_to_string(path) {
            Ok(contents) => return Self::from_hex(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(key_file_error(e)),
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(key_file_error)?;
        }

        let key = Self::generate()?;
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        match options.open(path) {
            Ok(mut file) => {
                file.write_all(hex::encode(key.0).as_bytes())
                    .and_then(|_| file.sync_all())
                    .map_err(key_file_error)?;
                tracing::info!(path = %path.display(), "Generated new file reference key");
                Ok(key)
            }
            // Another process won the race; use its key.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let contents = fs::read_to_string(path).map_err(key_file_error)?;
                Self::from_hex(&contents)
            }
            Err(e) => Err(key_file_error(e)),
        }
    }

    fn derive(&self, label: &[u8]) -> Result<[u8; 32], ReferenceError> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.0).map_err(|_| ReferenceError::InvalidKey)?;
        mac.update(label);
        Ok(mac.finalize().into_bytes().into())
    }
}

/// Keyed, reversible encoder between file ids and opaque references.
#[derive(Clone)]
pub struct ReferenceTokenizer {
    cipher: Aes256,
    mac: HmacSha256,
}

impl std::fmt::Debug for ReferenceTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceTokenizer").finish_non_exhaustive()
    }
}

impl ReferenceTokenizer {
    pub fn new(key: &ReferenceKey) -> Result<Self, ReferenceError> {
        let enc_key = key.derive(ENC_LABEL)?;
        let mac_key = key.derive(MAC_LABEL)?;
        Ok(Self {
            cipher: Aes256::new(GenericArray::from_slice(&enc_key)),
            mac: <HmacSha256 as Mac>::new_from_slice(&mac_key)
                .map_err(|_| ReferenceError::InvalidKey)?,
        })
    }

    /// Encode a file id as an opaque reference.
    pub fn tokenize(&self, file_id: u64) -> Result<String, ReferenceError> {
        if file_id == 0 || file_id > MAX_FILE_ID {
            return Err(ReferenceError::OutOfRange(file_id));
        }

        let id_bytes = file_id.to_be_bytes();
        let mut block = [0u8; BLOCK_LEN];
        block[..8].copy_from_slice(&id_bytes);
        block[8..].copy_from_slice(&self.tag(&id_bytes));

        let mut block = GenericArray::from(block);
        self.cipher.encrypt_block(&mut block);
        Ok(Base64UrlUnpadded::encode_string(&block))
    }

    /// Recover the file id from a reference. Every failure is `Invalid`.
    pub fn detokenize(&self, reference: &str) -> Result<u64, ReferenceError> {
        if reference.len() != TOKEN_LEN {
            return Err(ReferenceError::Invalid);
        }
        let decoded =
            Base64UrlUnpadded::decode_vec(reference).map_err(|_| ReferenceError::Invalid)?;
        let block: [u8; BLOCK_LEN] = decoded.try_into().map_err(|_| ReferenceError::Invalid)?;

        let mut block = GenericArray::from(block);
        self.cipher.decrypt_block(&mut block);

        let (id_bytes, tag) = block.split_at(8);
        let mut mac = self.mac.clone();
        mac.update(id_bytes);
        mac.verify_truncated_left(tag)
            .map_err(|_| ReferenceError::Invalid)?;

        let mut id = [0u8; 8];
        id.copy_from_slice(id_bytes);
        let file_id = u64::from_be_bytes(id);
        if file_id == 0 || file_id > MAX_FILE_ID {
            return Err(ReferenceError::Invalid);
        }
        Ok(file_id)
    }

    fn tag(&self, id_bytes: &[u8]) -> [u8; TAG_LEN] {
        let mut mac = self.mac.clone();
        mac.update(id_bytes);
        let digest = mac.finalize().into_bytes();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&digest[..TAG_LEN]);
        tag
    }
}
