// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Files are always identified
//! by their opaque reference, serialized as `encrypted_file_id`; internal
//! ids never appear here.
//!
//! ## Strict input parsing
//!
//! - [`StrictBool`] accepts `true`, `false`, `"true"`, `"false"`, `"True"`
//!   and `"False"`, nothing else.
//! - [`ExpirationHours`] accepts a positive whole number of hours, as a JSON
//!   number or a decimal string.

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::Role;
use crate::sharing::{
    FileContent, GranteeEntry, OwnedFile, ShareError, ShareInput, ShareOutcome, SharedWithMe,
    UploadInput, UploadedFile,
};
use crate::storage::{GrantTtl, PermissionKind, Principal};

// =============================================================================
// Strict scalar types
// =============================================================================

/// Boolean accepting a fixed set of literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrictBool(pub bool);

impl<'de> Deserialize<'de> for StrictBool {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl de::Visitor<'_> for Visitor {
            type Value = StrictBool;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("true, false, \"true\", \"false\", \"True\" or \"False\"")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<StrictBool, E> {
                Ok(StrictBool(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<StrictBool, E> {
                match v {
                    "true" | "True" => Ok(StrictBool(true)),
                    "false" | "False" => Ok(StrictBool(false)),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

/// Grant lifetime in whole hours, at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationHours(pub u64);

impl<'de> Deserialize<'de> for ExpirationHours {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl Visitor {
            fn positive<E: de::Error>(&self, hours: u64) -> Result<ExpirationHours, E> {
                if hours == 0 {
                    return Err(E::invalid_value(de::Unexpected::Unsigned(0), self));
                }
                Ok(ExpirationHours(hours))
            }
        }

        impl de::Visitor<'_> for Visitor {
            type Value = ExpirationHours;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a positive whole number of hours")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ExpirationHours, E> {
                self.positive(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ExpirationHours, E> {
                let hours =
                    u64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))?;
                self.positive(hours)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ExpirationHours, E> {
                let hours = v
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))?;
                self.positive(hours)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

// =============================================================================
// Upload
// =============================================================================

/// Client-encrypted file upload.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UploadRequest {
    pub file_name: Option<String>,
    /// Standard base64 AES-CBC ciphertext (PKCS#7 padded).
    pub encrypted_content: Option<String>,
    /// Hex AES key (16, 24 or 32 bytes).
    pub aes_key: Option<String>,
    /// Hex IV (16 bytes).
    pub aes_iv: Option<String>,
}

impl UploadRequest {
    /// Decode wire encodings. Any missing or undecodable field is a
    /// validation error; key and IV lengths are checked by the cipher.
    pub fn into_input(self) -> Result<UploadInput, ShareError> {
        let (Some(file_name), Some(content), Some(key), Some(iv)) =
            (self.file_name, self.encrypted_content, self.aes_key, self.aes_iv)
        else {
            return Err(ShareError::validation("Missing required fields."));
        };
        if [&file_name, &content, &key, &iv]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(ShareError::validation("Missing required fields."));
        }

        let ciphertext = Base64::decode_vec(content.trim())
            .map_err(|_| ShareError::validation("'encrypted_content' is not valid base64."))?;
        let key = hex::decode(key.trim())
            .map_err(|_| ShareError::validation("'aes_key' is not valid hex."))?;
        let iv = hex::decode(iv.trim())
            .map_err(|_| ShareError::validation("'aes_iv' is not valid hex."))?;

        Ok(UploadInput {
            file_name,
            ciphertext,
            key,
            iv,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub encrypted_file_id: String,
    pub file_name: String,
}

impl From<UploadedFile> for UploadResponse {
    fn from(uploaded: UploadedFile) -> Self {
        Self {
            message: "File uploaded successfully.".to_string(),
            encrypted_file_id: uploaded.reference,
            file_name: uploaded.file.display_name,
        }
    }
}

// =============================================================================
// Content access
// =============================================================================

/// Optional query parameters of the view and access endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContentQuery {
    /// Shortens the server's content timeout, in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// File content under a one-time AES-256-CBC key. All fields standard base64.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileContentResponse {
    pub encrypted_content: String,
    pub aes_key: String,
    pub aes_iv: String,
    pub file_name: String,
}

impl From<FileContent> for FileContentResponse {
    fn from(content: FileContent) -> Self {
        Self {
            encrypted_content: Base64::encode_string(&content.envelope.ciphertext),
            aes_key: Base64::encode_string(&content.envelope.key),
            aes_iv: Base64::encode_string(&content.envelope.iv),
            file_name: content.file_name,
        }
    }
}

// =============================================================================
// Sharing
// =============================================================================

/// Share a file with another user by username.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ShareRequest {
    /// Username of the recipient.
    pub user_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = bool)]
    pub view_permission: StrictBool,
    #[serde(default)]
    #[schema(value_type = bool)]
    pub download_permission: StrictBool,
    /// Hours until the grant expires. Defaults to 24.
    #[schema(value_type = Option<u64>)]
    pub expiration: Option<ExpirationHours>,
}

impl ShareRequest {
    pub fn into_input(self) -> Result<ShareInput, ShareError> {
        let username = self
            .user_id
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ShareError::validation("Missing 'user_id' in request data."))?;
        Ok(ShareInput {
            username,
            view_permission: self.view_permission.0,
            download_permission: self.download_permission.0,
            ttl: self
                .expiration
                .map_or_else(GrantTtl::default, |h| GrantTtl::Hours(h.0)),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SharedUserInfo {
    pub username: String,
    pub view_permission: bool,
    pub download_permission: bool,
    pub expiration: Option<DateTime<Utc>>,
    pub encrypted_file_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShareResponse {
    pub message: String,
    /// `false` when an existing share was overwritten.
    pub created: bool,
    pub shared_user: SharedUserInfo,
}

impl From<ShareOutcome> for ShareResponse {
    fn from(outcome: ShareOutcome) -> Self {
        let message = if outcome.created {
            "File shared successfully."
        } else {
            "File sharing updated successfully."
        };
        Self {
            message: message.to_string(),
            created: outcome.created,
            shared_user: SharedUserInfo {
                username: outcome.grantee.username,
                view_permission: outcome.grant.view_permission,
                download_permission: outcome.grant.download_permission,
                expiration: outcome.grant.expires_at,
                encrypted_file_id: outcome.reference,
            },
        }
    }
}

/// Set one permission flag of an existing share.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdatePermissionRequest {
    pub username: Option<String>,
    /// `view_permission` or `download_permission`.
    pub permission_type: Option<String>,
    #[schema(value_type = Option<bool>)]
    pub value: Option<StrictBool>,
}

impl UpdatePermissionRequest {
    pub fn into_parts(self) -> Result<(String, PermissionKind, bool), ShareError> {
        let username = self
            .username
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ShareError::validation("Missing 'username' in request data."))?;
        let kind = match self.permission_type.as_deref() {
            Some("view_permission") => PermissionKind::View,
            Some("download_permission") => PermissionKind::Download,
            Some(_) => return Err(ShareError::validation("Invalid permission type.")),
            None => return Err(ShareError::validation("Missing 'permission_type' in request data.")),
        };
        let value = self
            .value
            .ok_or_else(|| ShareError::validation("Missing 'value' in request data."))?;
        Ok((username, kind, value.0))
    }
}

/// Revoke a user's share.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RevokeRequest {
    pub username: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteFileResponse {
    pub message: String,
    pub grants_removed: usize,
}

// =============================================================================
// Listings
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct OwnedFileInfo {
    pub encrypted_file_id: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<OwnedFile> for OwnedFileInfo {
    fn from(owned: OwnedFile) -> Self {
        Self {
            encrypted_file_id: owned.reference,
            file_name: owned.file.display_name,
            uploaded_at: owned.file.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OwnedFilesResponse {
    pub files: Vec<OwnedFileInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SharedFileInfo {
    pub encrypted_file_id: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub view_permission: bool,
    pub download_permission: bool,
    pub expiration: Option<DateTime<Utc>>,
    /// Owner's username.
    pub shared_by: Option<String>,
}

impl From<SharedWithMe> for SharedFileInfo {
    fn from(shared: SharedWithMe) -> Self {
        let entry = shared.entry;
        Self {
            encrypted_file_id: shared.reference,
            file_name: entry.file.display_name,
            uploaded_at: entry.file.created_at,
            view_permission: entry.grant.view_permission,
            download_permission: entry.grant.download_permission,
            expiration: entry.grant.expires_at,
            shared_by: entry.owner_username,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SharedFilesResponse {
    pub files: Vec<SharedFileInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GranteeInfo {
    pub username: Option<String>,
    pub email: Option<String>,
    pub view_permission: bool,
    pub download_permission: bool,
    pub expiration: Option<DateTime<Utc>>,
}

impl From<GranteeEntry> for GranteeInfo {
    fn from(entry: GranteeEntry) -> Self {
        let (username, email) = match entry.principal {
            Some(p) => (Some(p.username), p.email),
            None => (None, None),
        };
        Self {
            username,
            email,
            view_permission: entry.grant.view_permission,
            download_permission: entry.grant.download_permission,
            expiration: entry.grant.expires_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SharedWithResponse {
    pub shared_users: Vec<GranteeInfo>,
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDetailsResponse {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
}

impl From<Principal> for UserDetailsResponse {
    fn from(principal: Principal) -> Self {
        Self {
            user_id: principal.user_id,
            username: principal.username,
            email: principal.email,
            role: principal.role,
        }
    }
}
