// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sharing operations.
//!
//! Each operation is an independent unit of work: resolve the reference,
//! authorize through the access engine, then touch content and the ledger.
//! Content operations run on the blocking pool under a time bound. An upload
//! writes its blob durably before the metadata row; if it is cancelled or
//! fails in between, the orphaned blob is removed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::audit_log;
use crate::crypto::{cipher, AtRestPolicy, ReferenceTokenizer, TransportEnvelope};
use crate::storage::{
    new_storage_key, AuditEvent, AuditEventType, AuditRepository, DbError, DiskStorage,
    FileRepository, Grant, GrantRepository, GrantTtl, NewFile, NewGrant, PermissionKind,
    Principal, PrincipalProfile, PrincipalRepository, ShareDatabase, SharedFileEntry,
    StoredFile,
};
use crate::storage::repository::DeletedFile;

use super::engine::{AccessBasis, AccessDecision, AccessEngine, Operation};
use super::ShareError;

/// Client-encrypted upload, already decoded from its wire encoding.
pub struct UploadInput {
    pub file_name: String,
    pub ciphertext: Vec<u8>,
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

#[derive(Debug)]
pub struct UploadedFile {
    pub reference: String,
    pub file: StoredFile,
}

/// File content re-encrypted for one recipient.
#[derive(Debug)]
pub struct FileContent {
    pub file_name: String,
    pub envelope: TransportEnvelope,
}

#[derive(Debug, Clone)]
pub struct ShareInput {
    pub username: String,
    pub view_permission: bool,
    pub download_permission: bool,
    pub ttl: GrantTtl,
}

#[derive(Debug)]
pub struct ShareOutcome {
    pub reference: String,
    pub grantee: Principal,
    pub grant: Grant,
    pub created: bool,
}

#[derive(Debug)]
pub struct OwnedFile {
    pub reference: String,
    pub file: StoredFile,
}

#[derive(Debug)]
pub struct SharedWithMe {
    pub reference: String,
    pub entry: SharedFileEntry,
}

#[derive(Debug)]
pub struct GranteeEntry {
    pub grant: Grant,
    /// `None` if the grantee record has disappeared from the directory.
    pub principal: Option<Principal>,
}

/// Orchestrates the sharing core over the ledger, blob storage and ciphers.
#[derive(Clone)]
pub struct SharingService {
    db: Arc<ShareDatabase>,
    disk: Arc<DiskStorage>,
    tokenizer: Arc<ReferenceTokenizer>,
    at_rest: Arc<AtRestPolicy>,
    content_timeout: Duration,
}

impl std::fmt::Debug for SharingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharingService")
            .field("at_rest_encryption", &self.at_rest.is_enabled())
            .field("content_timeout", &self.content_timeout)
            .finish_non_exhaustive()
    }
}

impl SharingService {
    pub fn new(
        db: ShareDatabase,
        disk: DiskStorage,
        tokenizer: ReferenceTokenizer,
        at_rest: AtRestPolicy,
        content_timeout: Duration,
    ) -> Self {
        Self {
            db: Arc::new(db),
            disk: Arc::new(disk),
            tokenizer: Arc::new(tokenizer),
            at_rest: Arc::new(at_rest),
            content_timeout,
        }
    }

    pub fn content_timeout(&self) -> Duration {
        self.content_timeout
    }

    /// Configured bound, shortened (never lengthened) by the caller.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested.map_or(self.content_timeout, |r| r.min(self.content_timeout))
    }

    pub fn ledger_health(&self) -> Result<(), String> {
        self.db.health_check().map_err(|e| e.to_string())
    }

    pub fn storage_health(&self) -> Result<(), String> {
        self.disk.health_check().map_err(|e| e.to_string())
    }

    // =========================================================================
    // Principals
    // =========================================================================

    /// Provision or refresh the principal behind a verified token.
    pub fn sync_principal(&self, profile: &PrincipalProfile) -> Result<Principal, DbError> {
        PrincipalRepository::new(&self.db).sync(profile, Utc::now())
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Decrypt a client upload, persist it and record its metadata.
    pub async fn upload(
        &self,
        owner: &Principal,
        input: UploadInput,
        timeout: Option<Duration>,
    ) -> Result<UploadedFile, ShareError> {
        let limit = self.effective_timeout(timeout);
        let cancel = CancellationToken::new();

        let task = {
            let this = self.clone();
            let owner_id = owner.user_id.clone();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || this.store_upload(&owner_id, input, &cancel))
        };

        let result = match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined.map_err(ShareError::from).and_then(|r| r),
            Err(_) => {
                cancel.cancel();
                Err(ShareError::Timeout)
            }
        };

        let result = self.observe("upload", &owner.user_id, None, result);
        if let Ok(uploaded) = &result {
            tracing::info!(
                file_id = uploaded.file.id,
                owner = %owner.user_id,
                size_bytes = uploaded.file.size_bytes,
                encrypted_at_rest = uploaded.file.encrypted,
                "File uploaded"
            );
            audit_log!(
                &self.disk,
                AuditEventType::FileUploaded,
                owner.user_id.as_str(),
                uploaded.file.id
            );
        }
        result
    }

    fn store_upload(
        &self,
        owner_id: &str,
        input: UploadInput,
        cancel: &CancellationToken,
    ) -> Result<UploadedFile, ShareError> {
        let file_name = input.file_name.trim();
        if file_name.is_empty() {
            return Err(ShareError::validation("Missing 'file_name'."));
        }

        let plaintext = cipher::decrypt_from_transport(&input.ciphertext, &input.key, &input.iv)?;
        let sealed = self.at_rest.seal(&plaintext)?;
        let storage_key = new_storage_key();
        self.disk.write_blob(&storage_key, &sealed.bytes)?;

        let recorded = if cancel.is_cancelled() {
            Err(ShareError::Timeout)
        } else {
            FileRepository::new(&self.db)
                .create(
                    NewFile {
                        owner_id: owner_id.to_string(),
                        display_name: file_name.to_string(),
                        storage_key: storage_key.clone(),
                        encrypted: sealed.encrypted,
                        size_bytes: plaintext.len() as u64,
                    },
                    Utc::now(),
                )
                .map_err(ShareError::from)
        };

        let file = match recorded {
            Ok(file) => file,
            Err(e) => {
                if let Err(cleanup) = self.disk.delete_blob(&storage_key) {
                    tracing::warn!(
                        storage_key = %storage_key,
                        error = %cleanup,
                        "Failed to remove orphaned blob"
                    );
                }
                return Err(e);
            }
        };

        let reference = self.tokenizer.tokenize(file.id)?;
        Ok(UploadedFile { reference, file })
    }

    /// Return a file's content encrypted under a fresh one-time key.
    ///
    /// `operation` must be `View` or `Download`.
    pub async fn access_content(
        &self,
        principal_id: &str,
        reference: &str,
        operation: Operation,
        timeout: Option<Duration>,
    ) -> Result<FileContent, ShareError> {
        let op_name = match operation {
            Operation::View => "view",
            Operation::Download => "download",
            Operation::ManageGrants | Operation::Delete => {
                return Err(ShareError::internal("content access requires view or download"));
            }
        };

        let decision = self.authorize(principal_id, reference, operation, op_name)?;
        let file_id = decision.file.id;
        let limit = self.effective_timeout(timeout);

        let task = {
            let this = self.clone();
            let file = decision.file.clone();
            tokio::task::spawn_blocking(move || this.load_for_transport(&file))
        };
        let result = match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined.map_err(ShareError::from).and_then(|r| r),
            Err(_) => Err(ShareError::Timeout),
        };
        let result = self.observe(op_name, principal_id, Some(file_id), result);

        if result.is_ok() {
            let via_grant = matches!(decision.basis, AccessBasis::Grant(_));
            AuditRepository::new(&self.disk).record(
                AuditEvent::new(AuditEventType::FileAccessed)
                    .with_user(principal_id)
                    .with_file(file_id)
                    .with_details(serde_json::json!({
                        "operation": op_name,
                        "via_grant": via_grant,
                    })),
            );
        }

        result.map(|envelope| FileContent {
            file_name: decision.file.display_name,
            envelope,
        })
    }

    fn load_for_transport(&self, file: &StoredFile) -> Result<TransportEnvelope, ShareError> {
        let stored = self.disk.read_blob(&file.storage_key)?;
        let plaintext = self
            .at_rest
            .open(&stored, file.encrypted)
            .map_err(|e| ShareError::internal(format!("stored content unreadable: {e}")))?;
        Ok(cipher::encrypt_for_transport(&plaintext)?)
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Files uploaded by the caller, in upload order.
    pub fn list_owned(&self, principal_id: &str) -> Result<Vec<OwnedFile>, ShareError> {
        let result = (|| {
            FileRepository::new(&self.db)
                .list_by_owner(principal_id)?
                .into_iter()
                .map(|file| {
                    Ok(OwnedFile {
                        reference: self.tokenizer.tokenize(file.id)?,
                        file,
                    })
                })
                .collect()
        })();
        self.observe("list_owned", principal_id, None, result)
    }

    /// Files currently shared with the caller through an active grant.
    pub fn list_shared_with_me(&self, principal_id: &str) -> Result<Vec<SharedWithMe>, ShareError> {
        let result = (|| {
            GrantRepository::new(&self.db)
                .list_active_for_grantee(principal_id, Utc::now())?
                .into_iter()
                .map(|entry| {
                    Ok(SharedWithMe {
                        reference: self.tokenizer.tokenize(entry.file.id)?,
                        entry,
                    })
                })
                .collect()
        })();
        self.observe("list_shared_with_me", principal_id, None, result)
    }

    /// Everyone a file is shared with. Owner only.
    pub fn grantees(
        &self,
        principal_id: &str,
        reference: &str,
    ) -> Result<Vec<GranteeEntry>, ShareError> {
        let decision = self.authorize(principal_id, reference, Operation::ManageGrants, "shared_with")?;
        let file_id = decision.file.id;

        let result = (|| {
            let principals = PrincipalRepository::new(&self.db);
            GrantRepository::new(&self.db)
                .list_for_file(file_id)?
                .into_iter()
                .map(|grant| {
                    let principal = match principals.get(&grant.grantee_id) {
                        Ok(p) => Some(p),
                        Err(DbError::NotFound(_)) => None,
                        Err(e) => return Err(e.into()),
                    };
                    Ok(GranteeEntry { grant, principal })
                })
                .collect()
        })();
        self.observe("shared_with", principal_id, Some(file_id), result)
    }

    // =========================================================================
    // Grant management
    // =========================================================================

    /// Share a file with another user, or overwrite an existing share.
    pub fn share(
        &self,
        owner: &Principal,
        reference: &str,
        input: ShareInput,
    ) -> Result<ShareOutcome, ShareError> {
        let decision = self.authorize(&owner.user_id, reference, Operation::ManageGrants, "share")?;
        let file_id = decision.file.id;

        let result = (|| {
            let username = input.username.trim();
            if username.is_empty() {
                return Err(ShareError::validation("Missing 'user_id' in request data."));
            }
            let grantee = match PrincipalRepository::new(&self.db).find_by_username(username) {
                Ok(p) => p,
                Err(DbError::NotFound(_)) => {
                    return Err(ShareError::not_found(format!("User '{username}' not found.")));
                }
                Err(e) => return Err(e.into()),
            };
            if grantee.user_id == owner.user_id {
                return Err(ShareError::validation("You cannot share a file with yourself."));
            }

            let upserted = GrantRepository::new(&self.db).upsert(
                NewGrant {
                    file_id,
                    granter_id: owner.user_id.clone(),
                    grantee_id: grantee.user_id.clone(),
                    view_permission: input.view_permission,
                    download_permission: input.download_permission,
                    ttl: input.ttl,
                },
                Utc::now(),
            )?;

            Ok(ShareOutcome {
                reference: reference.to_string(),
                grantee,
                grant: upserted.grant,
                created: upserted.created,
            })
        })();
        let result = self.observe("share", &owner.user_id, Some(file_id), result);

        if let Ok(outcome) = &result {
            tracing::info!(
                file_id,
                owner = %owner.user_id,
                grantee = %outcome.grantee.user_id,
                created = outcome.created,
                "File shared"
            );
            AuditRepository::new(&self.disk).record(
                AuditEvent::new(AuditEventType::FileShared)
                    .with_user(owner.user_id.as_str())
                    .with_file(file_id)
                    .with_target(outcome.grantee.user_id.as_str())
                    .with_details(serde_json::json!({
                        "view_permission": outcome.grant.view_permission,
                        "download_permission": outcome.grant.download_permission,
                        "expires_at": outcome.grant.expires_at,
                        "created": outcome.created,
                    })),
            );
        }
        result
    }

    /// Set a single permission flag on an existing grant. Owner only.
    pub fn update_permission(
        &self,
        principal_id: &str,
        reference: &str,
        username: &str,
        kind: PermissionKind,
        value: bool,
    ) -> Result<usize, ShareError> {
        let decision =
            self.authorize(principal_id, reference, Operation::ManageGrants, "update_permission")?;
        let file_id = decision.file.id;

        let result = (|| {
            let username = required_username(username)?;
            Ok(GrantRepository::new(&self.db).update_permission(
                file_id,
                username,
                kind,
                value,
                Utc::now(),
            )?)
        })();
        let result = self.observe("update_permission", principal_id, Some(file_id), result);

        if result.is_ok() {
            AuditRepository::new(&self.disk).record(
                AuditEvent::new(AuditEventType::PermissionUpdated)
                    .with_user(principal_id)
                    .with_file(file_id)
                    .with_target(username.trim())
                    .with_details(serde_json::json!({ "permission": kind, "value": value })),
            );
        }
        result
    }

    /// Remove a user's grant. Owner only.
    pub fn revoke(
        &self,
        principal_id: &str,
        reference: &str,
        username: &str,
    ) -> Result<usize, ShareError> {
        let decision = self.authorize(principal_id, reference, Operation::ManageGrants, "revoke")?;
        let file_id = decision.file.id;

        let result = (|| {
            let username = required_username(username)?;
            Ok(GrantRepository::new(&self.db).revoke(file_id, username)?)
        })();
        let result = self.observe("revoke", principal_id, Some(file_id), result);

        if result.is_ok() {
            AuditRepository::new(&self.disk).record(
                AuditEvent::new(AuditEventType::AccessRevoked)
                    .with_user(principal_id)
                    .with_file(file_id)
                    .with_target(username.trim()),
            );
        }
        result
    }

    /// Delete a file, all of its grants, then its content. Owner only.
    pub fn delete_file(
        &self,
        principal_id: &str,
        reference: &str,
    ) -> Result<DeletedFile, ShareError> {
        let decision = self.authorize(principal_id, reference, Operation::Delete, "delete")?;
        let file_id = decision.file.id;

        let result = FileRepository::new(&self.db)
            .delete_with_grants(file_id)
            .map_err(ShareError::from);
        let result = self.observe("delete", principal_id, Some(file_id), result);

        if let Ok(deleted) = &result {
            if let Err(e) = self.disk.delete_blob(&deleted.file.storage_key) {
                tracing::warn!(file_id, error = %e, "Failed to remove content of deleted file");
            }
            tracing::info!(
                file_id,
                grants_removed = deleted.grants_removed,
                "File deleted"
            );
            audit_log!(&self.disk, AuditEventType::FileDeleted, principal_id, file_id);
        }
        result
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn authorize(
        &self,
        principal_id: &str,
        reference: &str,
        operation: Operation,
        op_name: &'static str,
    ) -> Result<AccessDecision, ShareError> {
        let result = AccessEngine::new(&self.db, &self.tokenizer).authorize(
            principal_id,
            reference,
            operation,
            Utc::now(),
        );

        if let Err(e @ ShareError::PermissionDenied { .. }) = &result {
            let file_id = self.tokenizer.detokenize(reference).ok();
            tracing::warn!(
                operation = op_name,
                principal = %principal_id,
                file_id,
                "Permission denied"
            );
            let mut event = AuditEvent::new(AuditEventType::PermissionDenied)
                .with_user(principal_id)
                .with_details(serde_json::json!({ "operation": op_name }))
                .failed(e.to_string());
            if let Some(file_id) = file_id {
                event = event.with_file(file_id);
            }
            AuditRepository::new(&self.disk).record(event);
            return result;
        }
        self.observe(op_name, principal_id, None, result)
    }

    /// Log a failed operation with its context. Internal detail stays here.
    fn observe<T>(
        &self,
        operation: &'static str,
        principal_id: &str,
        file_id: Option<u64>,
        result: Result<T, ShareError>,
    ) -> Result<T, ShareError> {
        if let Err(e) = &result {
            match e {
                ShareError::Internal(detail) => tracing::error!(
                    operation,
                    principal = %principal_id,
                    file_id,
                    error = %detail,
                    "Sharing operation failed"
                ),
                ShareError::Timeout => tracing::warn!(
                    operation,
                    principal = %principal_id,
                    file_id,
                    "Sharing operation timed out"
                ),
                other => tracing::debug!(
                    operation,
                    principal = %principal_id,
                    file_id,
                    kind = other.kind(),
                    "Sharing operation rejected"
                ),
            }
        }
        result
    }
}

fn required_username(username: &str) -> Result<&str, ShareError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ShareError::validation("Missing 'username' in request data."));
    }
    Ok(username)
}
