// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File metadata store.
//!
//! Pure persistence: maps an internal file id to its owner, blob storage key
//! and display name. Authorization lives in `sharing::engine`.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};

use crate::storage::database::{
    check_principal_id, file_grant_bounds, next_id, scope_bounds, scoped_key, DbError, DbResult,
    ShareDatabase, FILES, FILE_ID_SEQUENCE, GRANTEE_GRANTS, GRANTS, OWNER_FILES,
};
use crate::storage::OwnedResource;

use super::grants::Grant;

/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 255;

/// Metadata of one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    /// Internal id. Stable, never reused, never exposed verbatim.
    pub id: u64,
    pub owner_id: String,
    /// Opaque handle of the blob holding the content.
    pub storage_key: String,
    pub display_name: String,
    /// Whether the blob is encrypted under the server at-rest key.
    pub encrypted: bool,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl OwnedResource for StoredFile {
    fn owner_user_id(&self) -> &str {
        &self.owner_id
    }
}

/// Attributes of a file about to be recorded.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub owner_id: String,
    pub display_name: String,
    pub storage_key: String,
    pub encrypted: bool,
    pub size_bytes: u64,
}

/// Result of deleting a file and its dependent grants.
#[derive(Debug)]
pub struct DeletedFile {
    pub file: StoredFile,
    pub grants_removed: usize,
}

/// Repository for file metadata.
pub struct FileRepository<'a> {
    db: &'a ShareDatabase,
}

impl<'a> FileRepository<'a> {
    pub fn new(db: &'a ShareDatabase) -> Self {
        Self { db }
    }

    /// Record a new file. The blob must already be durably written.
    pub fn create(&self, new: NewFile, now: DateTime<Utc>) -> DbResult<StoredFile> {
        check_principal_id(&new.owner_id)?;
        let display_name = new.display_name.trim();
        if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_CHARS {
            return Err(DbError::InvalidInput(format!(
                "file name must be 1..={MAX_DISPLAY_NAME_CHARS} characters"
            )));
        }

        let write_txn = self.db.begin_write()?;
        let file = {
            let id = next_id(&write_txn, FILE_ID_SEQUENCE)?;
            let file = StoredFile {
                id,
                owner_id: new.owner_id,
                storage_key: new.storage_key,
                display_name: display_name.to_string(),
                encrypted: new.encrypted,
                size_bytes: new.size_bytes,
                created_at: now,
            };

            let json = serde_json::to_vec(&file)?;
            let mut files = write_txn.open_table(FILES)?;
            files.insert(id, json.as_slice())?;

            let mut owner_index = write_txn.open_table(OWNER_FILES)?;
            let key = scoped_key(&file.owner_id, id);
            owner_index.insert(key.as_slice(), id)?;
            file
        };
        write_txn.commit()?;

        Ok(file)
    }

    /// Get a file by internal id.
    pub fn get(&self, file_id: u64) -> DbResult<StoredFile> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILES)?;
        match table.get(file_id)? {
            Some(v) => Ok(serde_json::from_slice(v.value())?),
            None => Err(file_not_found()),
        }
    }

    /// List an owner's files in upload order.
    pub fn list_by_owner(&self, owner_id: &str) -> DbResult<Vec<StoredFile>> {
        check_principal_id(owner_id)?;
        let read_txn = self.db.begin_read()?;
        let owner_index = read_txn.open_table(OWNER_FILES)?;
        let files = read_txn.open_table(FILES)?;

        let (start, end) = scope_bounds(owner_id);
        let mut result = Vec::new();
        for entry in owner_index.range(start.as_slice()..=end.as_slice())? {
            let (_, file_id) = entry?;
            match files.get(file_id.value())? {
                Some(v) => result.push(serde_json::from_slice(v.value())?),
                None => tracing::warn!(
                    file_id = file_id.value(),
                    "Owner index points at missing file"
                ),
            }
        }
        Ok(result)
    }

    /// Delete a file's metadata together with every grant on it, atomically.
    ///
    /// The blob is left for the caller to remove after commit.
    pub fn delete_with_grants(&self, file_id: u64) -> DbResult<DeletedFile> {
        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut files = write_txn.open_table(FILES)?;
            let file: StoredFile = {
                let found = files
                    .remove(file_id)?
                    .ok_or_else(file_not_found)?;
                serde_json::from_slice(found.value())?
            };

            let mut owner_index = write_txn.open_table(OWNER_FILES)?;
            owner_index.remove(scoped_key(&file.owner_id, file_id).as_slice())?;

            let mut grants = write_txn.open_table(GRANTS)?;
            let mut grantee_index = write_txn.open_table(GRANTEE_GRANTS)?;
            let (start, end) = file_grant_bounds(file_id);
            let mut removed: Vec<(Vec<u8>, Grant)> = Vec::new();
            for entry in grants.range(start.as_slice()..end.as_slice())? {
                let (key, value) = entry?;
                removed.push((key.value().to_vec(), serde_json::from_slice(value.value())?));
            }
            for (key, grant) in &removed {
                grants.remove(key.as_slice())?;
                grantee_index.remove(scoped_key(&grant.grantee_id, file_id).as_slice())?;
            }

            DeletedFile {
                file,
                grants_removed: removed.len(),
            }
        };
        write_txn.commit()?;

        Ok(deleted)
    }
}

/// Missing-file error. Carries no id, since the message can reach clients.
pub(crate) fn file_not_found() -> DbError {
    DbError::NotFound("File not found.".to_string())
}
