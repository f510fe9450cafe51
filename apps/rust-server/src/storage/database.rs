// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded sharing ledger backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `files`: file_id → serialized StoredFile
//! - `owner_files`: scoped key (owner|file_id) → file_id
//! - `grants`: grant key (file_id|grantee) → serialized Grant
//! - `grantee_grants`: scoped key (grantee|file_id) → file_id
//! - `principals`: user_id → serialized Principal
//! - `usernames`: username → user_id
//! - `sequences`: name → last issued id
//!
//! redb allows a single write transaction at a time, so every mutation
//! (including grant upserts for the same file and grantee) is serialized and
//! all-or-nothing.

use std::path::Path;

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: file_id → serialized StoredFile (JSON bytes).
pub(crate) const FILES: TableDefinition<u64, &[u8]> = TableDefinition::new("files");

/// Index: `scoped_key(owner_id, file_id)` → file_id.
pub(crate) const OWNER_FILES: TableDefinition<&[u8], u64> = TableDefinition::new("owner_files");

/// Primary table: `grant_key(file_id, grantee_id)` → serialized Grant.
pub(crate) const GRANTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("grants");

/// Index: `scoped_key(grantee_id, file_id)` → file_id.
pub(crate) const GRANTEE_GRANTS: TableDefinition<&[u8], u64> =
    TableDefinition::new("grantee_grants");

/// Primary table: user_id → serialized Principal.
pub(crate) const PRINCIPALS: TableDefinition<&str, &[u8]> = TableDefinition::new("principals");

/// Unique index: username → user_id.
pub(crate) const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

/// Monotonic id sequences. Ids are never reused, even after deletion.
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Sequence backing StoredFile ids.
pub(crate) const FILE_ID_SEQUENCE: &str = "file_id";

/// Longest principal id accepted as an index scope.
pub const MAX_PRINCIPAL_ID_LEN: usize = 255;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("id sequence exhausted: {0}")]
    SequenceExhausted(&'static str),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Key for a per-principal index entry.
///
/// Format: `len(scope) as u16 BE | scope | file_id BE`. The length prefix
/// keeps one principal's range from overlapping another whose id shares a
/// prefix.
pub(crate) fn scoped_key(scope: &str, file_id: u64) -> Vec<u8> {
    let mut key = scope_prefix(scope);
    key.extend_from_slice(&file_id.to_be_bytes());
    key
}

/// Inclusive bounds covering every `scoped_key(scope, _)`.
pub(crate) fn scope_bounds(scope: &str) -> (Vec<u8>, Vec<u8>) {
    (scoped_key(scope, 0), scoped_key(scope, u64::MAX))
}

fn scope_prefix(scope: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + scope.len() + 8);
    key.extend_from_slice(&(scope.len() as u16).to_be_bytes());
    key.extend_from_slice(scope.as_bytes());
    key
}

/// Key for the grants table: `file_id BE | grantee_id`.
pub(crate) fn grant_key(file_id: u64, grantee_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + grantee_id.len());
    key.extend_from_slice(&file_id.to_be_bytes());
    key.extend_from_slice(grantee_id.as_bytes());
    key
}

/// Half-open bounds covering every grant of one file.
pub(crate) fn file_grant_bounds(file_id: u64) -> (Vec<u8>, Vec<u8>) {
    (
        file_id.to_be_bytes().to_vec(),
        file_id.saturating_add(1).to_be_bytes().to_vec(),
    )
}

/// Reject principal ids that cannot be used as an index scope.
pub(crate) fn check_principal_id(principal_id: &str) -> DbResult<()> {
    if principal_id.is_empty() || principal_id.len() > MAX_PRINCIPAL_ID_LEN {
        return Err(DbError::InvalidInput(format!(
            "principal id must be 1..={MAX_PRINCIPAL_ID_LEN} bytes"
        )));
    }
    Ok(())
}

/// Issue the next id from a sequence inside an open write transaction.
pub(crate) fn next_id(txn: &WriteTransaction, sequence: &'static str) -> DbResult<u64> {
    let mut table = txn.open_table(SEQUENCES)?;
    let current = table.get(sequence)?.map(|v| v.value()).unwrap_or(0);
    let next = current
        .checked_add(1)
        .filter(|id| *id <= i64::MAX as u64)
        .ok_or(DbError::SequenceExhausted(sequence))?;
    table.insert(sequence, next)?;
    Ok(next)
}

// =============================================================================
// ShareDatabase
// =============================================================================

/// Embedded ACID ledger for files, grants and principals.
pub struct ShareDatabase {
    db: Database,
}

impl std::fmt::Debug for ShareDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareDatabase").finish_non_exhaustive()
    }
}

impl ShareDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(FILES)?;
            let _ = write_txn.open_table(OWNER_FILES)?;
            let _ = write_txn.open_table(GRANTS)?;
            let _ = write_txn.open_table(GRANTEE_GRANTS)?;
            let _ = write_txn.open_table(PRINCIPALS)?;
            let _ = write_txn.open_table(USERNAMES)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(crate) fn begin_read(&self) -> DbResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    pub(crate) fn begin_write(&self) -> DbResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Verify the ledger answers a read transaction.
    pub fn health_check(&self) -> DbResult<()> {
        let read_txn = self.begin_read()?;
        let _ = read_txn.open_table(FILES)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
