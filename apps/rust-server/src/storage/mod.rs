// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives under a single data directory:
//!
//! ```text
//! <DATA_DIR>/
//!   db/vaultshare.redb        # Ledger: files, grants, principals
//!   files/{storage_key}.bin   # File content (plaintext or at-rest sealed)
//!   keys/reference.key        # Reference tokenizer key (hex, mode 0600)
//!   audit/
//!     {date}/events.jsonl     # Daily audit logs
//! ```
//!
//! Content is written before the metadata row that refers to it, and
//! removed only after that row is gone.

pub mod audit;
pub mod database;
pub mod disk;
pub mod ownership;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use database::{DbError, DbResult, ShareDatabase};
pub use disk::{new_storage_key, DiskStorage, StorageError, StorageResult};
pub use ownership::OwnedResource;
pub use paths::StoragePaths;
pub use repository::{
    FileRepository, Grant, GrantRepository, GrantTtl, NewFile, NewGrant, PermissionKind,
    Principal, PrincipalProfile, PrincipalRepository, SharedFileEntry, StoredFile,
};
