// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the sharing ledger.
//!
//! Each repository provides operations for a specific entity type, using
//! `ShareDatabase` transactions for every read and write.

pub mod files;
pub mod grants;
pub mod principals;

pub use files::{DeletedFile, FileRepository, NewFile, StoredFile};
pub use grants::{
    Grant, GrantRepository, GrantTtl, NewGrant, PermissionKind, SharedFileEntry, UpsertedGrant,
    DEFAULT_GRANT_TTL_HOURS,
};
pub use principals::{normalize_username, Principal, PrincipalProfile, PrincipalRepository};
