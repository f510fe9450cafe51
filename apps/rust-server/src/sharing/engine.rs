// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access decision engine.
//!
//! Every request is decided from scratch; nothing is cached between calls.
//!
//! 1. The opaque reference is decoded (fails closed with `InvalidReference`).
//! 2. The owner of the file is allowed every operation, regardless of grants.
//! 3. Otherwise view and download need an active grant carrying that
//!    permission. Management operations are never allowed to non-owners.
//! 4. Anything else is `PermissionDenied`.
//!
//! Expired grants are treated exactly like absent ones.

use chrono::{DateTime, Utc};

use crate::crypto::ReferenceTokenizer;
use crate::storage::{
    FileRepository, Grant, GrantRepository, OwnedResource, PermissionKind, ShareDatabase,
    StoredFile,
};

use super::ShareError;

/// Operation a principal wants to perform on a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    View,
    Download,
    /// Share, list grantees, update permission, revoke.
    ManageGrants,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::View => "view",
            Operation::Download => "download",
            Operation::ManageGrants => "manage sharing of",
            Operation::Delete => "delete",
        }
    }

    /// Permission a grant must carry for a non-owner, if any can suffice.
    fn required_permission(&self) -> Option<PermissionKind> {
        match self {
            Operation::View => Some(PermissionKind::View),
            Operation::Download => Some(PermissionKind::Download),
            Operation::ManageGrants | Operation::Delete => None,
        }
    }
}

/// Why access was allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessBasis {
    Owner,
    Grant(Grant),
}

/// An allowed request: the resolved file and the basis for allowing it.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub file: StoredFile,
    pub basis: AccessBasis,
}

/// Decide a request given the file and the requester's grant, if any.
pub fn evaluate(
    file: &StoredFile,
    principal_id: &str,
    operation: Operation,
    grant: Option<&Grant>,
    now: DateTime<Utc>,
) -> Result<AccessBasis, ShareError> {
    if file.is_owned_by(principal_id) {
        return Ok(AccessBasis::Owner);
    }

    let denied = ShareError::PermissionDenied {
        operation: operation.as_str(),
    };
    let Some(required) = operation.required_permission() else {
        return Err(denied);
    };

    match grant {
        Some(grant)
            if grant.file_id == file.id
                && grant.grantee_id == principal_id
                && grant.is_active(now)
                && grant.allows(required) =>
        {
            Ok(AccessBasis::Grant(grant.clone()))
        }
        _ => Err(denied),
    }
}

/// Resolves references and authorizes operations against the ledger.
pub struct AccessEngine<'a> {
    db: &'a ShareDatabase,
    tokenizer: &'a ReferenceTokenizer,
}

impl<'a> AccessEngine<'a> {
    pub fn new(db: &'a ShareDatabase, tokenizer: &'a ReferenceTokenizer) -> Self {
        Self { db, tokenizer }
    }

    /// Decode a reference into an internal file id.
    pub fn resolve(&self, reference: &str) -> Result<u64, ShareError> {
        Ok(self.tokenizer.detokenize(reference)?)
    }

    /// Decide whether `principal_id` may perform `operation` on `reference`.
    ///
    /// Costs at most one file lookup and one grant lookup, both by key.
    pub fn authorize(
        &self,
        principal_id: &str,
        reference: &str,
        operation: Operation,
        now: DateTime<Utc>,
    ) -> Result<AccessDecision, ShareError> {
        let file_id = self.resolve(reference)?;
        let file = FileRepository::new(self.db)
            .get(file_id)
            .map_err(ShareError::from)
            .map_err(|e| match e {
                ShareError::NotFound(_) => ShareError::not_found("File not found."),
                other => other,
            })?;

        let grant = if file.is_owned_by(principal_id) || operation.required_permission().is_none()
        {
            None
        } else {
            GrantRepository::new(self.db).find_active(file_id, principal_id, now)?
        };

        let basis = evaluate(&file, principal_id, operation, grant.as_ref(), now)?;
        Ok(AccessDecision { file, basis })
    }
}
