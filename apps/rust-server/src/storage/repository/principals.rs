// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal directory.
//!
//! Principals are provisioned from verified bearer tokens on every
//! authenticated request. Usernames are unique and NFKC-normalized so that
//! visually identical names cannot belong to two principals. Principals are
//! never deleted here.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::auth::Role;
use crate::storage::database::{
    check_principal_id, DbError, DbResult, ShareDatabase, PRINCIPALS, USERNAMES,
};

/// Longest accepted username, in characters.
pub const MAX_USERNAME_CHARS: usize = 150;

/// A user known to the sharing ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    /// Stable identifier issued by the identity provider (`sub`).
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    /// Inactive principals (unverified email) are refused by the API.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity attributes asserted by a verified token.
#[derive(Debug, Clone)]
pub struct PrincipalProfile {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub active: bool,
}

/// Canonical form of a username for storage and lookup.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().nfkc().collect()
}

/// Repository for principal records.
pub struct PrincipalRepository<'a> {
    db: &'a ShareDatabase,
}

impl<'a> PrincipalRepository<'a> {
    pub fn new(db: &'a ShareDatabase) -> Self {
        Self { db }
    }

    /// Create or refresh a principal from token claims.
    ///
    /// Fails with `Conflict` if the username already belongs to another
    /// principal.
    pub fn sync(&self, profile: &PrincipalProfile, now: DateTime<Utc>) -> DbResult<Principal> {
        check_principal_id(&profile.user_id)?;
        let username = normalize_username(&profile.username);
        if username.is_empty() || username.chars().count() > MAX_USERNAME_CHARS {
            return Err(DbError::InvalidInput(format!(
                "username must be 1..={MAX_USERNAME_CHARS} characters"
            )));
        }

        let write_txn = self.db.begin_write()?;
        let principal = {
            let mut principals = write_txn.open_table(PRINCIPALS)?;
            let mut usernames = write_txn.open_table(USERNAMES)?;

            let holder = usernames.get(username.as_str())?.map(|v| v.value().to_string());
            if let Some(holder) = holder {
                if holder != profile.user_id {
                    return Err(DbError::Conflict(format!("username {username} is taken")));
                }
            }

            let existing: Option<Principal> = {
                let found = principals.get(profile.user_id.as_str())?;
                match found {
                    Some(v) => Some(serde_json::from_slice(v.value())?),
                    None => None,
                }
            };

            let principal = match existing {
                Some(existing) => {
                    if existing.username != username {
                        usernames.remove(existing.username.as_str())?;
                    }
                    let unchanged = existing.username == username
                        && existing.email == profile.email
                        && existing.role == profile.role
                        && existing.active == profile.active;
                    if unchanged {
                        return Ok(existing);
                    }
                    Principal {
                        username,
                        email: profile.email.clone(),
                        role: profile.role,
                        active: profile.active,
                        updated_at: now,
                        ..existing
                    }
                }
                None => Principal {
                    user_id: profile.user_id.clone(),
                    username,
                    email: profile.email.clone(),
                    role: profile.role,
                    active: profile.active,
                    created_at: now,
                    updated_at: now,
                },
            };

            let json = serde_json::to_vec(&principal)?;
            principals.insert(principal.user_id.as_str(), json.as_slice())?;
            usernames.insert(principal.username.as_str(), principal.user_id.as_str())?;
            principal
        };
        write_txn.commit()?;

        tracing::debug!(user_id = %principal.user_id, "Principal synchronized");
        Ok(principal)
    }

    /// Get a principal by id.
    pub fn get(&self, user_id: &str) -> DbResult<Principal> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINCIPALS)?;
        match table.get(user_id)? {
            Some(v) => Ok(serde_json::from_slice(v.value())?),
            None => Err(DbError::NotFound(format!("Principal {user_id}"))),
        }
    }

    /// Resolve a username (normalized before lookup) to its principal.
    pub fn find_by_username(&self, username: &str) -> DbResult<Principal> {
        let username = normalize_username(username);
        let read_txn = self.db.begin_read()?;
        let usernames = read_txn.open_table(USERNAMES)?;
        let user_id = usernames
            .get(username.as_str())?
            .map(|v| v.value().to_string())
            .ok_or_else(|| DbError::NotFound(format!("User {username}")))?;

        let principals = read_txn.open_table(PRINCIPALS)?;
        match principals.get(user_id.as_str())? {
            Some(v) => Ok(serde_json::from_slice(v.value())?),
            None => Err(DbError::NotFound(format!("Principal {user_id}"))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::database::tests::temp_db;

    pub(crate) fn profile(user_id: &str, username: &str) -> PrincipalProfile {
        PrincipalProfile {
            user_id: user_id.to_string(),
            username: username.to_string(),
            email: Some(format!("{username}@example.com")),
            role: Role::User,
            active: true,
        }
    }

    #[test]
    fn sync_creates_and_reads_back() {
        let (db, _dir) = temp_db();
        let repo = PrincipalRepository::new(&db);

        let created = repo.sync(&profile("user_1", "alice"), Utc::now()).unwrap();
        assert_eq!(created.username, "alice");
        assert!(created.active);

        assert_eq!(repo.get("user_1").unwrap(), created);
        assert_eq!(repo.find_by_username("alice").unwrap(), created);
    }

    #[test]
    fn sync_refreshes_and_keeps_created_at() {
        let (db, _dir) = temp_db();
        let repo = PrincipalRepository::new(&db);
        let first = repo.sync(&profile("user_1", "alice"), Utc::now()).unwrap();

        let mut changed = profile("user_1", "alice2");
        changed.role = Role::Admin;
        let later = first.created_at + chrono::Duration::minutes(5);
        let second = repo.sync(&changed, later).unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.updated_at, later);
        assert_eq!(second.role, Role::Admin);
        assert!(matches!(
            repo.find_by_username("alice"),
            Err(DbError::NotFound(_))
        ));
        assert_eq!(repo.find_by_username("alice2").unwrap().user_id, "user_1");
    }

    #[test]
    fn username_is_unique() {
        let (db, _dir) = temp_db();
        let repo = PrincipalRepository::new(&db);
        repo.sync(&profile("user_1", "alice"), Utc::now()).unwrap();

        let result = repo.sync(&profile("user_2", "alice"), Utc::now());
        assert!(matches!(result, Err(DbError::Conflict(_))));
    }

    #[test]
    fn usernames_are_nfkc_normalized() {
        let (db, _dir) = temp_db();
        let repo = PrincipalRepository::new(&db);
        // Fullwidth letters normalize to ASCII.
        repo.sync(&profile("user_1", "ｂｏｂ"), Utc::now()).unwrap();

        assert_eq!(repo.find_by_username("bob").unwrap().user_id, "user_1");
        assert!(matches!(
            repo.sync(&profile("user_2", "bob"), Utc::now()),
            Err(DbError::Conflict(_))
        ));
    }

    #[test]
    fn rejects_invalid_identity() {
        let (db, _dir) = temp_db();
        let repo = PrincipalRepository::new(&db);
        assert!(matches!(
            repo.sync(&profile("", "alice"), Utc::now()),
            Err(DbError::InvalidInput(_))
        ));
        assert!(matches!(
            repo.sync(&profile("user_1", "   "), Utc::now()),
            Err(DbError::InvalidInput(_))
        ));
    }

    #[test]
    fn unknown_principal_is_not_found() {
        let (db, _dir) = temp_db();
        let repo = PrincipalRepository::new(&db);
        assert!(matches!(repo.get("ghost"), Err(DbError::NotFound(_))));
        assert!(matches!(
            repo.find_by_username("ghost"),
            Err(DbError::NotFound(_))
        ));
    }
}
