// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Grant store: the authorization ledger.
//!
//! One row per (file, grantee). Re-sharing overwrites the existing row in a
//! single write transaction, so concurrent re-shares converge on the last
//! writer instead of duplicating. A grant is active while its expiration is
//! absent or in the future; expired grants are ignored by reads but never
//! deleted here.

use chrono::{DateTime, Duration, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};

use crate::storage::database::{
    check_principal_id, file_grant_bounds, grant_key, scope_bounds, scoped_key, DbError, DbResult,
    ShareDatabase, FILES, GRANTEE_GRANTS, GRANTS, PRINCIPALS, USERNAMES,
};

use super::files::{file_not_found, StoredFile};
use super::principals::{normalize_username, Principal};

/// Lifetime of a grant when the sharer does not specify one.
pub const DEFAULT_GRANT_TTL_HOURS: u64 = 24;

/// Capability a grant can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionKind {
    #[serde(rename = "view_permission")]
    View,
    #[serde(rename = "download_permission")]
    Download,
}

/// A sharing relationship between a file and one grantee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Grant {
    pub file_id: u64,
    pub grantee_id: String,
    /// Owner at the time of the most recent share.
    pub granted_by: String,
    pub view_permission: bool,
    pub download_permission: bool,
    /// `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Grant {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }

    pub fn allows(&self, kind: PermissionKind) -> bool {
        match kind {
            PermissionKind::View => self.view_permission,
            PermissionKind::Download => self.download_permission,
        }
    }
}

/// Grant lifetime requested by a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantTtl {
    Hours(u64),
    Never,
}

impl Default for GrantTtl {
    fn default() -> Self {
        GrantTtl::Hours(DEFAULT_GRANT_TTL_HOURS)
    }
}

impl GrantTtl {
    /// Absolute expiration relative to `now`.
    pub fn expires_at(self, now: DateTime<Utc>) -> DbResult<Option<DateTime<Utc>>> {
        match self {
            GrantTtl::Never => Ok(None),
            GrantTtl::Hours(hours) => i64::try_from(hours)
                .ok()
                .and_then(Duration::try_hours)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .map(Some)
                .ok_or_else(|| DbError::InvalidInput(format!("expiration of {hours} hours"))),
        }
    }
}

/// Parameters of a share operation.
#[derive(Debug, Clone)]
pub struct NewGrant {
    pub file_id: u64,
    pub granter_id: String,
    pub grantee_id: String,
    pub view_permission: bool,
    pub download_permission: bool,
    pub ttl: GrantTtl,
}

/// Outcome of an upsert.
#[derive(Debug, Clone)]
pub struct UpsertedGrant {
    pub grant: Grant,
    /// `false` when an existing grant was overwritten.
    pub created: bool,
}

/// A file shared with the caller, joined with its metadata and owner.
#[derive(Debug, Clone)]
pub struct SharedFileEntry {
    pub file: StoredFile,
    pub grant: Grant,
    pub owner_username: Option<String>,
}

/// Repository for grant records.
pub struct GrantRepository<'a> {
    db: &'a ShareDatabase,
}

impl<'a> GrantRepository<'a> {
    pub fn new(db: &'a ShareDatabase) -> Self {
        Self { db }
    }

    /// Create or overwrite the grant for `(file_id, grantee_id)`.
    ///
    /// Ownership of the file by the granter is the caller's responsibility.
    pub fn upsert(&self, new: NewGrant, now: DateTime<Utc>) -> DbResult<UpsertedGrant> {
        check_principal_id(&new.grantee_id)?;
        let expires_at = new.ttl.expires_at(now)?;
        let key = grant_key(new.file_id, &new.grantee_id);

        let write_txn = self.db.begin_write()?;
        let upserted = {
            {
                let files = write_txn.open_table(FILES)?;
                if files.get(new.file_id)?.is_none() {
                    return Err(file_not_found());
                }
            }

            let mut grants = write_txn.open_table(GRANTS)?;
            let existing = read_grant(&grants, &key)?;
            let created = existing.is_none();
            let grant = Grant {
                file_id: new.file_id,
                grantee_id: new.grantee_id,
                granted_by: new.granter_id,
                view_permission: new.view_permission,
                download_permission: new.download_permission,
                expires_at,
                created_at: existing.map_or(now, |g| g.created_at),
                updated_at: now,
            };

            let json = serde_json::to_vec(&grant)?;
            grants.insert(key.as_slice(), json.as_slice())?;

            let mut grantee_index = write_txn.open_table(GRANTEE_GRANTS)?;
            let index_key = scoped_key(&grant.grantee_id, grant.file_id);
            grantee_index.insert(index_key.as_slice(), grant.file_id)?;

            UpsertedGrant { grant, created }
        };
        write_txn.commit()?;

        Ok(upserted)
    }

    /// Point lookup of the grant for `(file_id, grantee_id)` if it is active.
    pub fn find_active(
        &self,
        file_id: u64,
        grantee_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Grant>> {
        let read_txn = self.db.begin_read()?;
        let grants = read_txn.open_table(GRANTS)?;
        let grant = read_grant(&grants, &grant_key(file_id, grantee_id))?;
        Ok(grant.filter(|g| g.is_active(now)))
    }

    /// Set one permission flag on the grant held by `grantee_username`.
    ///
    /// Returns the number of grants updated; `NotFound` if there is none.
    pub fn update_permission(
        &self,
        file_id: u64,
        grantee_username: &str,
        kind: PermissionKind,
        value: bool,
        now: DateTime<Utc>,
    ) -> DbResult<usize> {
        let write_txn = self.db.begin_write()?;
        {
            let key = resolve_grant_key(&write_txn, file_id, grantee_username)?;
            let mut grants = write_txn.open_table(GRANTS)?;
            let mut grant = read_grant(&grants, &key)?.ok_or_else(|| no_grant(grantee_username))?;

            match kind {
                PermissionKind::View => grant.view_permission = value,
                PermissionKind::Download => grant.download_permission = value,
            }
            grant.updated_at = now;

            let json = serde_json::to_vec(&grant)?;
            grants.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(1)
    }

    /// Remove the grant held by `grantee_username`.
    ///
    /// Returns the number of grants removed; `NotFound` if there is none.
    pub fn revoke(&self, file_id: u64, grantee_username: &str) -> DbResult<usize> {
        let write_txn = self.db.begin_write()?;
        {
            let key = resolve_grant_key(&write_txn, file_id, grantee_username)?;
            let mut grants = write_txn.open_table(GRANTS)?;
            let grant = {
                let removed = grants
                    .remove(key.as_slice())?
                    .ok_or_else(|| no_grant(grantee_username))?;
                serde_json::from_slice::<Grant>(removed.value())?
            };

            let mut grantee_index = write_txn.open_table(GRANTEE_GRANTS)?;
            grantee_index.remove(scoped_key(&grant.grantee_id, file_id).as_slice())?;
        }
        write_txn.commit()?;
        Ok(1)
    }

    /// All grants of a file, active or not, oldest first.
    pub fn list_for_file(&self, file_id: u64) -> DbResult<Vec<Grant>> {
        let read_txn = self.db.begin_read()?;
        let grants = read_txn.open_table(GRANTS)?;
        let (start, end) = file_grant_bounds(file_id);

        let mut result: Vec<Grant> = Vec::new();
        for entry in grants.range(start.as_slice()..end.as_slice())? {
            let (_, value) = entry?;
            result.push(serde_json::from_slice(value.value())?);
        }
        result.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.grantee_id.cmp(&b.grantee_id))
        });
        Ok(result)
    }

    /// Active grants held by a principal, joined with file and owner, by file id.
    pub fn list_active_for_grantee(
        &self,
        grantee_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<SharedFileEntry>> {
        check_principal_id(grantee_id)?;
        let read_txn = self.db.begin_read()?;
        let grantee_index = read_txn.open_table(GRANTEE_GRANTS)?;
        let grants = read_txn.open_table(GRANTS)?;
        let files = read_txn.open_table(FILES)?;
        let principals = read_txn.open_table(PRINCIPALS)?;

        let (start, end) = scope_bounds(grantee_id);
        let mut result = Vec::new();
        for entry in grantee_index.range(start.as_slice()..=end.as_slice())? {
            let (_, file_id) = entry?;
            let file_id = file_id.value();

            let Some(grant) = read_grant(&grants, &grant_key(file_id, grantee_id))? else {
                continue;
            };
            if !grant.is_active(now) {
                continue;
            }
            let file: StoredFile = match files.get(file_id)? {
                Some(v) => serde_json::from_slice(v.value())?,
                None => continue,
            };
            let owner_username = match principals.get(file.owner_id.as_str())? {
                Some(v) => Some(serde_json::from_slice::<Principal>(v.value())?.username),
                None => None,
            };

            result.push(SharedFileEntry {
                file,
                grant,
                owner_username,
            });
        }
        Ok(result)
    }
}

fn read_grant(
    grants: &impl ReadableTable<&'static [u8], &'static [u8]>,
    key: &[u8],
) -> DbResult<Option<Grant>> {
    match grants.get(key)? {
        Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
        None => Ok(None),
    }
}

/// Grant key for the principal currently holding `username`.
fn resolve_grant_key(txn: &WriteTransaction, file_id: u64, username: &str) -> DbResult<Vec<u8>> {
    let username = normalize_username(username);
    let usernames = txn.open_table(USERNAMES)?;
    let grantee_id = usernames
        .get(username.as_str())?
        .map(|v| v.value().to_string())
        .ok_or_else(|| no_grant(&username))?;
    Ok(grant_key(file_id, &grantee_id))
}

fn no_grant(username: &str) -> DbError {
    DbError::NotFound(format!("No shared record for user {username}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_db;
    use crate::storage::repository::files::{tests::new_file, FileRepository};
    use crate::storage::repository::principals::{tests::profile, PrincipalRepository};

    struct Fixture {
        db: ShareDatabase,
        _dir: tempfile::TempDir,
        file_id: u64,
    }

    fn fixture() -> Fixture {
        let (db, dir) = temp_db();
        let principals = PrincipalRepository::new(&db);
        principals.sync(&profile("alice_id", "alice"), Utc::now()).unwrap();
        principals.sync(&profile("bob_id", "bob"), Utc::now()).unwrap();
        principals.sync(&profile("carol_id", "carol"), Utc::now()).unwrap();
        let file = FileRepository::new(&db)
            .create(new_file("alice_id", "report.pdf"), Utc::now())
            .unwrap();
        Fixture {
            db,
            _dir: dir,
            file_id: file.id,
        }
    }

    fn share(file_id: u64, grantee: &str, view: bool, download: bool, ttl: GrantTtl) -> NewGrant {
        NewGrant {
            file_id,
            granter_id: "alice_id".to_string(),
            grantee_id: grantee.to_string(),
            view_permission: view,
            download_permission: download,
            ttl,
        }
    }

    #[test]
    fn default_ttl_is_24_hours() {
        let now = Utc::now();
        let expires = GrantTtl::default().expires_at(now).unwrap().unwrap();
        assert_eq!(expires - now, Duration::hours(24));
        assert_eq!(GrantTtl::Never.expires_at(now).unwrap(), None);
    }

    #[test]
    fn huge_ttl_is_rejected() {
        assert!(matches!(
            GrantTtl::Hours(u64::MAX).expires_at(Utc::now()),
            Err(DbError::InvalidInput(_))
        ));
        assert!(matches!(
            GrantTtl::Hours(i64::MAX as u64 / 3600).expires_at(Utc::now()),
            Err(DbError::InvalidInput(_))
        ));
    }

    #[test]
    fn upsert_is_idempotent_per_pair() {
        let f = fixture();
        let repo = GrantRepository::new(&f.db);
        let now = Utc::now();

        let first = repo
            .upsert(share(f.file_id, "bob_id", true, false, GrantTtl::default()), now)
            .unwrap();
        assert!(first.created);

        let later = now + Duration::seconds(5);
        let second = repo
            .upsert(share(f.file_id, "bob_id", true, true, GrantTtl::Hours(2)), later)
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.grant.created_at, first.grant.created_at);

        let grants = repo.list_for_file(f.file_id).unwrap();
        assert_eq!(grants.len(), 1);
        assert!(grants[0].download_permission);
        assert_eq!(grants[0].expires_at, Some(later + Duration::hours(2)));
    }

    #[test]
    fn upsert_for_missing_file_fails() {
        let f = fixture();
        let result = GrantRepository::new(&f.db).upsert(
            share(f.file_id + 100, "bob_id", true, true, GrantTtl::default()),
            Utc::now(),
        );
        match result {
            Err(DbError::NotFound(message)) => {
                assert_eq!(message, "File not found.");
                assert!(!message.contains(&(f.file_id + 100).to_string()));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn expiry_boundary() {
        let f = fixture();
        let repo = GrantRepository::new(&f.db);
        let granted_at = Utc::now();
        repo.upsert(share(f.file_id, "bob_id", true, true, GrantTtl::Hours(1)), granted_at)
            .unwrap();
        let expires = granted_at + Duration::hours(1);

        assert!(repo
            .find_active(f.file_id, "bob_id", expires - Duration::seconds(1))
            .unwrap()
            .is_some());
        assert!(repo.find_active(f.file_id, "bob_id", expires).unwrap().is_none());
        assert!(repo
            .find_active(f.file_id, "bob_id", expires + Duration::seconds(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn never_expiring_grant_stays_active() {
        let f = fixture();
        let repo = GrantRepository::new(&f.db);
        repo.upsert(share(f.file_id, "bob_id", true, false, GrantTtl::Never), Utc::now())
            .unwrap();
        let far_future = Utc::now() + Duration::days(365 * 50);
        assert!(repo.find_active(f.file_id, "bob_id", far_future).unwrap().is_some());
    }

    #[test]
    fn update_permission_by_username() {
        let f = fixture();
        let repo = GrantRepository::new(&f.db);
        repo.upsert(share(f.file_id, "bob_id", true, false, GrantTtl::default()), Utc::now())
            .unwrap();

        let updated = repo
            .update_permission(f.file_id, "bob", PermissionKind::Download, true, Utc::now())
            .unwrap();
        assert_eq!(updated, 1);

        let grant = repo.find_active(f.file_id, "bob_id", Utc::now()).unwrap().unwrap();
        assert!(grant.view_permission);
        assert!(grant.download_permission);
    }

    #[test]
    fn update_permission_without_grant_is_not_found() {
        let f = fixture();
        let repo = GrantRepository::new(&f.db);
        for username in ["carol", "nobody"] {
            assert!(matches!(
                repo.update_permission(f.file_id, username, PermissionKind::View, true, Utc::now()),
                Err(DbError::NotFound(_))
            ));
        }
    }

    #[test]
    fn revoke_removes_grant_and_index() {
        let f = fixture();
        let repo = GrantRepository::new(&f.db);
        repo.upsert(share(f.file_id, "bob_id", true, true, GrantTtl::default()), Utc::now())
            .unwrap();

        assert_eq!(repo.revoke(f.file_id, "bob").unwrap(), 1);
        assert!(repo.find_active(f.file_id, "bob_id", Utc::now()).unwrap().is_none());
        assert!(repo.list_active_for_grantee("bob_id", Utc::now()).unwrap().is_empty());
        assert!(matches!(
            repo.revoke(f.file_id, "bob"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn list_for_file_is_ordered_by_creation() {
        let f = fixture();
        let repo = GrantRepository::new(&f.db);
        let now = Utc::now();
        repo.upsert(share(f.file_id, "carol_id", true, false, GrantTtl::default()), now)
            .unwrap();
        repo.upsert(
            share(f.file_id, "bob_id", true, false, GrantTtl::default()),
            now + Duration::seconds(1),
        )
        .unwrap();

        let grantees: Vec<_> = repo
            .list_for_file(f.file_id)
            .unwrap()
            .into_iter()
            .map(|g| g.grantee_id)
            .collect();
        assert_eq!(grantees, vec!["carol_id", "bob_id"]);
    }

    #[test]
    fn list_active_for_grantee_joins_and_filters_expired() {
        let f = fixture();
        let files = FileRepository::new(&f.db);
        let second = files
            .create(new_file("alice_id", "old.txt"), Utc::now())
            .unwrap();

        let repo = GrantRepository::new(&f.db);
        let now = Utc::now();
        repo.upsert(share(f.file_id, "bob_id", true, false, GrantTtl::default()), now)
            .unwrap();
        repo.upsert(
            share(second.id, "bob_id", true, false, GrantTtl::Hours(1)),
            now - Duration::hours(2),
        )
        .unwrap();

        let entries = repo.list_active_for_grantee("bob_id", now).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file.display_name, "report.pdf");
        assert_eq!(entries[0].owner_username.as_deref(), Some("alice"));
        assert!(repo.list_active_for_grantee("carol_id", now).unwrap().is_empty());
    }

    #[test]
    fn deleting_file_cascades_grants() {
        let f = fixture();
        let repo = GrantRepository::new(&f.db);
        repo.upsert(share(f.file_id, "bob_id", true, true, GrantTtl::default()), Utc::now())
            .unwrap();
        repo.upsert(share(f.file_id, "carol_id", true, true, GrantTtl::default()), Utc::now())
            .unwrap();

        let deleted = FileRepository::new(&f.db)
            .delete_with_grants(f.file_id)
            .unwrap();
        assert_eq!(deleted.grants_removed, 2);
        assert!(repo.list_for_file(f.file_id).unwrap().is_empty());
        assert!(repo.list_active_for_grantee("bob_id", Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn permission_kind_wire_names() {
        let kind: PermissionKind = serde_json::from_str("\"download_permission\"").unwrap();
        assert_eq!(kind, PermissionKind::Download);
        assert!(serde_json::from_str::<PermissionKind>("\"edit_permission\"").is_err());
    }
}
