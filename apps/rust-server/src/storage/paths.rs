// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the data directory layout.

use std::path::{Path, PathBuf};

/// Default base directory for all persistent state.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities for the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persistent data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== File Content ==========

    /// Directory holding uploaded file content.
    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    /// Path to the content of one stored file.
    pub fn blob(&self, storage_key: &str) -> PathBuf {
        self.blobs_dir().join(format!("{storage_key}.bin"))
    }

    // ========== Ledger and Keys ==========

    /// Directory holding the redb ledger.
    pub fn database_dir(&self) -> PathBuf {
        self.root.join("db")
    }

    /// Path to the redb ledger file.
    pub fn database(&self) -> PathBuf {
        self.database_dir().join("vaultshare.redb")
    }

    /// Directory for persisted key material.
    pub fn keys_dir(&self) -> PathBuf {
        self.root.join("keys")
    }

    /// Path to the persisted reference tokenizer key.
    pub fn reference_key(&self) -> PathBuf {
        self.keys_dir().join("reference.key")
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
    }

    #[test]
    fn blob_paths_are_correct() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.blobs_dir(), PathBuf::from("/tmp/test-data/files"));
        assert_eq!(
            paths.blob("3f2a"),
            PathBuf::from("/tmp/test-data/files/3f2a.bin")
        );
    }

    #[test]
    fn ledger_and_key_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.database(), PathBuf::from("/data/db/vaultshare.redb"));
        assert_eq!(
            paths.reference_key(),
            PathBuf::from("/data/keys/reference.key")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-01-28"),
            PathBuf::from("/data/audit/2026-01-28/events.jsonl")
        );
    }
}
