// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem operations for file content and audit logs.
//!
//! Content is written durably (temp file, fsync, rename, directory fsync)
//! before any metadata row refers to it, so a crash or cancelled upload can
//! leave at worst an orphaned blob, never a row pointing at missing bytes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use super::StoragePaths;

/// Error type for disk storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage not initialized")]
    NotInitialized,

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Plain filesystem storage rooted at the data directory.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    paths: StoragePaths,
    initialized: bool,
}

impl DiskStorage {
    /// Create a new DiskStorage instance.
    ///
    /// Does NOT initialize the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create all required directories. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        let dirs = [
            self.paths.blobs_dir(),
            self.paths.database_dir(),
            self.paths.keys_dir(),
            self.paths.audit_dir(),
        ];

        for dir in dirs {
            fs::create_dir_all(&dir)?;
        }

        self.initialized = true;
        Ok(())
    }

    /// Write-read-delete probe of the data directory.
    pub fn health_check(&self) -> StorageResult<()> {
        self.ensure_initialized()?;

        let test_file = self.paths.root().join(".health_check");
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }

        Ok(())
    }

    // ========== File Content ==========

    /// Durably persist the content of a stored file.
    pub fn write_blob(&self, storage_key: &str, data: &[u8]) -> StorageResult<()> {
        check_storage_key(storage_key)?;
        self.write_durable(self.paths.blob(storage_key), data)
    }

    pub fn read_blob(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        check_storage_key(storage_key)?;
        let path = self.paths.blob(storage_key);
        self.read_raw(&path).map_err(|e| match e {
            StorageError::Io(io) if io.kind() == io::ErrorKind::NotFound => {
                StorageError::NotFound(format!("blob {storage_key}"))
            }
            other => other,
        })
    }

    /// Remove the content of a stored file. Removing a missing blob succeeds.
    pub fn delete_blob(&self, storage_key: &str) -> StorageResult<()> {
        check_storage_key(storage_key)?;
        match self.delete(self.paths.blob(storage_key)) {
            Err(StorageError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    pub fn blob_exists(&self, storage_key: &str) -> bool {
        check_storage_key(storage_key).is_ok() && self.exists(self.paths.blob(storage_key))
    }

    // ========== Raw File Operations ==========

    /// Write bytes via temp file + fsync + rename, then fsync the directory.
    pub fn write_durable(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        self.ensure_initialized()?;

        let path = path.as_ref();
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
        fs::create_dir_all(parent)?;

        let temp_path = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        let result = (|| -> io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&temp_path, path)?;
            File::open(parent)?.sync_all()
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Read raw bytes from a file.
    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        self.ensure_initialized()?;

        let mut file = File::open(path.as_ref())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Append one line to a file, creating it (and its parent) if needed.
    pub fn append_line(&self, path: impl AsRef<Path>, line: &str) -> StorageResult<()> {
        self.ensure_initialized()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    /// Check if a file exists.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        File::open(path.as_ref()).is_ok()
    }

    /// Delete a file.
    pub fn delete(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        self.ensure_initialized()?;
        fs::remove_file(path.as_ref())?;
        Ok(())
    }

    fn ensure_initialized(&self) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }
        Ok(())
    }
}

/// Storage keys are server-generated; anything else is refused so a key can
/// never escape the blob directory.
fn check_storage_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key.len() <= 64
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Generate a fresh storage key for a new blob.
pub fn new_storage_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage() -> (TempDir, DiskStorage) {
        let dir = TempDir::new().unwrap();
        let mut storage = DiskStorage::new(StoragePaths::new(dir.path()));
        storage
            .initialize()
            .expect("Failed to initialize test storage");
        (dir, storage)
    }

    #[test]
    fn initialize_creates_directories() {
        let (_dir, storage) = test_storage();

        assert!(storage.paths().blobs_dir().exists());
        assert!(storage.paths().database_dir().exists());
        assert!(storage.paths().keys_dir().exists());
        assert!(storage.paths().audit_dir().exists());
    }

    #[test]
    fn blob_round_trip() {
        let (_dir, storage) = test_storage();
        let key = new_storage_key();
        let data = b"raw bytes: \x00\x01\x02\nand more";

        storage.write_blob(&key, data).unwrap();
        assert!(storage.blob_exists(&key));
        assert_eq!(storage.read_blob(&key).unwrap(), data);
    }

    #[test]
    fn durable_write_leaves_no_temp_files() {
        let (_dir, storage) = test_storage();
        let key = new_storage_key();
        storage.write_blob(&key, b"first").unwrap();
        storage.write_blob(&key, b"second").unwrap();

        let entries: Vec<_> = fs::read_dir(storage.paths().blobs_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(storage.read_blob(&key).unwrap(), b"second");
    }

    #[test]
    fn missing_blob_is_not_found() {
        let (_dir, storage) = test_storage();
        assert!(matches!(
            storage.read_blob("does-not-exist"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn delete_blob_is_idempotent() {
        let (_dir, storage) = test_storage();
        let key = new_storage_key();
        storage.write_blob(&key, b"bye").unwrap();

        storage.delete_blob(&key).unwrap();
        assert!(!storage.blob_exists(&key));
        storage.delete_blob(&key).unwrap();
    }

    #[test]
    fn storage_keys_cannot_escape_blob_dir() {
        let (_dir, storage) = test_storage();
        for key in ["", "../keys/reference", "a/b", "with space"] {
            assert!(matches!(
                storage.write_blob(key, b"x"),
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn append_line_accumulates() {
        let (_dir, storage) = test_storage();
        let path = storage.paths().audit_events_file("2026-01-01");
        storage.append_line(&path, "{\"a\":1}").unwrap();
        storage.append_line(&path, "{\"a\":2}").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn health_check_works() {
        let (_dir, storage) = test_storage();
        storage.health_check().expect("Health check should pass");
    }

    #[test]
    fn uninitialized_storage_returns_error() {
        let storage = DiskStorage::new(StoragePaths::new("/tmp/never-init"));
        assert!(matches!(
            storage.read_raw("/tmp/any.bin"),
            Err(StorageError::NotInitialized)
        ));
    }
}
