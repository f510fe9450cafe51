// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Uploads, sharing changes, content access, deletions and denied requests
//! are appended to a daily JSONL file under `audit/`. Audit failures never
//! fail the request that triggered them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{DiskStorage, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    FileUploaded,
    FileShared,
    FileAccessed,
    PermissionUpdated,
    AccessRevoked,
    FileDeleted,
    PermissionDenied,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Principal that triggered the event.
    pub user_id: Option<String>,
    /// Internal file id. Never exposed through the API.
    pub file_id: Option<u64>,
    /// Grantee affected by a sharing change.
    pub target_user: Option<String>,
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            file_id: None,
            target_user: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_file(mut self, file_id: u64) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn with_target(mut self, target_user: impl Into<String>) -> Self {
        self.target_user = Some(target_user.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    storage: &'a DiskStorage,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a DiskStorage) -> Self {
        Self { storage }
    }

    /// Append an event to the daily log.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);
        let line = serde_json::to_string(event).map_err(|e| {
            StorageError::IntegrityViolation(format!("Failed to serialize audit event: {e}"))
        })?;
        self.storage.append_line(&path, &line)
    }

    /// Append an event, logging instead of propagating any failure.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::warn!(
                error = %e,
                event_type = ?event.event_type,
                "Failed to write audit event"
            );
        }
    }

    /// Read audit events for a specific date.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = self.storage.read_raw(&path)?;
        let content = String::from_utf8(content).map_err(|e| {
            StorageError::IntegrityViolation(format!("Invalid UTF-8 in audit log: {e}"))
        })?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    StorageError::IntegrityViolation(format!("Corrupt audit event: {e}"))
                })
            })
            .collect()
    }

    /// Read events for an inclusive date range. Days without a log are skipped.
    pub fn read_events_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let parse = |date: &str| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| StorageError::IntegrityViolation(format!("Invalid date {date}: {e}")))
        };
        let mut current = parse(start_date)?;
        let end = parse(end_date)?;

        let mut all_events = Vec::new();
        while current <= end {
            let date = current.format("%Y-%m-%d").to_string();
            match self.read_events(&date) {
                Ok(events) => all_events.extend(events),
                Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            current = current
                .succ_opt()
                .ok_or_else(|| StorageError::IntegrityViolation("Date overflow".to_string()))?;
        }

        Ok(all_events)
    }
}

/// Record an audit event without failing the caller.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event_type:expr, $user:expr) => {{
        $crate::storage::AuditRepository::new($storage)
            .record($crate::storage::AuditEvent::new($event_type).with_user($user));
    }};
    ($storage:expr, $event_type:expr, $user:expr, $file_id:expr) => {{
        $crate::storage::AuditRepository::new($storage).record(
            $crate::storage::AuditEvent::new($event_type)
                .with_user($user)
                .with_file($file_id),
        );
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DiskStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = DiskStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::FileShared)
            .with_user("alice")
            .with_file(7)
            .with_target("bob");

        assert_eq!(event.event_type, AuditEventType::FileShared);
        assert_eq!(event.user_id.as_deref(), Some("alice"));
        assert_eq!(event.file_id, Some(7));
        assert_eq!(event.target_user.as_deref(), Some("bob"));
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::PermissionDenied)
            .with_user("mallory")
            .failed("not the owner");

        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("not the owner"));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);

        repo.log(&AuditEvent::new(AuditEventType::FileUploaded).with_user("alice"))
            .unwrap();
        repo.log(&AuditEvent::new(AuditEventType::FileAccessed).with_user("bob"))
            .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = repo.read_events(&today).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::FileUploaded);
        assert_eq!(events[1].event_type, AuditEventType::FileAccessed);
    }

    #[test]
    fn macro_records_with_file() {
        let (_temp, storage) = setup();
        crate::audit_log!(&storage, AuditEventType::FileDeleted, "alice", 42);

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = AuditRepository::new(&storage).read_events(&today).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].file_id, Some(42));
    }

    #[test]
    fn range_skips_missing_days() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);
        repo.log(&AuditEvent::new(AuditEventType::AccessRevoked))
            .unwrap();

        let today = Utc::now().date_naive();
        let start = (today - chrono::Duration::days(3)).format("%Y-%m-%d").to_string();
        let end = today.format("%Y-%m-%d").to_string();
        let events = repo.read_events_range(&start, &end).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn record_swallows_failures() {
        let storage = DiskStorage::new(StoragePaths::new("/tmp/never-init"));
        AuditRepository::new(&storage).record(AuditEvent::new(AuditEventType::FileUploaded));
    }
}
