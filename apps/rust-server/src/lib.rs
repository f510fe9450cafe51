// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vaultshare - Encrypted File Sharing Service
//!
//! Users upload files encrypted in transit under a client-chosen AES key.
//! The server stores the content, hands back an opaque file reference and
//! lets the owner share the file with other users under time-limited,
//! revocable view/download grants.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer token verification and principal provisioning
//! - `crypto` - Transport cipher, file references, at-rest protection
//! - `sharing` - Access decisions and the sharing workflows
//! - `storage` - Content blobs, sharing ledger (redb) and audit log

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod sharing;
pub mod state;
pub mod storage;
pub mod telemetry;
