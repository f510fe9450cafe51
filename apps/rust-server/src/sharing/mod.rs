// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Sharing core
//!
//! - `engine` - per-request access decisions (owner, grant, deny)
//! - `service` - upload, content access, sharing and deletion workflows
//! - `error` - the error taxonomy every operation reports through

pub mod engine;
pub mod error;
pub mod service;

pub use engine::{AccessBasis, AccessDecision, AccessEngine, Operation};
pub use error::ShareError;
pub use service::{
    FileContent, GranteeEntry, OwnedFile, ShareInput, ShareOutcome, SharedWithMe,
    SharingService, UploadInput, UploadedFile,
};
