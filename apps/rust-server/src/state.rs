// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Application state shared by every handler.
//!
//! Everything here is constructed once at startup from [`AppConfig`] and
//! injected into handlers; there is no process-global mutable state.

use std::sync::Arc;

use crate::auth::{AuthError, JwksManager};
use crate::config::{AppConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::crypto::{AtRestPolicy, CipherError, ReferenceError, ReferenceKey, ReferenceTokenizer};
use crate::sharing::SharingService;
use crate::storage::{DbError, DiskStorage, ShareDatabase, StorageError, StoragePaths};

/// Failure while assembling the application state.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("database: {0}")]
    Database(#[from] DbError),

    #[error("reference key: {0}")]
    ReferenceKey(#[from] ReferenceError),

    #[error("at-rest key: {0}")]
    AtRestKey(#[from] CipherError),

    #[error("authentication: {0}")]
    Auth(#[from] AuthError),
}

/// Bearer token verification settings.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// `None` accepts only unsigned development tokens, and only in
    /// development builds.
    pub jwks: Option<Arc<JwksManager>>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppState {
    pub sharing: SharingService,
    pub auth_config: AuthConfig,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(sharing: SharingService) -> Self {
        Self {
            sharing,
            auth_config: AuthConfig::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Open storage, the ledger and the keys described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, InitError> {
        let mut disk = DiskStorage::new(StoragePaths::new(&config.data_dir));
        disk.initialize()?;

        let db = ShareDatabase::open(&disk.paths().database())?;

        let reference_key = match &config.reference_key {
            Some(hex) => {
                tracing::info!("Using reference key from environment");
                ReferenceKey::from_hex(hex)?
            }
            None => ReferenceKey::load_or_create(&disk.paths().reference_key())?,
        };
        let tokenizer = ReferenceTokenizer::new(&reference_key)?;

        let at_rest = AtRestPolicy::from_hex_key(config.at_rest_key.as_deref())?;
        if at_rest.is_enabled() {
            tracing::info!("Encryption at rest enabled");
        } else {
            tracing::warn!("Encryption at rest disabled, file content is stored in plaintext");
        }

        let jwks = match &config.auth.jwks_url {
            Some(url) => Some(Arc::new(JwksManager::new(url)?)),
            None => {
                tracing::warn!("AUTH_JWKS_URL not set, bearer tokens cannot be verified");
                None
            }
        };

        let sharing = SharingService::new(db, disk, tokenizer, at_rest, config.content_timeout);
        Ok(Self::new(sharing)
            .with_auth_config(AuthConfig {
                jwks,
                issuer: config.auth.issuer.clone(),
                audience: config.auth.audience.clone(),
            })
            .with_max_upload_bytes(config.max_upload_bytes))
    }
}
