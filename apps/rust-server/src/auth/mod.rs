// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token authentication. Tokens are issued by an external identity
//! provider; this service only verifies them.
//!
//! ## Auth Flow
//!
//! 1. The client authenticates with the identity provider
//! 2. The client sends `Authorization: Bearer <JWT>`
//! 3. The server:
//!    - Fetches the provider's JWKS via HTTPS
//!    - Verifies signature, expiry, issuer and audience
//!    - Extracts `sub` (canonical principal id), username, email and role
//!    - Provisions or refreshes the principal record
//!
//! ## Security
//!
//! - Every file endpoint requires authentication
//! - JWKS is cached with a TTL
//! - Clock skew tolerance is 60 seconds
//! - Unsigned tokens are accepted only by development builds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod roles;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::Auth;
pub use jwks::JwksManager;
pub use roles::Role;
