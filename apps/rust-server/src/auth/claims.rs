// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the authenticated identity derived from them.

use serde::Deserialize;

use super::roles::Role;
use crate::storage::PrincipalProfile;

/// Claims read from a verified bearer token.
///
/// Standard OIDC claims plus the identity provider's public metadata.
/// Expiry, issuer and audience are validated by `jsonwebtoken` before these
/// are read.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    /// Subject - the stable principal id
    pub sub: String,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,

    /// Session ID
    #[serde(default)]
    pub sid: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub preferred_username: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Absent is treated as verified; only an explicit `false` deactivates.
    #[serde(default)]
    pub email_verified: Option<bool>,

    /// Public metadata carrying the role
    #[serde(default, rename = "publicMetadata")]
    pub public_metadata: Option<PublicMetadata>,
}

/// Public metadata set by the identity provider.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PublicMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

/// Identity of the caller, extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub role: Role,
    pub session_id: Option<String>,
    /// Token expiration (Unix timestamp)
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: IdentityClaims) -> Self {
        let role = claims
            .public_metadata
            .as_ref()
            .and_then(|m| m.role.as_deref())
            .and_then(Role::parse)
            .unwrap_or_default();

        let username = claims
            .username
            .or(claims.preferred_username)
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| claims.sub.clone());

        Self {
            user_id: claims.sub,
            username,
            email: claims.email,
            email_verified: claims.email_verified.unwrap_or(true),
            role,
            session_id: claims.sid,
            expires_at: claims.exp,
        }
    }

    /// Attributes used to provision the principal record.
    pub fn profile(&self) -> PrincipalProfile {
        PrincipalProfile {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            active: self.email_verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims() -> IdentityClaims {
        IdentityClaims {
            sub: "user_123".to_string(),
            exp: 1700003600,
            sid: Some("sess_abc".to_string()),
            username: Some("alice".to_string()),
            preferred_username: Some("alice_p".to_string()),
            email: Some("alice@example.com".to_string()),
            email_verified: Some(true),
            public_metadata: Some(PublicMetadata {
                role: Some("admin".to_string()),
            }),
        }
    }

    #[test]
    fn from_claims_extracts_identity() {
        let user = AuthenticatedUser::from_claims(sample_claims());
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::Admin);
        assert!(user.email_verified);
    }

    #[test]
    fn username_falls_back_to_preferred_then_sub() {
        let mut claims = sample_claims();
        claims.username = None;
        assert_eq!(AuthenticatedUser::from_claims(claims.clone()).username, "alice_p");

        claims.preferred_username = Some("   ".to_string());
        assert_eq!(AuthenticatedUser::from_claims(claims).username, "user_123");
    }

    #[test]
    fn unknown_or_missing_role_is_guest() {
        let mut claims = sample_claims();
        claims.public_metadata = Some(PublicMetadata {
            role: Some("superuser".to_string()),
        });
        assert_eq!(AuthenticatedUser::from_claims(claims.clone()).role, Role::Guest);

        claims.public_metadata = None;
        assert_eq!(AuthenticatedUser::from_claims(claims).role, Role::Guest);
    }

    #[test]
    fn unverified_email_yields_inactive_profile() {
        let mut claims = sample_claims();
        claims.email_verified = Some(false);
        let profile = AuthenticatedUser::from_claims(claims).profile();
        assert!(!profile.active);
        assert_eq!(profile.user_id, "user_123");
    }
}
