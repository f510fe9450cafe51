// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated principals.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(principal): Auth) -> impl IntoResponse {
//!     // principal is the provisioned storage::Principal
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, decode_header, Validation};

use super::claims::IdentityClaims;
use super::{AuthenticatedUser, AuthError};
use crate::state::{AppState, AuthConfig};
use crate::storage::{DbError, Principal};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Extractor for authenticated, active principals.
///
/// Verifies the bearer token, then provisions or refreshes the principal
/// record so that other users can share with it by username.
///
/// ## Authentication Modes
///
/// - **Production** (`AUTH_JWKS_URL` set): full signature verification
/// - **Development** (no JWKS, `dev` feature): structure and expiry only
/// - Otherwise every token is refused
pub struct Auth(pub Principal);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let user = verify_jwt(token, &state.auth_config).await?;
        let principal = provision(state, &user)?;
        Ok(Auth(principal))
    }
}

fn provision(state: &AppState, user: &AuthenticatedUser) -> Result<Principal, AuthError> {
    let principal = state
        .sharing
        .sync_principal(&user.profile())
        .map_err(|e| match e {
            DbError::Conflict(_) => AuthError::IdentityConflict(user.username.clone()),
            DbError::InvalidInput(_) => AuthError::MalformedToken,
            other => AuthError::InternalError(other.to_string()),
        })?;

    if !principal.active {
        tracing::debug!(principal = %principal.user_id, "Rejected inactive principal");
        return Err(AuthError::AccountInactive);
    }
    Ok(principal)
}

async fn verify_jwt(token: &str, auth_config: &AuthConfig) -> Result<AuthenticatedUser, AuthError> {
    match &auth_config.jwks {
        Some(jwks) => verify_jwt_production(token, jwks, auth_config).await,
        None => verify_jwt_development(token),
    }
}

async fn verify_jwt_production(
    token: &str,
    jwks: &super::JwksManager,
    auth_config: &AuthConfig,
) -> Result<AuthenticatedUser, AuthError> {
    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

    let (decoding_key, algorithm) = match &header.kid {
        Some(kid) => jwks.get_decoding_key(kid).await?,
        None => jwks.get_any_decoding_key().await?,
    };

    let mut validation = Validation::new(algorithm);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    if let Some(issuer) = &auth_config.issuer {
        validation.set_issuer(&[issuer]);
    }
    match &auth_config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let token_data = decode::<IdentityClaims>(token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            _ => AuthError::MalformedToken,
        }
    })?;

    Ok(AuthenticatedUser::from_claims(token_data.claims))
}

/// Decode without signature verification.
///
/// Only compiled into tests and `dev` builds.
#[cfg(any(test, feature = "dev"))]
fn verify_jwt_development(token: &str) -> Result<AuthenticatedUser, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<IdentityClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = token_data.claims;

    let now = chrono::Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(AuthenticatedUser::from_claims(claims))
}

#[cfg(not(any(test, feature = "dev")))]
fn verify_jwt_development(_token: &str) -> Result<AuthenticatedUser, AuthError> {
    Err(AuthError::NotConfigured)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use axum::http::Request;

    /// Unsigned token accepted in development mode.
    pub(crate) fn test_jwt(user_id: &str, username: &str) -> String {
        test_jwt_with(serde_json::json!({
            "sub": user_id,
            "username": username,
            "email": format!("{username}@example.com"),
            "email_verified": true,
            "iat": 1609459200,
            "exp": 9999999999i64,
            "iss": "test",
        }))
    }

    pub(crate) fn test_jwt_with(claims: serde_json::Value) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let header = r#"{"alg":"RS256","typ":"JWT"}"#;
        let header_b64 = URL_SAFE_NO_PAD.encode(header.as_bytes());
        let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{header_b64}.{claims_b64}.fake_signature")
    }

    fn parts_with(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn requires_auth_header() {
        let (state, _dir) = test_state();
        let result = Auth::from_request_parts(&mut parts_with(None), &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn rejects_non_bearer_scheme() {
        let (state, _dir) = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", "Basic YWxpY2U6c2VjcmV0")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn provisions_principal_from_token() {
        let (state, _dir) = test_state();
        let token = test_jwt("user_123", "alice");

        let Auth(principal) = Auth::from_request_parts(&mut parts_with(Some(&token)), &state)
            .await
            .unwrap();
        assert_eq!(principal.user_id, "user_123");
        assert_eq!(principal.username, "alice");
        assert!(principal.active);
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let (state, _dir) = test_state();
        let token = test_jwt_with(serde_json::json!({
            "sub": "user_123",
            "username": "alice",
            "exp": 1609459200,
        }));
        let result = Auth::from_request_parts(&mut parts_with(Some(&token)), &state).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn rejects_unverified_email() {
        let (state, _dir) = test_state();
        let token = test_jwt_with(serde_json::json!({
            "sub": "user_9",
            "username": "mallory",
            "email_verified": false,
            "exp": 9999999999i64,
        }));
        let result = Auth::from_request_parts(&mut parts_with(Some(&token)), &state).await;
        assert!(matches!(result, Err(AuthError::AccountInactive)));
    }

    #[tokio::test]
    async fn username_taken_by_another_subject_conflicts() {
        let (state, _dir) = test_state();
        let first = test_jwt("user_1", "alice");
        Auth::from_request_parts(&mut parts_with(Some(&first)), &state)
            .await
            .unwrap();

        let impostor = test_jwt("user_2", "alice");
        let result = Auth::from_request_parts(&mut parts_with(Some(&impostor)), &state).await;
        assert!(matches!(result, Err(AuthError::IdentityConflict(_))));
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let (state, _dir) = test_state();
        let result = Auth::from_request_parts(&mut parts_with(Some("not.a.jwt")), &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }
}
