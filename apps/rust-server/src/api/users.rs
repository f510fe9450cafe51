// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;

use crate::auth::Auth;
use crate::models::UserDetailsResponse;

/// Get the caller's principal record.
///
/// The record is provisioned from the bearer token on every request, so
/// this reflects the latest token claims.
#[utoipa::path(
    get,
    path = "/api/user-details/",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User information", body = UserDetailsResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn user_details(Auth(principal): Auth) -> Json<UserDetailsResponse> {
    Json(principal.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::storage::Principal;
    use chrono::Utc;

    #[test]
    fn user_details_from_principal() {
        let principal = Principal {
            user_id: "user_123".to_string(),
            username: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
            role: Role::User,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let response: UserDetailsResponse = principal.into();
        assert_eq!(response.user_id, "user_123");
        assert_eq!(response.username, "alice");
        assert_eq!(response.role, Role::User);
    }
}
