// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sharing endpoints.
//!
//! Only a file's owner can share it, list its grantees, change a grantee's
//! permissions or revoke a share. Grantees see what is shared with them
//! through `/api/current-access-files/`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{
        GranteeInfo, MessageResponse, RevokeRequest, ShareRequest, ShareResponse,
        SharedFileInfo, SharedFilesResponse, SharedWithResponse, UpdatePermissionRequest,
    },
    sharing::ShareError,
    state::AppState,
};

/// Share a file with another user, or overwrite an existing share.
#[utoipa::path(
    post,
    path = "/api/share/{file_ref}/",
    tag = "Sharing",
    security(("bearer_auth" = [])),
    params(
        ("file_ref" = String, Path, description = "Opaque file reference")
    ),
    request_body = ShareRequest,
    responses(
        (status = 200, description = "File shared", body = ShareResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File or user not found")
    )
)]
pub async fn share_file(
    Auth(principal): Auth,
    State(state): State<AppState>,
    Path(file_ref): Path<String>,
    payload: Result<Json<ShareRequest>, JsonRejection>,
) -> Result<Json<ShareResponse>, ApiError> {
    let Json(request) = payload?;
    let input = request.into_input()?;
    let outcome = state.sharing.share(&principal, &file_ref, input)?;
    Ok(Json(outcome.into()))
}

/// List files currently shared with the caller.
///
/// Expired shares are omitted.
#[utoipa::path(
    get,
    path = "/api/current-access-files/",
    tag = "Sharing",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Files shared with the caller", body = SharedFilesResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn current_access_files(
    Auth(principal): Auth,
    State(state): State<AppState>,
) -> Result<Json<SharedFilesResponse>, ApiError> {
    let files = state
        .sharing
        .list_shared_with_me(&principal.user_id)?
        .into_iter()
        .map(SharedFileInfo::from)
        .collect();
    Ok(Json(SharedFilesResponse { files }))
}

/// List everyone a file is shared with. Owner only.
#[utoipa::path(
    get,
    path = "/api/shared-with/{file_ref}/",
    tag = "Sharing",
    security(("bearer_auth" = [])),
    params(
        ("file_ref" = String, Path, description = "Opaque file reference")
    ),
    responses(
        (status = 200, description = "Grantees of the file", body = SharedWithResponse),
        (status = 400, description = "Invalid file reference"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File not found")
    )
)]
pub async fn shared_with(
    Auth(principal): Auth,
    State(state): State<AppState>,
    Path(file_ref): Path<String>,
) -> Result<Json<SharedWithResponse>, ApiError> {
    let shared_users = state
        .sharing
        .grantees(&principal.user_id, &file_ref)?
        .into_iter()
        .map(GranteeInfo::from)
        .collect();
    Ok(Json(SharedWithResponse { shared_users }))
}

/// Set one permission flag of an existing share. Owner only.
#[utoipa::path(
    post,
    path = "/api/update-permission/{file_ref}/",
    tag = "Sharing",
    security(("bearer_auth" = [])),
    params(
        ("file_ref" = String, Path, description = "Opaque file reference")
    ),
    request_body = UpdatePermissionRequest,
    responses(
        (status = 200, description = "Permission updated", body = MessageResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File, user or share not found")
    )
)]
pub async fn update_permission(
    Auth(principal): Auth,
    State(state): State<AppState>,
    Path(file_ref): Path<String>,
    payload: Result<Json<UpdatePermissionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let (username, kind, value) = request.into_parts()?;
    state
        .sharing
        .update_permission(&principal.user_id, &file_ref, &username, kind, value)?;
    Ok(Json(MessageResponse::new("Permission updated successfully.")))
}

/// Revoke a user's share. Owner only.
#[utoipa::path(
    post,
    path = "/api/revoke/{file_ref}/",
    tag = "Sharing",
    security(("bearer_auth" = [])),
    params(
        ("file_ref" = String, Path, description = "Opaque file reference")
    ),
    request_body = RevokeRequest,
    responses(
        (status = 200, description = "Access revoked", body = MessageResponse),
        (status = 400, description = "Missing username"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File, user or share not found")
    )
)]
pub async fn revoke_access(
    Auth(principal): Auth,
    State(state): State<AppState>,
    Path(file_ref): Path<String>,
    payload: Result<Json<RevokeRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let username = request
        .username
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ShareError::validation("Missing 'username' in request data."))?;
    state
        .sharing
        .revoke(&principal.user_id, &file_ref, &username)?;
    Ok(Json(MessageResponse::new("Access revoked successfully.")))
}
