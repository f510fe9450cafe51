// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File endpoints: upload, content access, listing and deletion.
//!
//! Content travels encrypted in both directions. Uploads arrive under a
//! client-chosen AES key; downloads leave under a fresh one-time key.

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{
        ContentQuery, DeleteFileResponse, FileContentResponse, OwnedFileInfo, OwnedFilesResponse,
        UploadRequest, UploadResponse,
    },
    sharing::Operation,
    state::AppState,
};

/// Upload a client-encrypted file.
///
/// The server decrypts the content with the supplied key and IV, stores it
/// and returns the file's opaque reference.
#[utoipa::path(
    post,
    path = "/api/upload/",
    tag = "Files",
    security(("bearer_auth" = [])),
    request_body = UploadRequest,
    responses(
        (status = 200, description = "File uploaded", body = UploadResponse),
        (status = 400, description = "Missing or malformed fields"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Decryption failed"),
        (status = 504, description = "Upload timed out")
    )
)]
pub async fn upload_file(
    Auth(principal): Auth,
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let Json(request) = payload?;
    let input = request.into_input()?;
    let uploaded = state.sharing.upload(&principal, input, None).await?;
    Ok(Json(uploaded.into()))
}

/// View a file's content.
///
/// Allowed to the owner and to holders of an active grant with view
/// permission.
#[utoipa::path(
    get,
    path = "/api/view/{file_ref}/",
    tag = "Files",
    security(("bearer_auth" = [])),
    params(
        ("file_ref" = String, Path, description = "Opaque file reference"),
        ContentQuery
    ),
    responses(
        (status = 200, description = "Encrypted content and one-time key", body = FileContentResponse),
        (status = 400, description = "Invalid file reference"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No view permission"),
        (status = 404, description = "File not found"),
        (status = 504, description = "Timed out")
    )
)]
pub async fn view_file(
    Auth(principal): Auth,
    State(state): State<AppState>,
    Path(file_ref): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<FileContentResponse>, ApiError> {
    serve_content(&state, &principal.user_id, &file_ref, Operation::View, query).await
}

/// Download a file's content.
///
/// Allowed to the owner and to holders of an active grant with download
/// permission.
#[utoipa::path(
    get,
    path = "/api/access/{file_ref}/",
    tag = "Files",
    security(("bearer_auth" = [])),
    params(
        ("file_ref" = String, Path, description = "Opaque file reference"),
        ContentQuery
    ),
    responses(
        (status = 200, description = "Encrypted content and one-time key", body = FileContentResponse),
        (status = 400, description = "Invalid file reference"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No download permission"),
        (status = 404, description = "File not found"),
        (status = 504, description = "Timed out")
    )
)]
pub async fn access_file(
    Auth(principal): Auth,
    State(state): State<AppState>,
    Path(file_ref): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<FileContentResponse>, ApiError> {
    serve_content(&state, &principal.user_id, &file_ref, Operation::Download, query).await
}

async fn serve_content(
    state: &AppState,
    principal_id: &str,
    file_ref: &str,
    operation: Operation,
    query: ContentQuery,
) -> Result<Json<FileContentResponse>, ApiError> {
    let timeout = query.timeout_ms.map(Duration::from_millis);
    let content = state
        .sharing
        .access_content(principal_id, file_ref, operation, timeout)
        .await?;
    Ok(Json(content.into()))
}

/// List the caller's own files.
#[utoipa::path(
    get,
    path = "/api/all-files/",
    tag = "Files",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Files uploaded by the caller", body = OwnedFilesResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn all_files(
    Auth(principal): Auth,
    State(state): State<AppState>,
) -> Result<Json<OwnedFilesResponse>, ApiError> {
    let files = state
        .sharing
        .list_owned(&principal.user_id)?
        .into_iter()
        .map(OwnedFileInfo::from)
        .collect();
    Ok(Json(OwnedFilesResponse { files }))
}

/// Delete a file together with all of its shares. Owner only.
#[utoipa::path(
    delete,
    path = "/api/files/{file_ref}/",
    tag = "Files",
    security(("bearer_auth" = [])),
    params(
        ("file_ref" = String, Path, description = "Opaque file reference")
    ),
    responses(
        (status = 200, description = "File deleted", body = DeleteFileResponse),
        (status = 400, description = "Invalid file reference"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File not found")
    )
)]
pub async fn delete_file(
    Auth(principal): Auth,
    State(state): State<AppState>,
    Path(file_ref): Path<String>,
) -> Result<Json<DeleteFileResponse>, ApiError> {
    let deleted = state.sharing.delete_file(&principal.user_id, &file_ref)?;
    Ok(Json(DeleteFileResponse {
        message: "File deleted successfully.".to_string(),
        grants_removed: deleted.grants_removed,
    }))
}
