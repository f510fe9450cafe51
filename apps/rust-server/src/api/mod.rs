// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    models::{
        DeleteFileResponse, FileContentResponse, GranteeInfo, MessageResponse, OwnedFileInfo,
        OwnedFilesResponse, RevokeRequest, ShareRequest, ShareResponse, SharedFileInfo,
        SharedFilesResponse, SharedUserInfo, SharedWithResponse, UpdatePermissionRequest,
        UploadRequest, UploadResponse, UserDetailsResponse,
    },
    state::AppState,
};

pub mod files;
pub mod health;
pub mod sharing;
pub mod users;

pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    let api_routes = Router::new()
        .route("/upload/", post(files::upload_file).layer(upload_limit))
        .route("/view/{file_ref}/", get(files::view_file))
        .route("/access/{file_ref}/", get(files::access_file))
        .route("/all-files/", get(files::all_files))
        .route("/files/{file_ref}/", delete(files::delete_file))
        .route("/share/{file_ref}/", post(sharing::share_file))
        .route("/current-access-files/", get(sharing::current_access_files))
        .route("/shared-with/{file_ref}/", get(sharing::shared_with))
        .route("/update-permission/{file_ref}/", post(sharing::update_permission))
        .route("/revoke/{file_ref}/", post(sharing::revoke_access))
        .route("/user-details/", get(users::user_details));

    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
        )
    });

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback(|| async { ApiError::not_found("Not found") })
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        files::upload_file,
        files::view_file,
        files::access_file,
        files::all_files,
        files::delete_file,
        sharing::share_file,
        sharing::current_access_files,
        sharing::shared_with,
        sharing::update_permission,
        sharing::revoke_access,
        users::user_details
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            UploadRequest,
            UploadResponse,
            FileContentResponse,
            OwnedFileInfo,
            OwnedFilesResponse,
            DeleteFileResponse,
            ShareRequest,
            ShareResponse,
            SharedUserInfo,
            SharedFileInfo,
            SharedFilesResponse,
            GranteeInfo,
            SharedWithResponse,
            UpdatePermissionRequest,
            RevokeRequest,
            MessageResponse,
            UserDetailsResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Files", description = "Encrypted upload, content access and deletion"),
        (name = "Sharing", description = "Time-limited, revocable file sharing"),
        (name = "Users", description = "Caller identity")
    )
)]
struct ApiDoc;
