//! Object storage for editor uploads (gallery images, learning materials).

use super::{error_response, forwarded_error, require_verified};
use crate::{backend::BackendClient, session::SessionRegistry};
use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Buckets the editors may write to.
pub const BUCKETS: [&str; 3] = ["gallery", "materials", "images"];

/// Upload size cap applied to the storage routes.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    pub url: String,
}

fn known_bucket(bucket: &str) -> bool {
    BUCKETS.contains(&bucket)
}

fn object_path_is_valid(path: &str) -> bool {
    !path.is_empty()
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[utoipa::path(
    post,
    path = "/v1/admin/storage/{bucket}/{path}",
    params(
        ("bucket" = String, Path, description = "One of `gallery`, `materials`, `images`"),
        ("path" = String, Path, description = "Object path inside the bucket")
    ),
    request_body(content = String, content_type = "application/octet-stream", description = "Raw file bytes"),
    responses(
        (status = 201, description = "Object stored; public URL returned", body = UploadResponse),
        (status = 400, description = "Invalid object path or empty body", body = super::ErrorBody),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 403, description = "Admin verification required", body = super::ErrorBody),
        (status = 404, description = "Unknown bucket", body = super::ErrorBody),
    ),
    tag = "editor"
)]
#[instrument(skip_all)]
pub async fn upload(
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
    body: Bytes,
) -> impl IntoResponse {
    let caller = match require_verified(&headers, &sessions).await {
        Ok(caller) => caller,
        Err(err) => return err.into_response(),
    };

    if !known_bucket(&bucket) {
        return error_response(StatusCode::NOT_FOUND, format!("unknown bucket: {bucket}"));
    }

    if !object_path_is_valid(&path) {
        return error_response(StatusCode::BAD_REQUEST, "invalid object path");
    }

    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty upload");
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    let token = caller.context.session.access_token.expose_secret();
    match backend
        .upload(&bucket, &path, body.to_vec(), content_type, Some(token))
        .await
    {
        Ok(url) => {
            info!(%bucket, %path, "object uploaded");
            let response = UploadResponse {
                url: url.to_string(),
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(err) => forwarded_error(&sessions, &caller.token, &err).await,
    }
}

#[utoipa::path(
    delete,
    path = "/v1/admin/storage/{bucket}/{path}",
    params(
        ("bucket" = String, Path, description = "One of `gallery`, `materials`, `images`"),
        ("path" = String, Path, description = "Object path inside the bucket")
    ),
    responses(
        (status = 204, description = "Object removed"),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 403, description = "Admin verification required", body = super::ErrorBody),
        (status = 404, description = "Unknown bucket", body = super::ErrorBody),
    ),
    tag = "editor"
)]
#[instrument(skip_all)]
pub async fn remove(
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
) -> impl IntoResponse {
    let caller = match require_verified(&headers, &sessions).await {
        Ok(caller) => caller,
        Err(err) => return err.into_response(),
    };

    if !known_bucket(&bucket) {
        return error_response(StatusCode::NOT_FOUND, format!("unknown bucket: {bucket}"));
    }

    if !object_path_is_valid(&path) {
        return error_response(StatusCode::BAD_REQUEST, "invalid object path");
    }

    let token = caller.context.session.access_token.expose_secret();
    match backend.remove(&bucket, &path, Some(token)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => forwarded_error(&sessions, &caller.token, &err).await,
    }
}
