//! CMS editors: one generic set of CRUD endpoints per content kind.
//!
//! Every call requires a verified admin session and is forwarded with the
//! user's own access token. No optimistic concurrency: last write wins. A
//! failed call returns the backend's status and raw message.

use super::{error_response, forwarded_error, require_verified, Caller, ContentRow};
use crate::{
    backend::BackendClient,
    content::ContentKind,
    session::SessionRegistry,
};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

fn parse_kind(kind: &str) -> Result<ContentKind, Response> {
    kind.parse::<ContentKind>()
        .map_err(|err| error_response(StatusCode::NOT_FOUND, err.to_string()))
}

fn bearer(caller: &Caller) -> Option<&str> {
    Some(caller.context.session.access_token.expose_secret())
}

/// Resolve the kind and the verified caller, in that order.
async fn authorize(
    kind: &str,
    headers: &HeaderMap,
    sessions: &SessionRegistry,
) -> Result<(ContentKind, Caller), Response> {
    let kind = parse_kind(kind)?;
    let caller = require_verified(headers, sessions)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok((kind, caller))
}

fn validated(kind: ContentKind, row: Value) -> Result<Value, Response> {
    kind.validate(row).map_err(|err| {
        error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("invalid {kind} row: {err}"),
        )
    })
}

#[utoipa::path(
    get,
    path = "/v1/admin/content/{kind}",
    params(("kind" = ContentKind, Path, description = "Content kind")),
    responses(
        (status = 200, description = "Every row of the table, inactive ones included", body = [ContentRow]),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 403, description = "Admin verification required", body = super::ErrorBody),
    ),
    tag = "editor"
)]
#[instrument(skip_all)]
pub async fn list(
    Path(kind): Path<String>,
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
) -> impl IntoResponse {
    let (kind, caller) = match authorize(&kind, &headers, &sessions).await {
        Ok(authorized) => authorized,
        Err(response) => return response,
    };

    match backend
        .select(kind.table(), &kind.editor_query(), bearer(&caller))
        .await
    {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => forwarded_error(&sessions, &caller.token, &err).await,
    }
}

#[utoipa::path(
    post,
    path = "/v1/admin/content/{kind}",
    params(("kind" = ContentKind, Path, description = "Content kind")),
    request_body = ContentRow,
    responses(
        (status = 201, description = "Row inserted", body = [ContentRow]),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 403, description = "Admin verification required", body = super::ErrorBody),
        (status = 422, description = "Row does not match the kind", body = super::ErrorBody),
    ),
    tag = "editor"
)]
#[instrument(skip_all)]
pub async fn create(
    Path(kind): Path<String>,
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
    Json(row): Json<Value>,
) -> impl IntoResponse {
    let (kind, caller) = match authorize(&kind, &headers, &sessions).await {
        Ok(authorized) => authorized,
        Err(response) => return response,
    };

    let row = match validated(kind, row) {
        Ok(row) => row,
        Err(response) => return response,
    };

    match backend.insert(kind.table(), &row, bearer(&caller)).await {
        Ok(rows) => (StatusCode::CREATED, Json(rows)).into_response(),
        Err(err) => forwarded_error(&sessions, &caller.token, &err).await,
    }
}

#[utoipa::path(
    put,
    path = "/v1/admin/content/{kind}",
    params(("kind" = ContentKind, Path, description = "Content kind")),
    request_body = ContentRow,
    responses(
        (status = 200, description = "Row inserted or merged by id", body = [ContentRow]),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 403, description = "Admin verification required", body = super::ErrorBody),
        (status = 422, description = "Row does not match the kind", body = super::ErrorBody),
    ),
    tag = "editor"
)]
#[instrument(skip_all)]
pub async fn upsert(
    Path(kind): Path<String>,
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
    Json(row): Json<Value>,
) -> impl IntoResponse {
    let (kind, caller) = match authorize(&kind, &headers, &sessions).await {
        Ok(authorized) => authorized,
        Err(response) => return response,
    };

    let row = match validated(kind, row) {
        Ok(row) => row,
        Err(response) => return response,
    };

    match backend.upsert(kind.table(), &row, bearer(&caller)).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => forwarded_error(&sessions, &caller.token, &err).await,
    }
}

#[utoipa::path(
    patch,
    path = "/v1/admin/content/{kind}/{id}",
    params(
        ("kind" = ContentKind, Path, description = "Content kind"),
        ("id" = String, Path, description = "Row id")
    ),
    request_body = ContentRow,
    responses(
        (status = 200, description = "Updated rows", body = [ContentRow]),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 403, description = "Admin verification required", body = super::ErrorBody),
        (status = 422, description = "Patch is not a JSON object", body = super::ErrorBody),
    ),
    tag = "editor"
)]
#[instrument(skip_all)]
pub async fn update(
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
    Json(patch): Json<Value>,
) -> impl IntoResponse {
    let (kind, caller) = match authorize(&kind, &headers, &sessions).await {
        Ok(authorized) => authorized,
        Err(response) => return response,
    };

    let Value::Object(mut fields) = patch else {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "patch must be a JSON object",
        );
    };
    // The id comes from the path.
    fields.remove("id");

    match backend
        .update(kind.table(), &id, &Value::Object(fields), bearer(&caller))
        .await
    {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => forwarded_error(&sessions, &caller.token, &err).await,
    }
}

#[utoipa::path(
    delete,
    path = "/v1/admin/content/{kind}/{id}",
    params(
        ("kind" = ContentKind, Path, description = "Content kind"),
        ("id" = String, Path, description = "Row id")
    ),
    responses(
        (status = 204, description = "Row deleted"),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 403, description = "Admin verification required", body = super::ErrorBody),
    ),
    tag = "editor"
)]
#[instrument(skip_all)]
pub async fn delete(
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
) -> impl IntoResponse {
    let (kind, caller) = match authorize(&kind, &headers, &sessions).await {
        Ok(authorized) => authorized,
        Err(response) => return response,
    };

    match backend.delete(kind.table(), &id, bearer(&caller)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => forwarded_error(&sessions, &caller.token, &err).await,
    }
}
