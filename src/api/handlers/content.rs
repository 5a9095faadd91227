//! Public content endpoint. Never fails on backend trouble: the fallback
//! payload is served instead.

use super::error_response;
use crate::content::{ContentKind, ContentStore, Source};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ContentResponse {
    pub kind: ContentKind,
    pub source: Source,
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<Value>,
}

#[utoipa::path(
    get,
    path = "/v1/content/{kind}",
    params(
        ("kind" = ContentKind, Path, description = "Content kind, e.g. `hero` or `gallery`")
    ),
    responses(
        (status = 200, description = "Live rows, or the default payload when none are usable", body = ContentResponse),
        (status = 404, description = "Unknown content kind", body = super::ErrorBody)
    ),
    tag = "content"
)]
pub async fn get_content(
    Path(kind): Path<String>,
    store: Extension<ContentStore>,
) -> impl IntoResponse {
    let kind = match kind.parse::<ContentKind>() {
        Ok(kind) => kind,
        Err(err) => return error_response(StatusCode::NOT_FOUND, err.to_string()),
    };

    let loaded = store.load_json(kind).await;
    let response = ContentResponse {
        kind,
        source: loaded.source,
        rows: loaded.rows,
    };

    (StatusCode::OK, Json(response)).into_response()
}

