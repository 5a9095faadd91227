use super::require_verified;
use crate::{
    session::SessionRegistry,
    settings::{SharedSettings, SystemSettings},
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::info;

#[utoipa::path(
    get,
    path = "/v1/settings",
    responses(
        (status = 200, description = "Current system settings", body = SystemSettings)
    ),
    tag = "settings"
)]
pub async fn get_settings(settings: Extension<SharedSettings>) -> impl IntoResponse {
    (StatusCode::OK, Json(settings.get().await))
}

#[utoipa::path(
    put,
    path = "/v1/admin/settings",
    request_body = SystemSettings,
    responses(
        (status = 200, description = "Settings replaced", body = SystemSettings),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 403, description = "Admin verification required", body = super::ErrorBody),
    ),
    tag = "settings"
)]
pub async fn put_settings(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionRegistry>>,
    settings: Extension<SharedSettings>,
    Json(request): Json<SystemSettings>,
) -> impl IntoResponse {
    if let Err(err) = require_verified(&headers, &sessions).await {
        return err.into_response();
    }

    let updated = settings.replace(request).await;
    info!(signup_disabled = updated.signup_disabled, "system settings updated");
    (StatusCode::OK, Json(updated)).into_response()
}
