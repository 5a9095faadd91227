//! Admin gate endpoint.
//!
//! Flow Overview:
//! 1) Resolve the signed-in session from the cookie.
//! 2) Check the email domain, then the passkey.
//! 3) Set the session's verified flag.
//! 4) Make sure an `admin_users` row exists; failures here are logged only.

use super::require_session;
use crate::{
    backend::BackendClient,
    gate::{
        admin_user::{ensure_admin_user, EnsureOutcome},
        AdminGate, GateError,
    },
    session::{AuthState, SessionRegistry},
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct VerifyRequest {
    pub passkey: String,
}

impl std::fmt::Debug for VerifyRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyRequest")
            .field("passkey", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyResponse {
    pub state: AuthState,
}

#[utoipa::path(
    post,
    path = "/v1/admin/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Passkey accepted; the session may use the editors", body = VerifyResponse),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 403, description = "Unauthorized domain or invalid passkey", body = super::ErrorBody),
    ),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn verify(
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
    gate: Extension<Arc<AdminGate>>,
    Json(request): Json<VerifyRequest>,
) -> impl IntoResponse {
    let caller = match require_session(&headers, &sessions).await {
        Ok(caller) => caller,
        Err(err) => return err.into_response(),
    };

    let session = &caller.context.session;
    if let Err(err) = gate.verify_passkey(session.email(), &request.passkey) {
        info!(user_id = %session.user.id, "admin gate refused: {err}");
        return err.into_response();
    }

    if !sessions.mark_verified(&caller.token).await {
        // Signed out or expired between the lookup and now.
        return GateError::NoSession.into_response();
    }

    match ensure_admin_user(&backend, &session.user, &session.access_token).await {
        Ok(EnsureOutcome::Existing) => debug!("admin user already recorded"),
        Ok(EnsureOutcome::Inserted) => info!(user_id = %session.user.id, "admin user recorded"),
        Ok(EnsureOutcome::Raced) => debug!("admin user recorded by a concurrent request"),
        Err(err) => warn!("Failed to record admin user: {err}"),
    }

    let response = VerifyResponse {
        state: AuthState::SignedInVerified,
    };
    (StatusCode::OK, Json(response)).into_response()
}

