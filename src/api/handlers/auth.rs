//! Account endpoints: sign-up, sign-in, sign-out, session probe and password
//! management. The backend owns the accounts; this service only keeps the
//! local session entry that the `campus_session` cookie points at.

use super::{
    backend_error_response, error_response, extract_session_token, forwarded_error,
    require_session, valid_email, SESSION_COOKIE_NAME,
};
use crate::{
    backend::{
        auth::{now_unix_seconds, Session, SignUpOutcome},
        BackendClient,
    },
    gate::admin_user,
    session::{AuthState, SessionRegistry},
    settings::SharedSettings,
};
use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use url::Url;
use utoipa::ToSchema;

const PASSWORD_RESET_PATH: &str = "reset-password";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_cookie_secure: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        let session_cookie_secure = Url::parse(&frontend_base_url)
            .map(|url| url.scheme() == "https")
            .unwrap_or(false);

        Self {
            frontend_base_url: frontend_base_url.trim_end_matches('/').to_string(),
            session_cookie_secure,
        }
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    /// Where the recovery email sends the user.
    #[must_use]
    pub fn password_reset_url(&self) -> String {
        format!("{}/{PASSWORD_RESET_PATH}", self.frontend_base_url)
    }
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct PasswordUpdateRequest {
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub state: AuthState,
    pub email: Option<String>,
    pub is_admin: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignUpResponse {
    pub state: AuthState,
    pub email: String,
    /// The backend sent a confirmation email; sign in after confirming.
    pub confirmation_required: bool,
}

#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = SignUpResponse),
        (status = 202, description = "Account created, email confirmation pending", body = SignUpResponse),
        (status = 400, description = "Malformed email or rejected by the backend", body = super::ErrorBody),
        (status = 403, description = "Sign-up is disabled", body = super::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn signup(
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
    settings: Extension<SharedSettings>,
    auth_config: Extension<AuthConfig>,
    Json(request): Json<CredentialsRequest>,
) -> impl IntoResponse {
    if settings.get().await.signup_disabled {
        return error_response(StatusCode::FORBIDDEN, "signup disabled");
    }

    let email = request.email.trim();
    if !valid_email(email) {
        return error_response(StatusCode::BAD_REQUEST, "invalid email");
    }

    match backend.sign_up(email, &request.password).await {
        Ok(SignUpOutcome::Session(session)) => {
            let response = SignUpResponse {
                state: AuthState::SignedInUnverified,
                email: session.email().to_string(),
                confirmation_required: false,
            };
            match start_session(&sessions, &auth_config, session).await {
                Ok(headers) => (StatusCode::CREATED, headers, Json(response)).into_response(),
                Err(response) => response,
            }
        }
        Ok(SignUpOutcome::ConfirmationRequired(user)) => {
            debug!(user_id = %user.id, "sign-up pending email confirmation");
            let response = SignUpResponse {
                state: AuthState::Anonymous,
                email: email.to_string(),
                confirmation_required: true,
            };
            (StatusCode::ACCEPTED, Json(response)).into_response()
        }
        Err(err) => backend_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = SessionResponse),
        (status = 400, description = "Invalid credentials", body = super::ErrorBody),
        (status = 502, description = "Backend unreachable", body = super::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
    auth_config: Extension<AuthConfig>,
    Json(request): Json<CredentialsRequest>,
) -> impl IntoResponse {
    let email = request.email.trim();
    if !valid_email(email) {
        return error_response(StatusCode::BAD_REQUEST, "invalid email");
    }

    let session = match backend.sign_in_with_password(email, &request.password).await {
        Ok(session) => session,
        Err(err) => return backend_error_response(&err),
    };

    let response = SessionResponse {
        state: AuthState::SignedInUnverified,
        email: Some(session.email().to_string()),
        is_admin: false,
    };

    match start_session(&sessions, &auth_config, session).await {
        Ok(headers) => (StatusCode::OK, headers, Json(response)).into_response(),
        Err(response) => response,
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
    auth_config: Extension<AuthConfig>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        // Local state is already gone when this returns, remote failure or not.
        sessions.sign_out(&token, &backend).await;
    }

    // Always clear the cookie, even if the session entry was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(&auth_config) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Current authorization state", body = SessionResponse)
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
) -> impl IntoResponse {
    let Ok(caller) = require_session(&headers, &sessions).await else {
        let response = SessionResponse {
            state: AuthState::Anonymous,
            email: None,
            is_admin: false,
        };
        return (StatusCode::OK, Json(response)).into_response();
    };

    let is_admin = match admin_user::is_admin(&backend, &caller.context.session.access_token).await
    {
        Ok(is_admin) => is_admin,
        Err(err) => {
            warn!("is_admin lookup failed: {err}");
            if err.is_unauthorized() {
                sessions.expire(&caller.token).await;
                let response = SessionResponse {
                    state: AuthState::Anonymous,
                    email: None,
                    is_admin: false,
                };
                return (StatusCode::OK, Json(response)).into_response();
            }
            false
        }
    };

    let response = SessionResponse {
        state: caller.context.state(),
        email: Some(caller.context.session.email().to_string()),
        is_admin,
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/password/reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 202, description = "Recovery email requested"),
        (status = 400, description = "Malformed email", body = super::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn password_reset(
    backend: Extension<BackendClient>,
    auth_config: Extension<AuthConfig>,
    Json(request): Json<PasswordResetRequest>,
) -> impl IntoResponse {
    let email = request.email.trim();
    if !valid_email(email) {
        return error_response(StatusCode::BAD_REQUEST, "invalid email");
    }

    if let Err(err) = backend
        .reset_password_for_email(email, &auth_config.password_reset_url())
        .await
    {
        error!("Password reset request failed: {err}");
    }

    StatusCode::ACCEPTED.into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/password",
    request_body = PasswordUpdateRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 400, description = "Empty or rejected password", body = super::ErrorBody),
        (status = 401, description = "No active session", body = super::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn password_update(
    headers: HeaderMap,
    backend: Extension<BackendClient>,
    sessions: Extension<Arc<SessionRegistry>>,
    Json(request): Json<PasswordUpdateRequest>,
) -> impl IntoResponse {
    let caller = match require_session(&headers, &sessions).await {
        Ok(caller) => caller,
        Err(err) => return err.into_response(),
    };

    if request.password.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "password must not be empty");
    }

    match backend
        .update_password(&caller.context.session.access_token, &request.password)
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => forwarded_error(&sessions, &caller.token, &err).await,
    }
}

/// Register `session` locally and build the `Set-Cookie` header for it.
async fn start_session(
    sessions: &SessionRegistry,
    auth_config: &AuthConfig,
    session: Session,
) -> Result<HeaderMap, Response> {
    let max_age = (session.expires_at - now_unix_seconds()).max(0);

    let token = sessions.sign_in(session).await.map_err(|err| {
        error!("Failed to create local session: {err}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })?;

    let cookie = session_cookie(auth_config, &token, max_age).map_err(|err| {
        error!("Failed to build session cookie: {err}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok(headers)
}

/// `HttpOnly` cookie that lives as long as the backend session.
fn session_cookie(
    auth_config: &AuthConfig,
    token: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if auth_config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(auth_config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if auth_config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_secure_only_for_https_frontends() {
        let plain = AuthConfig::new("http://localhost:5173".to_string());
        assert!(!plain.session_cookie_secure());

        let tls = AuthConfig::new("https://school.example/".to_string());
        assert!(tls.session_cookie_secure());
        assert_eq!(tls.frontend_base_url(), "https://school.example");

        let cookie = session_cookie(&tls, "abc", 60).map(|value| value.to_str().map(str::to_string));
        assert!(matches!(
            cookie,
            Ok(Ok(ref value)) if value == "campus_session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=60; Secure"
        ));
    }

    #[test]
    fn clearing_cookie_expires_it() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        let cookie = clear_session_cookie(&config).map(|value| value.to_str().map(str::to_string));
        assert!(matches!(
            cookie,
            Ok(Ok(ref value)) if value.ends_with("Max-Age=0") && value.starts_with("campus_session=;")
        ));
    }

    #[test]
    fn reset_url_points_at_frontend() {
        let config = AuthConfig::new("http://localhost:5173/".to_string());
        assert_eq!(
            config.password_reset_url(),
            "http://localhost:5173/reset-password"
        );
    }
}
