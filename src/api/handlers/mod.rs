//! API handlers and shared utilities for campus.
//!
//! Handlers resolve the caller's local session from the `campus_session`
//! cookie (or a bearer token), re-derive the authorization state on every
//! request and forward data operations to the hosted backend.

pub mod admin;
pub mod auth;
pub mod content;
pub mod editor;
pub mod health;
pub mod settings;
pub mod storage;

use crate::{
    backend::BackendError,
    gate::GateError,
    session::{SessionContext, SessionRegistry},
};
use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};
use utoipa::ToSchema;

pub(crate) const SESSION_COOKIE_NAME: &str = "campus_session";

/// Error body returned by every endpoint.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

/// A content row; the shape depends on the content kind.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ContentRow(pub Value);

/// Lightweight email sanity check used before calling the backend.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NoSession => StatusCode::UNAUTHORIZED,
            Self::UnauthorizedDomain | Self::InvalidPasskey | Self::NotVerified => {
                StatusCode::FORBIDDEN
            }
        };
        error_response(status, self.to_string())
    }
}

/// Pass the backend's status and message through; 502 when it never answered.
pub(crate) fn backend_error_response(err: &BackendError) -> Response {
    match err {
        BackendError::Api {
            status, message, ..
        } => {
            let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            error_response(status, message.clone())
        }
        BackendError::Transport(_) | BackendError::InvalidResponse(_) => {
            error!("Backend call failed: {err}");
            error_response(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

/// Failure of a call made with the user's token. A 401 from the backend means
/// the session is gone, so the local entry is dropped too.
pub(crate) async fn forwarded_error(
    sessions: &SessionRegistry,
    token: &str,
    err: &BackendError,
) -> Response {
    if err.is_unauthorized() {
        debug!("Backend rejected the session token, expiring local session");
        sessions.expire(token).await;
    }
    backend_error_response(err)
}

/// A live session, verified or not.
#[derive(Debug)]
pub(crate) struct Caller {
    pub token: String,
    pub context: SessionContext,
}

pub(crate) async fn require_session(
    headers: &HeaderMap,
    sessions: &SessionRegistry,
) -> Result<Caller, GateError> {
    let token = extract_session_token(headers).ok_or(GateError::NoSession)?;
    let context = sessions
        .lookup(&token)
        .await
        .ok_or(GateError::NoSession)?;
    Ok(Caller { token, context })
}

/// A live session that has passed the admin gate.
pub(crate) async fn require_verified(
    headers: &HeaderMap,
    sessions: &SessionRegistry,
) -> Result<Caller, GateError> {
    let caller = require_session(headers, sessions).await?;
    if caller.context.verified {
        Ok(caller)
    } else {
        Err(GateError::NotVerified)
    }
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        // Flags like `consent` carry no value.
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        let val = val.trim();
        if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderValue};

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("admin@gmail.com"));
        assert!(!valid_email("admin"));
        assert!(!valid_email("admin@gmail"));
        assert!(!valid_email("ad min@gmail.com"));
    }

    #[test]
    fn session_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; campus_session=abc123; other=1"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn valueless_cookies_are_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("consent; ; campus_session=abc123"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn bearer_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("campus_session=cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("header"));
    }

    #[test]
    fn empty_values_are_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("campus_session="));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_session_token(&headers).is_none());
    }

    #[test]
    fn gate_errors_map_to_status() {
        assert_eq!(
            GateError::NoSession.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GateError::NotVerified.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GateError::InvalidPasskey.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn backend_status_is_passed_through() {
        let err = BackendError::Api {
            status: reqwest::StatusCode::CONFLICT,
            code: Some("23505".to_string()),
            message: "duplicate key value".to_string(),
        };
        assert_eq!(backend_error_response(&err).status(), StatusCode::CONFLICT);

        let err = BackendError::InvalidResponse("not json".to_string());
        assert_eq!(
            backend_error_response(&err).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
