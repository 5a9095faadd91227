//! Session management against the backend's auth API (`/auth/v1`).

use super::{expect_success, read_json, BackendClient, BackendError};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// A backend session. Tokens never appear in `Debug` output.
#[derive(Clone)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Unix seconds after which the backend no longer accepts `access_token`.
    pub expires_at: i64,
    pub user: User,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now_unix: i64) -> bool {
        now_unix >= self.expires_at
    }

    #[must_use]
    pub fn email(&self) -> &str {
        self.user.email.as_deref().unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .unwrap_or_else(|| now_unix_seconds() + token.expires_in.unwrap_or(3600));
        Self {
            access_token: SecretString::from(token.access_token),
            refresh_token: SecretString::from(token.refresh_token),
            expires_at,
            user: token.user,
        }
    }
}

/// Result of a sign-up: either an immediate session, or an account waiting for
/// email confirmation.
#[derive(Debug)]
pub enum SignUpOutcome {
    Session(Session),
    ConfirmationRequired(User),
}

#[must_use]
pub fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

impl BackendClient {
    /// # Errors
    /// Returns the backend's error when sign-up is rejected.
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError> {
        let url = self.endpoint(&["auth", "v1", "signup"])?;
        let response = self
            .request(Method::POST, url, None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let body: Value = read_json(response).await?;

        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)
                .map_err(|err| BackendError::InvalidResponse(err.to_string()))?;
            return Ok(SignUpOutcome::Session(token.into()));
        }

        // Without a session the backend returns the user, either bare or nested.
        let user_value = body.get("user").cloned().unwrap_or(body);
        let user: User = serde_json::from_value(user_value)
            .map_err(|err| BackendError::InvalidResponse(err.to_string()))?;
        debug!(user_id = %user.id, "sign-up awaiting email confirmation");
        Ok(SignUpOutcome::ConfirmationRequired(user))
    }

    /// Password grant.
    ///
    /// # Errors
    /// Returns the backend's error (e.g. invalid credentials) verbatim.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let mut url = self.endpoint(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .request(Method::POST, url, None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let token: TokenResponse = read_json(response).await?;
        Ok(token.into())
    }

    /// Exchange a refresh token for a new session.
    ///
    /// # Errors
    /// Returns `BackendError::Api` when the refresh token is rejected (revoked,
    /// reused or expired).
    #[instrument(skip_all)]
    pub async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<Session, BackendError> {
        let mut url = self.endpoint(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let response = self
            .request(Method::POST, url, None)
            .json(&json!({ "refresh_token": refresh_token.expose_secret() }))
            .send()
            .await?;

        let token: TokenResponse = read_json(response).await?;
        Ok(token.into())
    }

    /// # Errors
    /// Returns an error if the backend cannot revoke the session.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError> {
        let url = self.endpoint(&["auth", "v1", "logout"])?;
        let response = self
            .request(Method::POST, url, Some(access_token.expose_secret()))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    /// Ask the backend to email a recovery link that lands on `redirect_to`.
    ///
    /// # Errors
    /// Returns the backend's error if the request is rejected.
    #[instrument(skip(self))]
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError> {
        let mut url = self.endpoint(&["auth", "v1", "recover"])?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);

        let response = self
            .request(Method::POST, url, None)
            .json(&json!({ "email": email }))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    /// # Errors
    /// Returns the backend's error if the password is rejected.
    #[instrument(skip_all)]
    pub async fn update_password(
        &self,
        access_token: &SecretString,
        password: &str,
    ) -> Result<User, BackendError> {
        let url = self.endpoint(&["auth", "v1", "user"])?;
        let response = self
            .request(Method::PUT, url, Some(access_token.expose_secret()))
            .json(&json!({ "password": password }))
            .send()
            .await?;
        read_json(response).await
    }

    /// # Errors
    /// Returns an error if the auth service is unreachable or unhealthy.
    pub async fn auth_health(&self) -> Result<(), BackendError> {
        let url = self.endpoint(&["auth", "v1", "health"])?;
        let response = self.request(Method::GET, url, None).send().await?;
        expect_success(response).await?;
        Ok(())
    }
}
