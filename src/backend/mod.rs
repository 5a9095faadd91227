//! Client for the hosted backend (auth, rows, RPC and object storage).
//!
//! Every call is a single HTTP request: no retries, no caching. Requests carry
//! the public API key in `apikey` and a bearer token, which is either the
//! public key itself (anonymous reads) or a user's access token so the
//! backend's row-level policies apply to that user.

pub mod auth;
pub mod rest;
pub mod storage;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION_CODE: &str = "23505";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    /// The backend answered with a non-success status; `message` is the
    /// backend's own text and is surfaced to users as-is.
    #[error("{message}")]
    Api {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Api { status, code, .. } => {
                *status == StatusCode::CONFLICT || code.as_deref() == Some(UNIQUE_VIOLATION_CODE)
            }
            _ => false,
        }
    }

    /// The backend rejected the bearer token (expired or revoked session).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"***")
            .finish()
    }
}

impl BackendClient {
    /// Build a client for the backend at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL is not http(s) or the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: SecretString, timeout: Duration) -> Result<Self> {
        let parsed =
            Url::parse(base_url).with_context(|| format!("Invalid backend URL: {base_url}"))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(anyhow!("Unsupported backend URL scheme: {scheme}")),
        }

        if parsed.host_str().is_none() {
            return Err(anyhow!("Backend URL must include a host: {base_url}"));
        }

        if api_key.expose_secret().is_empty() {
            return Err(anyhow!("Backend API key must not be empty"));
        }

        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .connect_timeout(timeout)
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            client,
            base_url: parsed,
            api_key,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from path segments; segments are percent-encoded.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidResponse("backend URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a request with the API key and the given bearer token (or the
    /// public key when `bearer` is `None`).
    pub(crate) fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let key = self.api_key.expose_secret();
        self.client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(bearer.unwrap_or(key))
    }
}

/// Pass successful responses through, turn anything else into `BackendError::Api`.
pub(crate) async fn expect_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    let message = error_message(&body)
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    Err(BackendError::Api {
        status,
        code: error_code(&body),
        message,
    })
}

/// Read a JSON body from a successful response.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, BackendError> {
    let response = expect_success(response).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|err| BackendError::InvalidResponse(err.to_string()))
}

fn error_message(body: &Value) -> Option<String> {
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(ToString::to_string)
}

fn error_code(body: &Value) -> Option<String> {
    ["code", "error_code"].iter().find_map(|key| match body.get(*key) {
        Some(Value::String(code)) => Some(code.clone()),
        Some(Value::Number(code)) => Some(code.to_string()),
        _ => None,
    })
}
