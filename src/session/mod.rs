//! Server-side session context.
//!
//! Each local session token maps to the backend session it was issued for and
//! the admin "verified" flag. Authorization is always re-derived from both:
//! no entry means `Anonymous`, an entry without the flag is
//! `SignedInUnverified`, an entry with it is `SignedInVerified`.
//!
//! An expired access token is renewed with the session's refresh token on the
//! next lookup; the verified flag survives the renewal. Entries leave the
//! registry on sign-out, when the backend rejects the refresh token or the
//! session token, or when they sit expired past the idle limit. Every
//! transition is published as a `SessionEvent`.

use crate::backend::{
    auth::{now_unix_seconds, Session},
    BackendClient, BackendError,
};
use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
    time::interval,
};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How long an expired entry may wait for a request to refresh it before the
/// sweeper drops it.
pub const SESSION_IDLE_LIMIT_SECS: i64 = 24 * 60 * 60;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    SignedInUnverified,
    SignedInVerified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Uuid),
    Verified(Uuid),
    Refreshed(Uuid),
    SignedOut(Uuid),
    Expired(Uuid),
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session: Session,
    pub verified: bool,
}

impl SessionContext {
    #[must_use]
    pub fn state(&self) -> AuthState {
        if self.verified {
            AuthState::SignedInVerified
        } else {
            AuthState::SignedInUnverified
        }
    }
}

/// Outcome of a sign-out. Local state is gone in both cases.
#[derive(Debug)]
pub enum SignOut {
    Completed,
    RemoteFailed(BackendError),
}

/// Generate a random session token for the session cookie.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[derive(Debug)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<String, SessionContext>>,
    events: broadcast::Sender<SessionEvent>,
    refresher: Option<BackendClient>,
    // One refresh at a time: refresh tokens are single use.
    refresh_lock: Mutex<()>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
            refresher: None,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Renew expired access tokens through `backend` instead of dropping the
    /// session.
    #[must_use]
    pub fn with_refresh(mut self, backend: BackendClient) -> Self {
        self.refresher = Some(backend);
        self
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Register a fresh backend session and return the local token for it.
    ///
    /// # Errors
    /// Returns an error if no token can be generated.
    pub async fn sign_in(&self, session: Session) -> Result<String> {
        let token = generate_session_token()?;
        let user_id = session.user.id;
        self.entries.write().await.insert(
            token.clone(),
            SessionContext {
                session,
                verified: false,
            },
        );
        self.publish(SessionEvent::SignedIn(user_id));
        Ok(token)
    }

    /// Resolve a token to its live context. An expired backend session is
    /// refreshed when a refresher is configured and dropped otherwise.
    pub async fn lookup(&self, token: &str) -> Option<SessionContext> {
        let context = self.entries.read().await.get(token).cloned()?;
        if !context.session.is_expired_at(now_unix_seconds()) {
            return Some(context);
        }

        match &self.refresher {
            Some(backend) => self.refresh(token, backend).await,
            None => {
                self.expire(token).await;
                None
            }
        }
    }

    async fn refresh(&self, token: &str, backend: &BackendClient) -> Option<SessionContext> {
        let _guard = self.refresh_lock.lock().await;

        // A request queued on the lock may find the entry already renewed.
        let context = self.entries.read().await.get(token).cloned()?;
        if !context.session.is_expired_at(now_unix_seconds()) {
            return Some(context);
        }

        match backend.refresh_session(&context.session.refresh_token).await {
            Ok(session) => {
                let user_id = session.user.id;
                let refreshed = {
                    let mut entries = self.entries.write().await;
                    // Signed out while the refresh was in flight.
                    let entry = entries.get_mut(token)?;
                    entry.session = session;
                    entry.clone()
                };
                self.publish(SessionEvent::Refreshed(user_id));
                Some(refreshed)
            }
            Err(err @ BackendError::Api { .. }) => {
                info!("Session refresh rejected: {err}");
                self.expire(token).await;
                None
            }
            Err(err) => {
                // Kept for a later attempt; the caller is anonymous until then.
                warn!("Session refresh failed: {err}");
                None
            }
        }
    }

    pub async fn state(&self, token: Option<&str>) -> AuthState {
        match token {
            Some(token) => self
                .lookup(token)
                .await
                .map_or(AuthState::Anonymous, |context| context.state()),
            None => AuthState::Anonymous,
        }
    }

    /// Set the verified flag. Returns `false` when the session is gone.
    pub async fn mark_verified(&self, token: &str) -> bool {
        let user_id = {
            let mut entries = self.entries.write().await;
            match entries.get_mut(token) {
                Some(context) => {
                    context.verified = true;
                    context.session.user.id
                }
                None => return false,
            }
        };
        self.publish(SessionEvent::Verified(user_id));
        true
    }

    /// Drop a session because the backend no longer honours it.
    pub async fn expire(&self, token: &str) {
        let removed = self.entries.write().await.remove(token);
        if let Some(context) = removed {
            self.publish(SessionEvent::Expired(context.session.user.id));
        }
    }

    /// Clear local state first, then revoke the backend session. The remote
    /// result never restores local state.
    pub async fn sign_out(&self, token: &str, backend: &BackendClient) -> SignOut {
        let Some(context) = self.entries.write().await.remove(token) else {
            return SignOut::Completed;
        };
        self.publish(SessionEvent::SignedOut(context.session.user.id));

        match backend.sign_out(&context.session.access_token).await {
            Ok(()) => SignOut::Completed,
            Err(err) => {
                warn!("Remote sign-out failed: {err}");
                SignOut::RemoteFailed(err)
            }
        }
    }

    /// Drop every entry whose backend session expired before `now_unix`, or,
    /// when sessions are refreshed on lookup, expired longer than
    /// `SESSION_IDLE_LIMIT_SECS` ago.
    pub async fn sweep_expired(&self, now_unix: i64) -> usize {
        let cutoff = if self.refresher.is_some() {
            now_unix - SESSION_IDLE_LIMIT_SECS
        } else {
            now_unix
        };
        let expired: Vec<Uuid> = {
            let mut entries = self.entries.write().await;
            let mut expired = Vec::new();
            entries.retain(|_, context| {
                if context.session.is_expired_at(cutoff) {
                    expired.push(context.session.user.id);
                    false
                } else {
                    true
                }
            });
            expired
        };

        for user_id in &expired {
            self.publish(SessionEvent::Expired(*user_id));
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Periodically drop sessions whose backend expiry has passed.
pub fn spawn_sweeper(registry: Arc<SessionRegistry>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            let dropped = registry.sweep_expired(now_unix_seconds()).await;
            if dropped > 0 {
                debug!("Dropped {} expired sessions", dropped);
            }
        }
    })
}

/// Log session transitions.
pub fn spawn_event_logger(mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::SignedIn(user_id)) => info!(%user_id, "session signed in"),
                Ok(SessionEvent::Verified(user_id)) => info!(%user_id, "session verified for admin"),
                Ok(SessionEvent::Refreshed(user_id)) => debug!(%user_id, "session refreshed"),
                Ok(SessionEvent::SignedOut(user_id)) => info!(%user_id, "session signed out"),
                Ok(SessionEvent::Expired(user_id)) => info!(%user_id, "session expired"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Session event logger skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::{auth::User, test_support::client};
    use secrecy::{ExposeSecret, SecretString};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(expires_at: i64) -> Session {
        Session {
            access_token: SecretString::from("user-token"),
            refresh_token: SecretString::from("refresh"),
            expires_at,
            user: User {
                id: Uuid::new_v4(),
                email: Some("admin@gmail.com".to_string()),
            },
        }
    }

    fn live_session() -> Session {
        session(now_unix_seconds() + 3600)
    }

    #[test]
    fn session_tokens_are_random_and_url_safe() {
        let first = generate_session_token().unwrap();
        let second = generate_session_token().unwrap();
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn state_machine_transitions() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.state(None).await, AuthState::Anonymous);

        let token = registry.sign_in(live_session()).await.unwrap();
        assert_eq!(
            registry.state(Some(&token)).await,
            AuthState::SignedInUnverified
        );

        assert!(registry.mark_verified(&token).await);
        assert_eq!(
            registry.state(Some(&token)).await,
            AuthState::SignedInVerified
        );

        registry.expire(&token).await;
        assert_eq!(registry.state(Some(&token)).await, AuthState::Anonymous);
        assert!(!registry.mark_verified(&token).await);
    }

    #[tokio::test]
    async fn unknown_token_is_anonymous() {
        let registry = SessionRegistry::new();
        registry.sign_in(live_session()).await.unwrap();
        assert_eq!(
            registry.state(Some("not-a-token")).await,
            AuthState::Anonymous
        );
    }

    #[tokio::test]
    async fn expired_backend_session_is_dropped_on_lookup() {
        let registry = SessionRegistry::new();
        let mut events = registry.subscribe();
        let token = registry.sign_in(session(now_unix_seconds() - 1)).await.unwrap();
        assert!(registry.mark_verified(&token).await);

        assert!(registry.lookup(&token).await.is_none());
        assert!(registry.is_empty().await);

        assert!(matches!(events.recv().await, Ok(SessionEvent::SignedIn(_))));
        assert!(matches!(events.recv().await, Ok(SessionEvent::Verified(_))));
        assert!(matches!(events.recv().await, Ok(SessionEvent::Expired(_))));
    }

    fn refreshed_token_body() -> serde_json::Value {
        json!({
            "access_token": "fresh-token",
            "refresh_token": "refresh-2",
            "expires_in": 3600,
            "user": {"id": Uuid::new_v4(), "email": "admin@gmail.com"}
        })
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_and_stays_verified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({"refresh_token": "refresh"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(refreshed_token_body()))
            .expect(1)
            .mount(&server)
            .await;

        let registry = SessionRegistry::new().with_refresh(client(&server.uri()));
        let mut events = registry.subscribe();
        let token = registry.sign_in(session(now_unix_seconds() - 1)).await.unwrap();
        assert!(registry.mark_verified(&token).await);

        let context = registry.lookup(&token).await.unwrap();
        assert!(context.verified);
        assert_eq!(context.session.access_token.expose_secret(), "fresh-token");
        assert_eq!(context.session.refresh_token.expose_secret(), "refresh-2");
        assert_eq!(
            registry.state(Some(&token)).await,
            AuthState::SignedInVerified
        );

        assert!(matches!(events.recv().await, Ok(SessionEvent::SignedIn(_))));
        assert!(matches!(events.recv().await, Ok(SessionEvent::Verified(_))));
        assert!(matches!(events.recv().await, Ok(SessionEvent::Refreshed(_))));
    }

    #[tokio::test]
    async fn rejected_refresh_expires_the_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token: Already Used"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let registry = SessionRegistry::new().with_refresh(client(&server.uri()));
        let token = registry.sign_in(session(now_unix_seconds() - 1)).await.unwrap();
        assert!(registry.mark_verified(&token).await);

        assert!(registry.lookup(&token).await.is_none());
        assert!(registry.is_empty().await);
        assert_eq!(registry.state(Some(&token)).await, AuthState::Anonymous);
    }

    #[tokio::test]
    async fn unreachable_backend_keeps_the_session_for_a_later_refresh() {
        let registry = SessionRegistry::new().with_refresh(client("http://127.0.0.1:9"));
        let token = registry.sign_in(session(now_unix_seconds() - 1)).await.unwrap();

        assert!(registry.lookup(&token).await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn sweep_waits_for_the_idle_limit_when_refreshing() {
        let registry = SessionRegistry::new().with_refresh(client("http://127.0.0.1:9"));
        let now = now_unix_seconds();
        registry.sign_in(session(now - 10)).await.unwrap();
        registry
            .sign_in(session(now - SESSION_IDLE_LIMIT_SECS - 10))
            .await
            .unwrap();

        assert_eq!(registry.sweep_expired(now).await, 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn sign_out_clears_flag_when_remote_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let registry = SessionRegistry::new();
        let token = registry.sign_in(live_session()).await.unwrap();
        registry.mark_verified(&token).await;

        let outcome = registry.sign_out(&token, &client(&server.uri())).await;
        assert!(matches!(outcome, SignOut::Completed));
        assert!(registry.lookup(&token).await.is_none());
    }

    #[tokio::test]
    async fn sign_out_clears_flag_when_remote_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"msg": "boom"})),
            )
            .mount(&server)
            .await;

        let registry = SessionRegistry::new();
        let token = registry.sign_in(live_session()).await.unwrap();
        registry.mark_verified(&token).await;

        let outcome = registry.sign_out(&token, &client(&server.uri())).await;
        assert!(matches!(outcome, SignOut::RemoteFailed(_)));
        assert!(registry.lookup(&token).await.is_none());
        assert_eq!(registry.state(Some(&token)).await, AuthState::Anonymous);

        // Signing out twice is harmless.
        let again = registry.sign_out(&token, &client(&server.uri())).await;
        assert!(matches!(again, SignOut::Completed));
    }

    #[tokio::test]
    async fn sweep_only_drops_expired() {
        let registry = SessionRegistry::new();
        let now = now_unix_seconds();
        registry.sign_in(session(now - 10)).await.unwrap();
        let live = registry.sign_in(session(now + 600)).await.unwrap();

        assert_eq!(registry.sweep_expired(now).await, 1);
        assert_eq!(registry.len().await, 1);
        assert!(registry.lookup(&live).await.is_some());
    }
}
