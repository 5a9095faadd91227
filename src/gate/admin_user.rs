//! Lazy admin-user record creation and the `is_admin` lookup.
//!
//! Flow Overview:
//! 1) Read `admin_users` for the user id.
//! 2) Insert a row when none exists.
//!
//! This is read-then-insert with no transaction. Two callers can both see "no
//! row" and both insert; a uniqueness violation on the second insert means the
//! other caller won, and is reported as `EnsureOutcome::Raced`.

use crate::backend::{auth::User, rest::Query, BackendClient, BackendError};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, instrument};

pub const ADMIN_USERS_TABLE: &str = "admin_users";
pub const IS_ADMIN_FUNCTION: &str = "is_admin";
const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Existing,
    Inserted,
    Raced,
}

/// Make sure an `admin_users` row exists for `user`.
///
/// # Errors
/// Returns the backend's error for anything but a uniqueness violation on insert.
#[instrument(skip(backend, access_token), fields(user_id = %user.id))]
pub async fn ensure_admin_user(
    backend: &BackendClient,
    user: &User,
    access_token: &SecretString,
) -> Result<EnsureOutcome, BackendError> {
    let bearer = Some(access_token.expose_secret());
    let user_id = user.id.to_string();

    let rows = backend
        .select(
            ADMIN_USERS_TABLE,
            &Query::new().eq("user_id", &user_id).limit(1),
            bearer,
        )
        .await?;

    if !rows.is_empty() {
        return Ok(EnsureOutcome::Existing);
    }

    let row = json!({
        "user_id": user_id,
        "email": user.email,
        "role": ADMIN_ROLE,
    });

    match backend.insert(ADMIN_USERS_TABLE, &row, bearer).await {
        Ok(_) => Ok(EnsureOutcome::Inserted),
        Err(err) if err.is_unique_violation() => {
            debug!("admin user inserted concurrently: {err}");
            Ok(EnsureOutcome::Raced)
        }
        Err(err) => Err(err),
    }
}

/// Ask the backend whether the token's user holds the admin role.
///
/// # Errors
/// Returns the backend's error or a transport failure.
pub async fn is_admin(
    backend: &BackendClient,
    access_token: &SecretString,
) -> Result<bool, BackendError> {
    backend
        .rpc(IS_ADMIN_FUNCTION, &json!({}), Some(access_token.expose_secret()))
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::test_support::client;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user() -> User {
        User {
            id: Uuid::parse_str("0b8a4f0e-7c4f-4d27-9d61-5a8c0c8f2a11").unwrap(),
            email: Some("admin@gmail.com".to_string()),
        }
    }

    async fn mount_empty_lookup(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/admin_users"))
            .and(query_param("user_id", format!("eq.{}", user().id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn existing_row_skips_insert() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/admin_users"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"user_id": user().id}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/admin_users"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = ensure_admin_user(
            &client(&server.uri()),
            &user(),
            &SecretString::from("token"),
        )
        .await
        .unwrap();
        assert_eq!(outcome, EnsureOutcome::Existing);
    }

    #[tokio::test]
    async fn missing_row_is_inserted() {
        let server = MockServer::start().await;
        mount_empty_lookup(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/admin_users"))
            .and(body_partial_json(json!({"email": "admin@gmail.com", "role": "admin"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = ensure_admin_user(
            &client(&server.uri()),
            &user(),
            &SecretString::from("token"),
        )
        .await
        .unwrap();
        assert_eq!(outcome, EnsureOutcome::Inserted);
    }

    #[tokio::test]
    async fn concurrent_ensure_tolerates_unique_violation() {
        let server = MockServer::start().await;
        mount_empty_lookup(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/admin_users"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 1}])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/admin_users"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint"
            })))
            .mount(&server)
            .await;

        let backend = client(&server.uri());
        let token = SecretString::from("token");
        let account = user();
        let (first, second) = tokio::join!(
            ensure_admin_user(&backend, &account, &token),
            ensure_admin_user(&backend, &account, &token)
        );

        let mut outcomes = vec![first.unwrap(), second.unwrap()];
        outcomes.sort_by_key(|outcome| *outcome as u8);
        assert_eq!(outcomes, vec![EnsureOutcome::Inserted, EnsureOutcome::Raced]);
    }

    #[tokio::test]
    async fn other_insert_errors_propagate() {
        let server = MockServer::start().await;
        mount_empty_lookup(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/admin_users"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "code": "42501",
                "message": "new row violates row-level security policy"
            })))
            .mount(&server)
            .await;

        let err = ensure_admin_user(
            &client(&server.uri()),
            &user(),
            &SecretString::from("token"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "new row violates row-level security policy");
    }

    #[tokio::test]
    async fn is_admin_calls_rpc() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/is_admin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(false)))
            .mount(&server)
            .await;

        let admin = is_admin(&client(&server.uri()), &SecretString::from("token"))
            .await
            .unwrap();
        assert!(!admin);
    }
}
