use crate::{
    api::handlers::{admin, auth, content, editor, health, settings, storage},
    backend::BackendClient,
    content::ContentStore,
    gate::AdminGate,
    session::{spawn_event_logger, spawn_sweeper, SessionRegistry},
    settings::SharedSettings,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, patch, post, put},
    Extension, Router,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use handlers::auth::AuthConfig;
pub use openapi::openapi;


const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Everything the handlers share, injected as request extensions.
#[derive(Clone, Debug)]
pub struct ApiContext {
    backend: BackendClient,
    content: ContentStore,
    sessions: Arc<SessionRegistry>,
    gate: Arc<AdminGate>,
    settings: SharedSettings,
    auth_config: AuthConfig,
}

impl ApiContext {
    #[must_use]
    pub fn new(backend: BackendClient, gate: AdminGate, auth_config: AuthConfig) -> Self {
        Self {
            content: ContentStore::new(backend.clone()),
            sessions: Arc::new(SessionRegistry::new().with_refresh(backend.clone())),
            backend,
            gate: Arc::new(gate),
            settings: SharedSettings::default(),
            auth_config,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    #[must_use]
    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }
}

/// All routes, without state or middleware.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/v1/content/:kind", get(content::get_content))
        .route("/v1/auth/signup", post(auth::signup))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/v1/auth/session", get(auth::session))
        .route("/v1/auth/password", post(auth::password_update))
        .route("/v1/auth/password/reset", post(auth::password_reset))
        .route("/v1/admin/verify", post(admin::verify))
        .route(
            "/v1/admin/content/:kind",
            get(editor::list).post(editor::create).put(editor::upsert),
        )
        .route(
            "/v1/admin/content/:kind/:id",
            patch(editor::update).delete(editor::delete),
        )
        .route(
            "/v1/admin/storage/:bucket/*path",
            post(storage::upload)
                .delete(storage::remove)
                .layer(DefaultBodyLimit::max(storage::MAX_UPLOAD_BYTES)),
        )
        .route("/v1/settings", get(settings::get_settings))
        .route("/v1/admin/settings", put(settings::put_settings))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi()))
}

/// The router with request ids, tracing, CORS and the shared context.
///
/// # Errors
/// Returns an error if the frontend base URL cannot be turned into an origin.
pub fn app(context: &ApiContext) -> Result<Router> {
    let frontend_origin = frontend_origin(context.auth_config.frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    Ok(router().layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(Extension(context.backend.clone()))
            .layer(Extension(context.content.clone()))
            .layer(Extension(context.sessions.clone()))
            .layer(Extension(context.gate.clone()))
            .layer(Extension(context.settings.clone()))
            .layer(Extension(context.auth_config.clone())),
    ))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, context: ApiContext) -> Result<()> {
    let app = app(&context)?;

    spawn_event_logger(context.sessions.subscribe());
    spawn_sweeper(context.sessions.clone(), SESSION_SWEEP_INTERVAL);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
