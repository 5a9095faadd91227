use crate::{
    api::{self, ApiContext, AuthConfig},
    backend::BackendClient,
    cli::telemetry,
    gate::{AdminGate, AllowedDomains, Passkey},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend_url: String,
    pub backend_key: SecretString,
    pub backend_timeout_seconds: u64,
    pub admin_passkey: SecretString,
    pub allowed_email_domains: String,
    pub frontend_base_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the backend client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let backend = BackendClient::new(
        &args.backend_url,
        args.backend_key,
        Duration::from_secs(args.backend_timeout_seconds),
    )
    .context("Could not build the backend client")?;

    let domains = AllowedDomains::parse(&args.allowed_email_domains);
    if domains.is_empty() {
        warn!("Allowed email domain list is empty: no account can unlock the editors");
    }

    let gate = AdminGate::new(domains, Passkey::new(args.admin_passkey));
    let auth_config = AuthConfig::new(args.frontend_base_url);

    let result = api::new(args.port, ApiContext::new(backend, gate, auth_config)).await;

    telemetry::shutdown_tracer();

    result
}
