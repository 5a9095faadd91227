use crate::gate::DEFAULT_ALLOWED_DOMAINS;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_ADMIN_PASSKEY: &str = "admin-passkey";
pub const ARG_ALLOWED_EMAIL_DOMAINS: &str = "allowed-email-domains";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Options {
    pub passkey: SecretString,
    pub allowed_email_domains: String,
    pub frontend_base_url: String,
}

impl Options {
    /// Parse admin gate arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the passkey is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // Compared byte-for-byte, so never trimmed.
        let passkey = matches
            .get_one::<String>(ARG_ADMIN_PASSKEY)
            .cloned()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_ADMIN_PASSKEY}"))?;

        let get_or = |id: &str, default: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            passkey: SecretString::from(passkey),
            allowed_email_domains: get_or(ARG_ALLOWED_EMAIL_DOMAINS, DEFAULT_ALLOWED_DOMAINS),
            frontend_base_url: get_or(ARG_FRONTEND_BASE_URL, DEFAULT_FRONTEND_BASE_URL),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_PASSKEY)
                .long(ARG_ADMIN_PASSKEY)
                .help("Shared passkey required to unlock the CMS editors")
                .env("CAMPUS_ADMIN_PASSKEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ALLOWED_EMAIL_DOMAINS)
                .long(ARG_ALLOWED_EMAIL_DOMAINS)
                .help("Comma separated email domains allowed to enter the passkey")
                .env("CAMPUS_ALLOWED_EMAIL_DOMAINS")
                .default_value(DEFAULT_ALLOWED_DOMAINS),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL, used for CORS and password reset links")
                .env("CAMPUS_FRONTEND_BASE_URL")
                .default_value(DEFAULT_FRONTEND_BASE_URL),
        )
}
