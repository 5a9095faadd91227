use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_BACKEND_KEY: &str = "backend-key";
pub const ARG_BACKEND_TIMEOUT_SECONDS: &str = "backend-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
    pub key: SecretString,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse backend arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the URL or key is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            url: read_required(ARG_BACKEND_URL)?,
            key: SecretString::from(read_required(ARG_BACKEND_KEY)?),
            timeout_seconds: matches
                .get_one::<u64>(ARG_BACKEND_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(10),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .long(ARG_BACKEND_URL)
                .help("Base URL of the hosted backend project")
                .env("CAMPUS_BACKEND_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_BACKEND_KEY)
                .long(ARG_BACKEND_KEY)
                .help("Public (anon) API key of the backend project")
                .env("CAMPUS_BACKEND_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_BACKEND_TIMEOUT_SECONDS)
                .long(ARG_BACKEND_TIMEOUT_SECONDS)
                .help("Connect timeout for backend requests in seconds")
                .env("CAMPUS_BACKEND_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
}
