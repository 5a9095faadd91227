//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{admin, backend, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or blank.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let backend_opts = backend::Options::parse(matches)?;
    let admin_opts = admin::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        backend_url: backend_opts.url,
        backend_key: backend_opts.key,
        backend_timeout_seconds: backend_opts.timeout_seconds,
        admin_passkey: admin_opts.passkey,
        allowed_email_domains: admin_opts.allowed_email_domains,
        frontend_base_url: admin_opts.frontend_base_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("CAMPUS_BACKEND_URL", Some("https://project.backend.test")),
                ("CAMPUS_BACKEND_KEY", Some("anon-key")),
                ("CAMPUS_ADMIN_PASSKEY", Some("143143")),
                ("CAMPUS_ALLOWED_EMAIL_DOMAINS", Some("school.edu,gmail.com")),
                ("CAMPUS_PORT", None),
            ],
            || {
                let matches = commands::new().get_matches_from(vec!["campus"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(Action::Server(args)) = action {
                    assert_eq!(args.port, 8080);
                    assert_eq!(args.backend_url, "https://project.backend.test");
                    assert_eq!(args.allowed_email_domains, "school.edu,gmail.com");
                    assert_eq!(args.backend_timeout_seconds, 10);
                }
            },
        );
    }

    #[test]
    fn blank_backend_key_is_rejected() {
        temp_env::with_vars(
            [
                ("CAMPUS_BACKEND_URL", Some("https://project.backend.test")),
                ("CAMPUS_BACKEND_KEY", Some("  ")),
                ("CAMPUS_ADMIN_PASSKEY", Some("143143")),
            ],
            || {
                let matches = commands::new().get_matches_from(vec!["campus"]);
                let err = handler(&matches).err().map(|e| e.to_string());
                assert_eq!(
                    err.as_deref(),
                    Some("missing required argument: --backend-key")
                );
            },
        );
    }

    #[test]
    fn debug_output_redacts_secrets() {
        temp_env::with_vars(
            [
                ("CAMPUS_BACKEND_URL", Some("https://project.backend.test")),
                ("CAMPUS_BACKEND_KEY", Some("anon-key-value")),
                ("CAMPUS_ADMIN_PASSKEY", Some("143143")),
            ],
            || {
                let matches = commands::new().get_matches_from(vec!["campus"]);
                let debug = handler(&matches).map(|action| format!("{action:?}"));
                assert!(debug.is_ok());
                if let Ok(debug) = debug {
                    assert!(!debug.contains("anon-key-value"));
                    assert!(!debug.contains("143143"));
                }
            },
        );
    }
}
