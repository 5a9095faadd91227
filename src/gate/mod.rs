//! Admin authorization gate.
//!
//! Two stages run in order against a signed-in session:
//! 1) the email domain must be on the allow-list;
//! 2) the entered passkey must equal the configured one.
//!
//! The gate is a UI-level barrier only. Editor calls are forwarded with the
//! user's own token, so the backend's row-level policies stay authoritative.

pub mod admin_user;
pub mod domain;
pub mod passkey;

pub use domain::{AllowedDomains, DEFAULT_ALLOWED_DOMAINS};
pub use passkey::Passkey;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("no active session")]
    NoSession,
    #[error("unauthorized domain")]
    UnauthorizedDomain,
    #[error("invalid passkey")]
    InvalidPasskey,
    #[error("admin verification required")]
    NotVerified,
}

#[derive(Debug, Clone)]
pub struct AdminGate {
    domains: AllowedDomains,
    passkey: Passkey,
}

impl AdminGate {
    #[must_use]
    pub fn new(domains: AllowedDomains, passkey: Passkey) -> Self {
        Self { domains, passkey }
    }

    /// Run the domain check, then the passkey check.
    ///
    /// # Errors
    /// `GateError::UnauthorizedDomain` or `GateError::InvalidPasskey`.
    pub fn verify_passkey(&self, email: &str, entered: &str) -> Result<(), GateError> {
        if !self.domains.is_domain_allowed(email) {
            return Err(GateError::UnauthorizedDomain);
        }

        if !self.passkey.matches(entered) {
            return Err(GateError::InvalidPasskey);
        }

        Ok(())
    }
}
