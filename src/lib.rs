//! # Campus (school website content and admin service)
//!
//! `campus` serves the content of a school website and fronts the CMS editors
//! used by the school staff. All data lives in a hosted backend-as-a-service
//! (managed Postgres, auth and object storage behind a generated REST API);
//! this crate is a typed client of that backend plus a small HTTP surface.
//!
//! ## Public content
//!
//! Each content kind (hero, about, gallery, announcements, ...) is read from its
//! own table. When the backend is unreachable or the table has no usable rows,
//! the response carries the default payload for that kind, so the site never
//! renders a broken section.
//!
//! ## Admin gate
//!
//! Editors require a signed-in session whose email domain is allow-listed and
//! which has entered the shared admin passkey. The gate is defense-in-depth
//! only: editor calls are forwarded with the user's own access token so the
//! backend's row-level policies remain authoritative.

pub mod api;
pub mod backend;
pub mod cli;
pub mod content;
pub mod gate;
pub mod session;
pub mod settings;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
