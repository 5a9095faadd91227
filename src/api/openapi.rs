use super::handlers::{
    admin, auth, content, editor, health, settings, storage, ContentRow, ErrorBody,
};
use crate::{
    content::{ContentKind, Source},
    session::AuthState,
    settings::SystemSettings,
};
use utoipa::openapi::{Contact, License};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        content::get_content,
        auth::signup,
        auth::login,
        auth::logout,
        auth::session,
        auth::password_reset,
        auth::password_update,
        admin::verify,
        editor::list,
        editor::create,
        editor::upsert,
        editor::update,
        editor::delete,
        storage::upload,
        storage::remove,
        settings::get_settings,
        settings::put_settings,
    ),
    components(schemas(
        ErrorBody,
        ContentRow,
        ContentKind,
        Source,
        AuthState,
        SystemSettings,
        health::Health,
        content::ContentResponse,
        auth::CredentialsRequest,
        auth::PasswordResetRequest,
        auth::PasswordUpdateRequest,
        auth::SessionResponse,
        auth::SignUpResponse,
        admin::VerifyRequest,
        admin::VerifyResponse,
        storage::UploadResponse,
    )),
    tags(
        (name = "health", description = "Service and backend status"),
        (name = "content", description = "Public website content with fallbacks"),
        (name = "auth", description = "Accounts and sessions"),
        (name = "admin", description = "Admin passkey gate"),
        (name = "editor", description = "CMS editors and file storage"),
        (name = "settings", description = "System settings")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    // Use Cargo.toml metadata instead of the utoipa crate info defaults.
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = cargo_license();

    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    let Some(start) = author.find('<') else {
        let name = author.trim();
        return ((!name.is_empty()).then_some(name), None);
    };

    let name = author[..start].trim();
    let email = author[start + 1..].trim_end_matches('>').trim();
    (
        (!name.is_empty()).then_some(name),
        (!email.is_empty()).then_some(email),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Campus Team"));
            assert_eq!(contact.email.as_deref(), Some("team@campus.school"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "content"));
        assert!(tags.iter().any(|tag| tag.name == "editor"));
        for path in [
            "/health",
            "/v1/content/{kind}",
            "/v1/admin/verify",
            "/v1/admin/content/{kind}/{id}",
            "/v1/admin/storage/{bucket}/{path}",
        ] {
            assert!(spec.paths.paths.contains_key(path), "{path}");
        }
    }

    #[test]
    fn author_without_email() {
        assert_eq!(parse_author("Campus Team"), (Some("Campus Team"), None));
        assert_eq!(
            parse_author("Campus Team <team@campus.school>"),
            (Some("Campus Team"), Some("team@campus.school"))
        );
    }
}
