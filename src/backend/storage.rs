//! Object storage for uploaded images and learning materials (`/storage/v1`).

use super::{expect_success, BackendClient, BackendError};
use reqwest::{header::CONTENT_TYPE, Method};
use serde_json::json;
use tracing::instrument;
use url::Url;

fn object_segments<'a>(prefix: &[&'a str], bucket: &'a str, path: &'a str) -> Vec<&'a str> {
    prefix
        .iter()
        .copied()
        .chain(std::iter::once(bucket))
        .chain(path.split('/').filter(|segment| !segment.is_empty()))
        .collect()
}

impl BackendClient {
    /// Public URL of an object in a public bucket.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be built.
    pub fn public_url(&self, bucket: &str, path: &str) -> Result<Url, BackendError> {
        self.endpoint(&object_segments(
            &["storage", "v1", "object", "public"],
            bucket,
            path,
        ))
    }

    /// Upload (or overwrite) an object and return its public URL.
    ///
    /// # Errors
    /// Returns the backend's error or a transport failure.
    #[instrument(skip(self, bytes, bearer), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        bearer: Option<&str>,
    ) -> Result<Url, BackendError> {
        let url = self.endpoint(&object_segments(&["storage", "v1", "object"], bucket, path))?;
        let response = self
            .request(Method::POST, url, bearer)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        expect_success(response).await?;

        self.public_url(bucket, path)
    }

    /// # Errors
    /// Returns the backend's error or a transport failure.
    #[instrument(skip(self, bearer))]
    pub async fn remove(
        &self,
        bucket: &str,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&["storage", "v1", "object", bucket])?;
        let response = self
            .request(Method::DELETE, url, bearer)
            .json(&json!({ "prefixes": [path] }))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }
}
