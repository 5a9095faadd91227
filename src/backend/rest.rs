//! Row access through the backend's generated REST API (`/rest/v1`).

use super::{expect_success, read_json, BackendClient, BackendError};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info_span, Instrument};
use url::Url;

const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=representation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Row selection: equality filters, one ordering column and an optional limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    filters: Vec<(String, String)>,
    order: Option<(String, Order)>,
    limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.filters.push((column.to_string(), format!("eq.{value}")));
        self
    }

    #[must_use]
    pub fn order(mut self, column: &str, order: Order) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn apply(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("select", "*");
        for (column, filter) in &self.filters {
            pairs.append_pair(column, filter);
        }
        if let Some((column, order)) = &self.order {
            pairs.append_pair("order", &format!("{column}.{}", order.as_str()));
        }
        if let Some(limit) = self.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
    }
}

fn db_span(operation: &'static str, table: &str) -> tracing::Span {
    info_span!(
        "backend.rest",
        db.system = "postgresql",
        db.operation = operation,
        db.table = table
    )
}

impl BackendClient {
    fn table_url(&self, table: &str) -> Result<Url, BackendError> {
        self.endpoint(&["rest", "v1", table])
    }

    /// # Errors
    /// Returns the backend's error or a transport failure.
    pub async fn select(
        &self,
        table: &str,
        query: &Query,
        bearer: Option<&str>,
    ) -> Result<Vec<Value>, BackendError> {
        let mut url = self.table_url(table)?;
        query.apply(&mut url);

        async {
            let response = self.request(Method::GET, url, bearer).send().await?;
            read_json::<Vec<Value>>(response).await
        }
        .instrument(db_span("SELECT", table))
        .await
    }

    /// # Errors
    /// Returns the backend's error (e.g. a uniqueness violation) or a transport failure.
    pub async fn insert(
        &self,
        table: &str,
        row: &Value,
        bearer: Option<&str>,
    ) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table)?;

        async {
            let response = self
                .request(Method::POST, url, bearer)
                .header("Prefer", PREFER_REPRESENTATION)
                .json(row)
                .send()
                .await?;
            read_json::<Vec<Value>>(response).await
        }
        .instrument(db_span("INSERT", table))
        .await
    }

    /// Insert, or merge into the row with the same primary key.
    ///
    /// # Errors
    /// Returns the backend's error or a transport failure.
    pub async fn upsert(
        &self,
        table: &str,
        row: &Value,
        bearer: Option<&str>,
    ) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table)?;

        async {
            let response = self
                .request(Method::POST, url, bearer)
                .header("Prefer", PREFER_UPSERT)
                .json(row)
                .send()
                .await?;
            read_json::<Vec<Value>>(response).await
        }
        .instrument(db_span("UPSERT", table))
        .await
    }

    /// # Errors
    /// Returns the backend's error or a transport failure.
    pub async fn update(
        &self,
        table: &str,
        id: &str,
        patch: &Value,
        bearer: Option<&str>,
    ) -> Result<Vec<Value>, BackendError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));

        async {
            let response = self
                .request(Method::PATCH, url, bearer)
                .header("Prefer", PREFER_REPRESENTATION)
                .json(patch)
                .send()
                .await?;
            read_json::<Vec<Value>>(response).await
        }
        .instrument(db_span("UPDATE", table))
        .await
    }

    /// # Errors
    /// Returns the backend's error or a transport failure.
    pub async fn delete(
        &self,
        table: &str,
        id: &str,
        bearer: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));

        async {
            let response = self.request(Method::DELETE, url, bearer).send().await?;
            expect_success(response).await?;
            Ok::<(), BackendError>(())
        }
        .instrument(db_span("DELETE", table))
        .await
    }

    /// Call a database function exposed under `/rest/v1/rpc`.
    ///
    /// # Errors
    /// Returns the backend's error, a transport failure, or an unexpected body.
    pub async fn rpc<T: DeserializeOwned>(
        &self,
        function: &str,
        args: &Value,
        bearer: Option<&str>,
    ) -> Result<T, BackendError> {
        let url = self.endpoint(&["rest", "v1", "rpc", function])?;

        async {
            let response = self
                .request(Method::POST, url, bearer)
                .json(args)
                .send()
                .await?;
            read_json::<T>(response).await
        }
        .instrument(info_span!("backend.rpc", rpc.function = function))
        .await
    }
}
