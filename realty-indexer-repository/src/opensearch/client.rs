//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{BatchItemResult, BatchSummary};
use realty_indexer_shared::FailureKind;

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// let client = OpenSearchClient::new("http://localhost:9200").await?;
/// let summary = client
///     .bulk_upsert("properties", None, &[("P1".to_string(), json!({"listing_id": "P1"}))])
///     .await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch client");

        Ok(Self { client })
    }

    /// Map a transport-level failure. Timeouts may clear up on their own.
    fn send_error(err: opensearch::Error) -> SearchIndexError {
        if err.is_timeout() {
            SearchIndexError::transient(err.to_string())
        } else {
            SearchIndexError::connection(err.to_string())
        }
    }

    /// Map a non-success HTTP status on a whole request.
    async fn status_error(response: Response, context: &str) -> SearchIndexError {
        let status = response.status_code().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!(status, body = %body, context, "OpenSearch request failed");

        let message = format!("{} failed with status {}: {}", context, status, body);
        match status {
            401 | 403 => SearchIndexError::authentication(message),
            429 | 500..=599 => SearchIndexError::transient(message),
            _ => SearchIndexError::bulk_operation(message),
        }
    }

    /// Build the newline-delimited bulk body: one `index` action per document.
    fn bulk_body(index: &str, documents: &[(String, Value)]) -> Vec<JsonBody<Value>> {
        let mut body = Vec::with_capacity(documents.len() * 2);
        for (id, source) in documents {
            body.push(json!({ "index": { "_index": index, "_id": id } }).into());
            body.push(source.clone().into());
        }
        body
    }

    /// Turn a bulk response into one result per submitted document.
    ///
    /// Items come back in request order. Throttled (429) and server-side (5xx)
    /// item failures are transient; anything else is a rejection.
    fn parse_bulk_response(
        documents: &[(String, Value)],
        response: &Value,
    ) -> Result<BatchSummary, SearchIndexError> {
        let items = response["items"]
            .as_array()
            .ok_or_else(|| SearchIndexError::parse("bulk response has no items"))?;

        if items.len() != documents.len() {
            return Err(SearchIndexError::parse(format!(
                "bulk response has {} items for {} documents",
                items.len(),
                documents.len()
            )));
        }

        let results = documents
            .iter()
            .zip(items)
            .map(|((id, _), item)| {
                let action = item
                    .get("index")
                    .or_else(|| item.get("create"))
                    .or_else(|| item.get("update"))
                    .unwrap_or(&Value::Null);
                let status = action["status"].as_u64().unwrap_or(0);

                if let Some(err) = action.get("error").filter(|e| !e.is_null()) {
                    let kind = if status == 429 || status >= 500 {
                        FailureKind::Transient
                    } else {
                        FailureKind::Rejected
                    };
                    let reason = match (err["type"].as_str(), err["reason"].as_str()) {
                        (Some(t), Some(r)) => format!("{}: {}", t, r),
                        _ => err.to_string(),
                    };
                    return BatchItemResult::failed(id.clone(), kind, reason);
                }

                match action["result"].as_str() {
                    Some("created") => BatchItemResult::created(id.clone()),
                    Some(_) => BatchItemResult::updated(id.clone()),
                    None if status == 201 => BatchItemResult::created(id.clone()),
                    None if (200..300).contains(&status) => BatchItemResult::updated(id.clone()),
                    None => BatchItemResult::failed(
                        id.clone(),
                        FailureKind::Rejected,
                        format!("unexpected item status {}", status),
                    ),
                }
            })
            .collect();

        Ok(BatchSummary::new(results))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(Self::send_error)?;

        if !response.status_code().is_success() {
            return Err(Self::status_error(response, "Cluster health").await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let status = body["status"].as_str().unwrap_or("red");
        debug!(status, "Cluster health");

        Ok(status != "red")
    }

    #[instrument(skip(self, settings))]
    async fn ensure_index(&self, index: &str, settings: &Value) -> Result<(), SearchIndexError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(Self::send_error)?;

        match exists.status_code().as_u16() {
            200 => return Ok(()),
            404 => {}
            401 | 403 => return Err(Self::status_error(exists, "Index exists").await),
            _ => {
                let status = exists.status_code().as_u16();
                return Err(SearchIndexError::index_creation(format!(
                    "unexpected status {} checking index {}",
                    status, index
                )));
            }
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(settings.clone())
            .send()
            .await
            .map_err(Self::send_error)?;

        let status = response.status_code().as_u16();
        if response.status_code().is_success() {
            info!(index, "Created index");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        // Another writer may have created it in between.
        if status == 400 && body.contains("resource_already_exists_exception") {
            return Ok(());
        }
        if status == 401 || status == 403 {
            return Err(SearchIndexError::authentication(body));
        }
        Err(SearchIndexError::index_creation(format!(
            "creating {} failed with status {}: {}",
            index, status, body
        )))
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn bulk_upsert(
        &self,
        index: &str,
        pipeline: Option<&str>,
        documents: &[(String, Value)],
    ) -> Result<BatchSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchSummary::default());
        }

        let mut request = self
            .client
            .bulk(BulkParts::Index(index))
            .body(Self::bulk_body(index, documents));
        if let Some(pipeline) = pipeline {
            request = request.pipeline(pipeline);
        }

        let response = request.send().await.map_err(Self::send_error)?;
        if !response.status_code().is_success() {
            return Err(Self::status_error(response, "Bulk request").await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = Self::parse_bulk_response(documents, &body)?;
        if summary.succeeded() < summary.total() {
            warn!(
                failed = summary.total() - summary.succeeded(),
                total = summary.total(),
                "Bulk request had item failures"
            );
        }
        Ok(summary)
    }
}
