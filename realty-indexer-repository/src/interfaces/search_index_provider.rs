//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::BatchSummary;

/// Abstracts the underlying search engine.
///
/// Implementations are injected into `SearchIndexWriter`, which lets tests
/// swap in a mock provider.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Check that the cluster is reachable and healthy enough to accept writes.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The cluster is green or yellow
    /// * `Ok(false)` - The cluster answered but is red
    /// * `Err(SearchIndexError)` - The cluster could not be reached
    async fn health_check(&self) -> Result<bool, SearchIndexError>;

    /// Create `index` with `settings` unless it already exists.
    async fn ensure_index(&self, index: &str, settings: &Value) -> Result<(), SearchIndexError>;

    /// Upsert documents into `index` in a single bulk request.
    ///
    /// # Arguments
    ///
    /// * `index` - Target index name
    /// * `pipeline` - Optional ingest pipeline run on every document
    /// * `documents` - `(document id, JSON source)` pairs
    ///
    /// # Returns
    ///
    /// * `Ok(BatchSummary)` - One result per document, in input order
    /// * `Err(SearchIndexError)` - If the bulk request fails as a whole
    async fn bulk_upsert(
        &self,
        index: &str,
        pipeline: Option<&str>,
        documents: &[(String, Value)],
    ) -> Result<BatchSummary, SearchIndexError>;
}
