//! Search destination writer.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::SearchWriterConfig;
use crate::errors::{SearchIndexError, WriterError};
use crate::interfaces::{SearchIndexProvider, Writer};
use crate::opensearch::index_settings;
use crate::types::{BatchItemResult, BatchSummary};
use realty_indexer_shared::{Destination, EntityType, FailureKind, GoldDocument};

/// Writes search-shaped documents into one index per entity type.
///
/// Indexes are created during connection validation, or on first use, with
/// the mappings from `index_settings`.
pub struct SearchIndexWriter {
    provider: Arc<dyn SearchIndexProvider>,
    config: SearchWriterConfig,
    ready_indexes: Mutex<HashSet<EntityType>>,
}

impl SearchIndexWriter {
    pub fn new(provider: Arc<dyn SearchIndexProvider>, config: SearchWriterConfig) -> Self {
        Self {
            provider,
            config,
            ready_indexes: Mutex::new(HashSet::new()),
        }
    }

    /// Classify a whole-request failure for every document in the batch.
    fn batch_failure(
        err: SearchIndexError,
        ids: &[String],
    ) -> Result<BatchSummary, WriterError> {
        if let Some(fatal) = err.as_fatal() {
            return Err(fatal);
        }

        let kind = match err {
            SearchIndexError::TransientError(_) | SearchIndexError::ParseError(_) => {
                FailureKind::Transient
            }
            _ => FailureKind::Rejected,
        };
        warn!(error = %err, count = ids.len(), ?kind, "Bulk request failed");
        Ok(BatchSummary::all_failed(
            ids.iter().map(String::as_str),
            kind,
            &err.to_string(),
        ))
    }

    async fn ensure_index(&self, entity_type: EntityType) -> Result<(), SearchIndexError> {
        let mut ready = self.ready_indexes.lock().await;
        if ready.contains(&entity_type) {
            return Ok(());
        }

        let index = self.config.index_for(entity_type);
        let settings = index_settings(entity_type, self.config.embedding_dimension);
        self.provider.ensure_index(index, &settings).await?;
        ready.insert(entity_type);
        Ok(())
    }
}

#[async_trait]
impl Writer for SearchIndexWriter {
    fn destination(&self) -> Destination {
        Destination::Search
    }

    fn batch_size(&self) -> usize {
        self.config.writer.batch_size
    }

    async fn validate_connection(&self) -> Result<bool, WriterError> {
        let healthy = match self.provider.health_check().await {
            Ok(healthy) => healthy,
            Err(err) => {
                return Err(err
                    .as_fatal()
                    .unwrap_or_else(|| WriterError::connectivity(err.to_string())))
            }
        };
        info!(healthy, "Search cluster health checked");
        if !healthy {
            return Ok(false);
        }

        for entity_type in EntityType::ALL {
            if let Err(err) = self.ensure_index(entity_type).await {
                return Err(err
                    .as_fatal()
                    .unwrap_or_else(|| WriterError::configuration(err.to_string())));
            }
        }
        Ok(true)
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn write_batch(
        &self,
        entity_type: EntityType,
        documents: &[GoldDocument],
    ) -> Result<BatchSummary, WriterError> {
        if documents.is_empty() {
            return Ok(BatchSummary::default());
        }

        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        if let Err(err) = self.ensure_index(entity_type).await {
            return Self::batch_failure(err, &ids);
        }

        // Documents that fail to serialize never reach the engine.
        let mut unsent: Vec<Option<BatchItemResult>> = Vec::with_capacity(documents.len());
        let mut payload: Vec<(String, Value)> = Vec::with_capacity(documents.len());
        for document in documents {
            match document.to_json() {
                Ok(source) => {
                    payload.push((document.id.clone(), source));
                    unsent.push(None);
                }
                Err(e) => unsent.push(Some(BatchItemResult::failed(
                    document.id.clone(),
                    FailureKind::Rejected,
                    format!("unserializable document: {}", e),
                ))),
            }
        }

        let index = self.config.index_for(entity_type);
        let sent_ids: Vec<String> = payload.iter().map(|(id, _)| id.clone()).collect();
        let summary = match self
            .provider
            .bulk_upsert(index, self.config.ingest_pipeline.as_deref(), &payload)
            .await
        {
            Ok(summary) => summary,
            Err(err) => Self::batch_failure(err, &sent_ids)?,
        };

        let mut sent = summary.results.into_iter();
        let results = unsent
            .into_iter()
            .zip(ids)
            .map(|(local, id)| {
                local.or_else(|| sent.next()).unwrap_or_else(|| {
                    BatchItemResult::failed(id, FailureKind::Transient, "missing bulk item result")
                })
            })
            .collect::<Vec<_>>();

        debug!(index, total = results.len(), "Search batch written");
        Ok(BatchSummary::new(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemStatus;
    use realty_indexer_shared::{
        correlation_id, DocumentBody, DocumentShape, NeighborhoodDocument,
    };
    use std::collections::HashMap;

    struct MockProvider {
        healthy: Result<bool, SearchIndexError>,
        bulk_error: Option<SearchIndexError>,
        failing_ids: Vec<String>,
        stored: Mutex<HashMap<String, Value>>,
        created_indexes: Mutex<Vec<String>>,
        pipelines: Mutex<Vec<Option<String>>>,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                healthy: Ok(true),
                bulk_error: None,
                failing_ids: Vec::new(),
                stored: Mutex::new(HashMap::new()),
                created_indexes: Mutex::new(Vec::new()),
                pipelines: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockProvider {
        async fn health_check(&self) -> Result<bool, SearchIndexError> {
            self.healthy.clone()
        }

        async fn ensure_index(&self, index: &str, _settings: &Value) -> Result<(), SearchIndexError> {
            self.created_indexes.lock().await.push(index.to_string());
            Ok(())
        }

        async fn bulk_upsert(
            &self,
            _index: &str,
            pipeline: Option<&str>,
            documents: &[(String, Value)],
        ) -> Result<BatchSummary, SearchIndexError> {
            self.pipelines.lock().await.push(pipeline.map(str::to_string));
            if let Some(err) = &self.bulk_error {
                return Err(err.clone());
            }

            let mut stored = self.stored.lock().await;
            let results = documents
                .iter()
                .map(|(id, source)| {
                    if self.failing_ids.contains(id) {
                        return BatchItemResult::failed(id.clone(), FailureKind::Transient, "queue full");
                    }
                    match stored.insert(id.clone(), source.clone()) {
                        Some(_) => BatchItemResult::updated(id.clone()),
                        None => BatchItemResult::created(id.clone()),
                    }
                })
                .collect();
            Ok(BatchSummary::new(results))
        }
    }

    fn neighborhood(id: &str) -> GoldDocument {
        GoldDocument {
            id: id.to_string(),
            entity_type: EntityType::Neighborhood,
            shape: DocumentShape::Search,
            correlation_id: correlation_id(EntityType::Neighborhood, id),
            body: DocumentBody::Neighborhood(Box::new(NeighborhoodDocument {
                neighborhood_id: id.to_string(),
                name: Some("Noe Valley".to_string()),
                ..Default::default()
            })),
            relationships: vec![],
        }
    }

    fn writer(provider: MockProvider) -> (Arc<MockProvider>, SearchIndexWriter) {
        let provider = Arc::new(provider);
        let config = SearchWriterConfig {
            ingest_pipeline: Some("realty-enrich".to_string()),
            ..Default::default()
        };
        (provider.clone(), SearchIndexWriter::new(provider, config))
    }

    #[tokio::test]
    async fn test_write_batch_upserts_by_id() {
        let (provider, writer) = writer(MockProvider::new());
        let docs = vec![neighborhood("N1"), neighborhood("N2")];

        let first = writer.write_batch(EntityType::Neighborhood, &docs).await.unwrap();
        let second = writer.write_batch(EntityType::Neighborhood, &docs).await.unwrap();

        assert_eq!(first.created(), 2);
        assert_eq!(second.created(), 0);
        assert_eq!(second.updated(), 2);
        assert_eq!(provider.stored.lock().await.len(), 2);
        assert_eq!(provider.stored.lock().await["N1"]["neighborhood_id"], "N1");

        // Index ensured once, pipeline passed on every bulk request.
        assert_eq!(*provider.created_indexes.lock().await, vec!["neighborhoods".to_string()]);
        assert!(provider
            .pipelines
            .lock()
            .await
            .iter()
            .all(|p| p.as_deref() == Some("realty-enrich")));
    }

    #[tokio::test]
    async fn test_partial_failure_reported_per_document() {
        let mut provider = MockProvider::new();
        provider.failing_ids = vec!["N2".to_string()];
        let (_, writer) = writer(provider);

        let summary = writer
            .write_batch(EntityType::Neighborhood, &[neighborhood("N1"), neighborhood("N2")])
            .await
            .unwrap();

        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.results[1].document_id, "N2");
        assert!(matches!(
            summary.results[1].status,
            ItemStatus::Failed { kind: FailureKind::Transient, .. }
        ));
    }

    #[tokio::test]
    async fn test_throttled_bulk_request_fails_every_document_transiently() {
        let mut provider = MockProvider::new();
        provider.bulk_error = Some(SearchIndexError::transient("429 Too Many Requests"));
        let (_, writer) = writer(provider);

        let summary = writer
            .write_batch(EntityType::Neighborhood, &[neighborhood("N1"), neighborhood("N2")])
            .await
            .unwrap();

        assert_eq!(summary.succeeded(), 0);
        assert!(summary.failures().iter().all(|f| f.kind == FailureKind::Transient));
    }

    #[tokio::test]
    async fn test_authentication_failure_is_fatal() {
        let mut provider = MockProvider::new();
        provider.bulk_error = Some(SearchIndexError::authentication("403"));
        let (_, writer) = writer(provider);

        let result = writer
            .write_batch(EntityType::Neighborhood, &[neighborhood("N1")])
            .await;

        assert_eq!(result, Err(WriterError::authentication("403")));
    }

    #[tokio::test]
    async fn test_validate_connection_prepares_every_index() {
        let (provider, writer) = writer(MockProvider::new());

        assert!(writer.validate_connection().await.unwrap());
        assert_eq!(
            *provider.created_indexes.lock().await,
            vec!["neighborhoods".to_string(), "properties".to_string(), "wiki_articles".to_string()]
        );
    }

    #[tokio::test]
    async fn test_validate_connection() {
        let mut provider = MockProvider::new();
        provider.healthy = Err(SearchIndexError::connection("connection refused"));
        let (_, writer) = writer(provider);

        assert!(matches!(
            writer.validate_connection().await,
            Err(WriterError::Connectivity(_))
        ));
    }
}
