//! Columnar destination writer.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::{collection_name, WriterConfig};
use crate::errors::WriterError;
use crate::interfaces::{ColumnarStore, Writer};
use crate::types::{BatchItemResult, BatchSummary};
use realty_indexer_shared::{Destination, EntityType, FailureKind, GoldDocument};

/// Writes documents as keyed rows, one table per entity type.
pub struct ColumnarWriter {
    store: Arc<dyn ColumnarStore>,
    config: WriterConfig,
}

impl ColumnarWriter {
    pub fn new(store: Arc<dyn ColumnarStore>, config: WriterConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl Writer for ColumnarWriter {
    fn destination(&self) -> Destination {
        Destination::Columnar
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    async fn validate_connection(&self) -> Result<bool, WriterError> {
        match self.store.check().await {
            Ok(()) => Ok(true),
            Err(err) => Err(err
                .as_fatal()
                .unwrap_or_else(|| WriterError::connectivity(err.to_string()))),
        }
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn write_batch(
        &self,
        entity_type: EntityType,
        documents: &[GoldDocument],
    ) -> Result<BatchSummary, WriterError> {
        let mut results: Vec<Option<BatchItemResult>> = Vec::with_capacity(documents.len());
        let mut rows: Vec<(String, Value)> = Vec::with_capacity(documents.len());

        for document in documents {
            match document.to_json() {
                Ok(row) => {
                    rows.push((document.id.clone(), row));
                    results.push(None);
                }
                Err(e) => results.push(Some(BatchItemResult::failed(
                    document.id.clone(),
                    FailureKind::Rejected,
                    format!("unserializable document: {}", e),
                ))),
            }
        }

        let row_ids: Vec<String> = rows.iter().map(|(id, _)| id.clone()).collect();
        let table = collection_name(entity_type);

        let written: Vec<BatchItemResult> = match self.store.upsert_rows(table, rows).await {
            Ok(statuses) => row_ids
                .into_iter()
                .zip(statuses)
                .map(|(id, status)| BatchItemResult { document_id: id, status })
                .collect(),
            Err(err) => {
                if let Some(fatal) = err.as_fatal() {
                    return Err(fatal);
                }
                warn!(table, error = %err, "Columnar upsert failed");
                let kind = err.failure_kind();
                row_ids
                    .into_iter()
                    .map(|id| BatchItemResult::failed(id, kind, err.to_string()))
                    .collect()
            }
        };

        let mut written = written.into_iter();
        let results: Vec<BatchItemResult> = results
            .into_iter()
            .zip(documents)
            .map(|(local, document)| {
                local.or_else(|| written.next()).unwrap_or_else(|| {
                    BatchItemResult::failed(
                        document.id.clone(),
                        FailureKind::Transient,
                        "missing store row status",
                    )
                })
            })
            .collect();

        debug!(table, total = results.len(), "Columnar batch written");
        Ok(BatchSummary::new(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::{FileColumnarStore, InMemoryColumnarStore};
    use crate::errors::StoreError;
    use crate::types::ItemStatus;
    use realty_indexer_shared::{
        correlation_id, ArticleDocument, DocumentBody, DocumentShape,
    };

    /// Acknowledges only the first row of every upsert.
    struct ShortStore;

    #[async_trait]
    impl ColumnarStore for ShortStore {
        async fn check(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert_rows(
            &self,
            _table: &str,
            rows: Vec<(String, Value)>,
        ) -> Result<Vec<ItemStatus>, StoreError> {
            Ok(rows.iter().take(1).map(|_| ItemStatus::Created).collect())
        }
    }

    fn article(page_id: &str, title: &str) -> GoldDocument {
        GoldDocument {
            id: page_id.to_string(),
            entity_type: EntityType::Article,
            shape: DocumentShape::Columnar,
            correlation_id: correlation_id(EntityType::Article, page_id),
            body: DocumentBody::Article(Box::new(ArticleDocument {
                page_id: page_id.to_string(),
                title: Some(title.to_string()),
                ..Default::default()
            })),
            relationships: vec![],
        }
    }

    #[tokio::test]
    async fn test_rewriting_same_documents_updates_rows() {
        let store = Arc::new(InMemoryColumnarStore::new());
        let writer = ColumnarWriter::new(store.clone(), WriterConfig::with_batch_size(100));
        let docs = vec![article("101", "Deer Valley"), article("102", "Park City")];

        let first = writer.write_batch(EntityType::Article, &docs).await.unwrap();
        let second = writer.write_batch(EntityType::Article, &docs).await.unwrap();

        assert_eq!(first.created(), 2);
        assert_eq!(second.created(), 0);
        assert_eq!(second.updated(), 2);
        assert_eq!(store.row_count("wiki_articles").await, 2);

        let row = store.row("wiki_articles", "101").await.unwrap();
        assert_eq!(row["title"], "Deer Valley");
        assert_eq!(row["entity_type"], "article");
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileColumnarStore::new(dir.path()));
        let writer = ColumnarWriter::new(store.clone(), WriterConfig::with_batch_size(100));

        assert!(writer.validate_connection().await.unwrap());
        writer
            .write_batch(EntityType::Article, &[article("101", "Deer Valley")])
            .await
            .unwrap();

        let rows = store.read_table("wiki_articles").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1["page_id"], "101");
    }

    #[tokio::test]
    async fn test_rows_without_status_are_reported_failed() {
        let writer = ColumnarWriter::new(Arc::new(ShortStore), WriterConfig::with_batch_size(100));
        let docs = vec![
            article("101", "Deer Valley"),
            article("102", "Park City"),
            article("103", "Heber"),
        ];

        let summary = writer.write_batch(EntityType::Article, &docs).await.unwrap();

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.created(), 1);
        let failed: Vec<String> = summary
            .failures()
            .into_iter()
            .map(|f| f.document_id)
            .collect();
        assert_eq!(failed, vec!["102", "103"]);
    }
}
