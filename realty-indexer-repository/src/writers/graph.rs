//! Graph destination writer.
//!
//! Every document becomes a node labelled after its entity type; every
//! relationship on the document becomes an edge to an existing node. Edges
//! to nodes that were never written fail with `MissingReference`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::config::WriterConfig;
use crate::errors::{StoreError, WriterError};
use crate::interfaces::{GraphEdge, GraphNode, GraphStore, Writer};
use crate::types::{BatchItemResult, BatchSummary, ItemStatus};
use realty_indexer_shared::{Destination, EntityType, FailureKind, GoldDocument};

/// Node label for an entity type.
pub fn node_label(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Property => "Property",
        EntityType::Neighborhood => "Neighborhood",
        EntityType::Article => "WikipediaArticle",
    }
}

/// Flatten a JSON object into graph-friendly properties.
///
/// Graph properties hold scalars or lists of scalars, so nested objects
/// become `parent_child` keys and lists of objects are stored as JSON text.
/// The embedding is kept as a plain list of floats.
pub fn node_properties(source: Value) -> Map<String, Value> {
    let mut properties = Map::new();
    if let Value::Object(map) = source {
        for (key, value) in map {
            if key == "embedding" {
                if let Some(vector) = value.get("vector").cloned() {
                    properties.insert("embedding".to_string(), vector);
                }
                continue;
            }
            flatten_into(&mut properties, key, value);
        }
    }
    properties
}

fn flatten_into(properties: &mut Map<String, Value>, key: String, value: Value) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (child, value) in map {
                flatten_into(properties, format!("{}_{}", key, child), value);
            }
        }
        Value::Array(items) if items.iter().any(|v| v.is_object() || v.is_array()) => {
            properties.insert(key, Value::String(Value::Array(items).to_string()));
        }
        other => {
            properties.insert(key, other);
        }
    }
}

/// Writes graph-shaped documents as nodes and relationship edges.
pub struct GraphWriter {
    store: Arc<dyn GraphStore>,
    config: WriterConfig,
}

impl GraphWriter {
    pub fn new(store: Arc<dyn GraphStore>, config: WriterConfig) -> Self {
        Self { store, config }
    }

    /// Write one document: node first, then its edges.
    async fn write_document(&self, document: &GoldDocument) -> Result<ItemStatus, StoreError> {
        let source = document
            .to_json()
            .map_err(|e| StoreError::rejected(format!("unserializable document: {}", e)))?;
        let label = node_label(document.entity_type);

        let status = self
            .store
            .upsert_node(GraphNode {
                label: label.to_string(),
                id: document.id.clone(),
                properties: node_properties(source),
            })
            .await?;

        for relationship in &document.relationships {
            self.store
                .merge_edge(GraphEdge {
                    kind: relationship.kind.as_str().to_string(),
                    from_label: label.to_string(),
                    from_id: document.id.clone(),
                    to_label: node_label(relationship.target_type).to_string(),
                    to_id: relationship.target_id.clone(),
                })
                .await?;
        }

        Ok(status)
    }
}

#[async_trait]
impl Writer for GraphWriter {
    fn destination(&self) -> Destination {
        Destination::Graph
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    async fn validate_connection(&self) -> Result<bool, WriterError> {
        match self.store.ping().await {
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
        let mut results = Vec::with_capacity(documents.len());

        for document in documents {
            match self.write_document(document).await {
                Ok(ItemStatus::Created) => results.push(BatchItemResult::created(document.id.clone())),
                Ok(_) => results.push(BatchItemResult::updated(document.id.clone())),
                Err(err) => {
                    if let Some(fatal) = err.as_fatal() {
                        warn!(error = %err, "Graph store became unusable");
                        return Err(fatal);
                    }
                    let kind = err.failure_kind();
                    if kind == FailureKind::MissingReference {
                        debug!(id = %document.id, error = %err, "Relationship target missing");
                    }
                    results.push(BatchItemResult::failed(document.id.clone(), kind, err.to_string()));
                }
            }
        }

        debug!(entity_type = %entity_type, total = results.len(), "Graph batch written");
        Ok(BatchSummary::new(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraphStore;
    use realty_indexer_shared::{
        correlation_id, DocumentBody, DocumentShape, Nested, NeighborhoodDocument,
        PropertyDocument, Relationship, RelationshipKind,
    };
    use serde_json::json;

    fn neighborhood(id: &str) -> GoldDocument {
        GoldDocument {
            id: id.to_string(),
            entity_type: EntityType::Neighborhood,
            shape: DocumentShape::Graph,
            correlation_id: correlation_id(EntityType::Neighborhood, id),
            body: DocumentBody::Neighborhood(Box::new(NeighborhoodDocument {
                neighborhood_id: id.to_string(),
                name: Some("Sugar House".to_string()),
                ..Default::default()
            })),
            relationships: vec![],
        }
    }

    fn property(id: &str, neighborhood_id: &str) -> GoldDocument {
        GoldDocument {
            id: id.to_string(),
            entity_type: EntityType::Property,
            shape: DocumentShape::Graph,
            correlation_id: correlation_id(EntityType::Property, id),
            body: DocumentBody::Property(Box::new(PropertyDocument {
                listing_id: id.to_string(),
                neighborhood_id: Some(neighborhood_id.to_string()),
                address: Nested::from_value(Some(&json!({ "city": "Salt Lake City" }))),
                ..Default::default()
            })),
            relationships: vec![Relationship {
                kind: RelationshipKind::InNeighborhood,
                target_type: EntityType::Neighborhood,
                target_id: neighborhood_id.to_string(),
            }],
        }
    }

    #[test]
    fn test_node_properties_flatten_nested_objects() {
        let properties = node_properties(json!({
            "listing_id": "P1",
            "address": { "city": "Park City", "zip": "84060" },
            "price_history": [{ "price": 1 }],
            "features": ["pool", "deck"],
            "embedding": { "name": "search_text", "vector": [0.5, 0.5] },
            "virtual_tour_url": null
        }));

        assert_eq!(properties["address_city"], "Park City");
        assert_eq!(properties["features"], json!(["pool", "deck"]));
        assert!(properties["price_history"].is_string());
        assert_eq!(properties["embedding"], json!([0.5, 0.5]));
        assert!(!properties.contains_key("virtual_tour_url"));
    }

    #[tokio::test]
    async fn test_property_links_to_existing_neighborhood() {
        let store = Arc::new(InMemoryGraphStore::new());
        let writer = GraphWriter::new(store.clone(), WriterConfig::with_batch_size(10));

        writer
            .write_batch(EntityType::Neighborhood, &[neighborhood("N1")])
            .await
            .unwrap();
        let summary = writer
            .write_batch(EntityType::Property, &[property("P1", "N1")])
            .await
            .unwrap();

        assert_eq!(summary.created(), 1);
        assert_eq!(store.edges().await.len(), 1);
        let node = store.node("Property", "P1").await.unwrap();
        assert_eq!(node.properties["address_city"], "Salt Lake City");
    }

    #[tokio::test]
    async fn test_missing_neighborhood_is_reported_not_retried() {
        let store = Arc::new(InMemoryGraphStore::new());
        let writer = GraphWriter::new(store, WriterConfig::with_batch_size(10));

        let summary = writer
            .write_batch(EntityType::Property, &[property("P1", "N9")])
            .await
            .unwrap();

        let failures = summary.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::MissingReference);
        assert!(!failures[0].kind.is_retryable());
    }

    #[tokio::test]
    async fn test_unavailable_store_is_fatal() {
        let store = Arc::new(InMemoryGraphStore::new());
        store.set_available(false);
        let writer = GraphWriter::new(store, WriterConfig::with_batch_size(10));

        assert!(writer.validate_connection().await.is_err());
        let result = writer
            .write_batch(EntityType::Neighborhood, &[neighborhood("N1")])
            .await;
        assert!(matches!(result, Err(WriterError::Connectivity(_))));
    }
}
