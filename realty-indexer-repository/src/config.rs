//! Configuration types for the destination writers.

use realty_indexer_shared::{Destination, EntityType};

/// Default number of documents per batch for each destination.
pub const DEFAULT_COLUMNAR_BATCH_SIZE: usize = 1000;
pub const DEFAULT_SEARCH_BATCH_SIZE: usize = 500;
pub const DEFAULT_GRAPH_BATCH_SIZE: usize = 250;

/// Collection name for an entity type: the index, table or label family
/// holding its documents.
pub fn collection_name(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Property => "properties",
        EntityType::Neighborhood => "neighborhoods",
        EntityType::Article => "wiki_articles",
    }
}

/// Batching configuration for a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Maximum number of documents sent in a single `write_batch` call.
    pub batch_size: usize,
}

impl WriterConfig {
    /// The default batching for a destination.
    pub fn for_destination(destination: Destination) -> Self {
        let batch_size = match destination {
            Destination::Columnar => DEFAULT_COLUMNAR_BATCH_SIZE,
            Destination::Search => DEFAULT_SEARCH_BATCH_SIZE,
            Destination::Graph => DEFAULT_GRAPH_BATCH_SIZE,
        };
        Self { batch_size }
    }

    /// Create a config with a custom batch size. Zero is raised to one.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

/// Search-engine specific settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchWriterConfig {
    pub writer: WriterConfig,
    pub property_index: String,
    pub neighborhood_index: String,
    pub article_index: String,
    /// Optional server-side ingest pipeline applied to every document.
    pub ingest_pipeline: Option<String>,
    /// Dimension of the embedding field in the index mappings.
    pub embedding_dimension: usize,
}

impl Default for SearchWriterConfig {
    fn default() -> Self {
        Self {
            writer: WriterConfig::for_destination(Destination::Search),
            property_index: collection_name(EntityType::Property).to_string(),
            neighborhood_index: collection_name(EntityType::Neighborhood).to_string(),
            article_index: collection_name(EntityType::Article).to_string(),
            ingest_pipeline: None,
            embedding_dimension: 384,
        }
    }
}

impl SearchWriterConfig {
    /// Index name for an entity type.
    pub fn index_for(&self, entity_type: EntityType) -> &str {
        match entity_type {
            EntityType::Property => &self.property_index,
            EntityType::Neighborhood => &self.neighborhood_index,
            EntityType::Article => &self.article_index,
        }
    }
}
