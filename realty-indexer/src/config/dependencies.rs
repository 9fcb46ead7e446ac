//! Dependency initialization and wiring for the realty indexer.

use std::sync::Arc;
use tracing::{info, warn};

use super::settings::{EmbeddingBackend, Settings};
use crate::IndexingError;
use realty_indexer_pipeline::{
    EmbeddingProvider, HashingEmbeddingProvider, OpenAiConfig, OpenAiEmbeddingProvider, Pipeline,
};
use realty_indexer_repository::{
    ColumnarWriter, FileColumnarStore, GraphWriter, InMemoryGraphStore, OpenSearchClient,
    SearchIndexWriter, Writer,
};
use realty_indexer_shared::Destination;

/// Texts per call for the local hashing provider.
const HASHING_MAX_BATCH_SIZE: usize = 256;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured pipeline ready to run.
    pub pipeline: Pipeline,
}

impl Dependencies {
    /// Build the embedding provider, one writer per enabled destination and
    /// the pipeline that drives them.
    pub async fn new(settings: &Settings) -> Result<Self, IndexingError> {
        info!(
            destinations = ?settings.pipeline.destinations,
            sources = settings.sources.len(),
            embedding_dimension = settings.embedding.dimension(),
            "Initializing dependencies"
        );

        let provider = embedding_provider(&settings.embedding)?;
        info!(provider = provider.name(), "Embedding provider created");

        let mut writers: Vec<Arc<dyn Writer>> = Vec::new();
        for destination in &settings.pipeline.destinations {
            writers.push(writer_for(*destination, settings).await?);
        }

        let pipeline = Pipeline::new(
            settings.pipeline.clone(),
            settings.source_specs(),
            provider,
            writers,
        )?;

        Ok(Self { pipeline })
    }
}

fn embedding_provider(
    backend: &EmbeddingBackend,
) -> Result<Arc<dyn EmbeddingProvider>, IndexingError> {
    match backend {
        EmbeddingBackend::Hashing { dimension } => Ok(Arc::new(HashingEmbeddingProvider::new(
            *dimension,
            HASHING_MAX_BATCH_SIZE,
        ))),
        EmbeddingBackend::OpenAi {
            api_key,
            base_url,
            model,
            dimension,
        } => {
            let config = OpenAiConfig {
                base_url: base_url.clone(),
                model: model.clone(),
                dimension: *dimension,
                ..OpenAiConfig::new(api_key.clone())
            };
            Ok(Arc::new(OpenAiEmbeddingProvider::new(config)?))
        }
    }
}

async fn writer_for(
    destination: Destination,
    settings: &Settings,
) -> Result<Arc<dyn Writer>, IndexingError> {
    let writer: Arc<dyn Writer> = match destination {
        Destination::Columnar => {
            let store = FileColumnarStore::new(settings.columnar_output_dir.clone());
            info!(dir = %settings.columnar_output_dir.display(), "Columnar store created");
            Arc::new(ColumnarWriter::new(
                Arc::new(store),
                settings.pipeline.columnar,
            ))
        }
        Destination::Search => {
            let client = OpenSearchClient::new(&settings.opensearch_url)
                .await
                .map_err(|e| {
                    IndexingError::config(format!("Failed to create OpenSearch client: {}", e))
                })?;
            info!(opensearch_url = %settings.opensearch_url, "OpenSearch client created");
            Arc::new(SearchIndexWriter::new(
                Arc::new(client),
                settings.pipeline.search.clone(),
            ))
        }
        Destination::Graph => {
            warn!("Graph destination uses the in-process graph store; nodes do not outlive the run");
            Arc::new(GraphWriter::new(
                Arc::new(InMemoryGraphStore::new()),
                settings.pipeline.graph,
            ))
        }
    };
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wires_local_destinations() {
        let settings = Settings::from_lookup(|key| match key {
            "OUTPUT_DESTINATIONS" => Some("columnar,graph".to_string()),
            "COLUMNAR_OUTPUT_DIR" => Some("./target/test-gold".to_string()),
            _ => None,
        })
        .unwrap();

        let deps = Dependencies::new(&settings).await.unwrap();
        assert_eq!(deps.pipeline.config().destinations.len(), 2);
    }

    #[test]
    fn test_openai_provider_dimension() {
        let provider = embedding_provider(&EmbeddingBackend::OpenAi {
            api_key: "sk-test".to_string(),
            base_url: "http://localhost:1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 512,
        })
        .unwrap();
        assert_eq!(provider.dimension(), 512);
    }
}
