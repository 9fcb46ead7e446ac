//! Settings read from the process environment.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::IndexingError;
use realty_indexer_pipeline::{EmbeddingConfig, PipelineConfig, RetryPolicy, SourceSpec};
use realty_indexer_shared::{Destination, EntityType};

const DEFAULT_OUTPUT_DESTINATIONS: &str = "columnar";
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";
const DEFAULT_COLUMNAR_OUTPUT_DIR: &str = "./data/gold";
const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Which embedding provider the run uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Deterministic local hashing, no network.
    Hashing { dimension: usize },
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi {
        api_key: String,
        base_url: String,
        model: String,
        dimension: usize,
    },
}

impl EmbeddingBackend {
    pub fn dimension(&self) -> usize {
        match self {
            EmbeddingBackend::Hashing { dimension } => *dimension,
            EmbeddingBackend::OpenAi { dimension, .. } => *dimension,
        }
    }
}

/// Everything the binary needs to wire one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub sources: BTreeMap<EntityType, PathBuf>,
    pub opensearch_url: String,
    pub columnar_output_dir: PathBuf,
    pub embedding: EmbeddingBackend,
    pub json_logs: bool,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OUTPUT_DESTINATIONS`: comma list of `columnar`, `search`, `graph` (default: columnar)
    /// - `PROPERTIES_SOURCE`, `NEIGHBORHOODS_SOURCE`, `ARTICLES_SOURCE`: JSON or JSON-lines files
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `SEARCH_INGEST_PIPELINE`: ingest pipeline applied to bulk writes
    /// - `COLUMNAR_OUTPUT_DIR`: columnar partition directory (default: ./data/gold)
    /// - `COLUMNAR_RECEIVES_SILVER`: write Silver records to the columnar store (default: false)
    /// - `EMBEDDING_PROVIDER`: `hashing` (default) or `openai`
    /// - `EMBEDDING_API_KEY`, `EMBEDDING_BASE_URL`, `EMBEDDING_MODEL`, `EMBEDDING_DIMENSIONS`
    /// - `EMBEDDING_BATCH_SIZE`, `EMBEDDING_MAX_IN_FLIGHT`
    /// - `WRITE_MAX_RETRIES`, `WRITE_RETRY_INITIAL_MS`, `WRITE_RETRY_MAX_MS`
    /// - `LOG_FORMAT`: `json` for JSON log lines
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns `None` for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let destinations = var("OUTPUT_DESTINATIONS")
            .unwrap_or_else(|| DEFAULT_OUTPUT_DESTINATIONS.to_string())
            .split(',')
            .filter(|name| !name.trim().is_empty())
            .map(|name| {
                Destination::from_str(name).map_err(|e| IndexingError::config(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut sources = BTreeMap::new();
        for (key, entity_type) in [
            ("PROPERTIES_SOURCE", EntityType::Property),
            ("NEIGHBORHOODS_SOURCE", EntityType::Neighborhood),
            ("ARTICLES_SOURCE", EntityType::Article),
        ] {
            if let Some(path) = var(key) {
                sources.insert(entity_type, PathBuf::from(path));
            }
        }

        let embedding = match var("EMBEDDING_PROVIDER").as_deref().map(str::to_ascii_lowercase) {
            None => EmbeddingBackend::Hashing {
                dimension: parse_or(&var, "EMBEDDING_DIMENSIONS", 384)?,
            },
            Some(name) if name == "hashing" => EmbeddingBackend::Hashing {
                dimension: parse_or(&var, "EMBEDDING_DIMENSIONS", 384)?,
            },
            Some(name) if name == "openai" => EmbeddingBackend::OpenAi {
                api_key: var("EMBEDDING_API_KEY").ok_or_else(|| {
                    IndexingError::config("EMBEDDING_API_KEY is required for the openai provider")
                })?,
                base_url: var("EMBEDDING_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_BASE_URL.to_string()),
                model: var("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                dimension: parse_or(&var, "EMBEDDING_DIMENSIONS", 1536)?,
            },
            Some(other) => {
                return Err(IndexingError::config(format!(
                    "unknown EMBEDDING_PROVIDER '{}'",
                    other
                )))
            }
        };

        let defaults = EmbeddingConfig::default();
        let mut pipeline = PipelineConfig::with_destinations(destinations);
        pipeline.columnar_receives_silver = parse_or(&var, "COLUMNAR_RECEIVES_SILVER", false)?;
        pipeline.embedding = EmbeddingConfig {
            batch_size: parse_or(&var, "EMBEDDING_BATCH_SIZE", defaults.batch_size)?,
            max_in_flight: parse_or(&var, "EMBEDDING_MAX_IN_FLIGHT", defaults.max_in_flight)?,
            ..defaults
        };

        let retry = RetryPolicy::default();
        pipeline.write_retry = RetryPolicy::new(
            parse_or(&var, "WRITE_MAX_RETRIES", retry.max_retries)?,
            parse_or(&var, "WRITE_RETRY_INITIAL_MS", retry.initial_delay_ms)?,
            parse_or(&var, "WRITE_RETRY_MAX_MS", retry.max_delay_ms)?,
        );
        pipeline.search.ingest_pipeline = var("SEARCH_INGEST_PIPELINE");
        pipeline.search.embedding_dimension = embedding.dimension();

        Ok(Self {
            pipeline,
            sources,
            opensearch_url: var("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            columnar_output_dir: PathBuf::from(
                var("COLUMNAR_OUTPUT_DIR").unwrap_or_else(|| DEFAULT_COLUMNAR_OUTPUT_DIR.to_string()),
            ),
            embedding,
            json_logs: var("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Source specs for every configured entity file.
    pub fn source_specs(&self) -> BTreeMap<EntityType, SourceSpec> {
        self.sources
            .iter()
            .map(|(entity_type, path)| (*entity_type, SourceSpec::from_path(path.clone())))
            .collect()
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T, IndexingError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| IndexingError::config(format!("invalid {}='{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
