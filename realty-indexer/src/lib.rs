//! # Realty Indexer
//!
//! Entry point and configuration for one run of the realty medallion
//! pipeline: environment settings, dependency wiring and logging setup.

pub mod config;

pub use config::{Dependencies, Settings};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] realty_indexer_pipeline::PipelineError),

    /// Embedding provider setup error.
    #[error("Embedding error: {0}")]
    EmbeddingError(#[from] realty_indexer_pipeline::EmbeddingError),

    /// Report serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` (default `info`); `LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
