//! Error types for the realty indexer pipeline.
//!
//! Errors are classified where they originate: per-record errors drop the
//! record, stage errors abort the run. Destination failures never surface
//! here; they are reported in `WriteResult`s.

use serde::Serialize;
use thiserror::Error;

use realty_indexer_shared::EntityType;

/// A record removed from the stream by a per-record error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRecord {
    /// Natural id, or `#<position>` when the record has none.
    pub id: String,
    pub reason: String,
}

impl DroppedRecord {
    pub fn new(id: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while loading a Bronze source. Fatal for that source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source does not look like records of the declared entity type.
    #[error("Schema mismatch for {entity_type} source: {reason}")]
    SchemaMismatch {
        entity_type: EntityType,
        reason: String,
    },

    /// The source could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The source could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl SourceError {
    pub fn schema_mismatch(entity_type: EntityType, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            entity_type,
            reason: reason.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

/// Per-record enrichment failure. The record is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentError {
    #[error("{entity_type} record has no '{field}'")]
    MissingNaturalId {
        entity_type: EntityType,
        field: &'static str,
    },
}

/// Errors returned by an embedding provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    /// The provider throttled the request.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A network failure or server-side error.
    #[error("Transient error: {0}")]
    Transient(String),

    /// The provider refused the credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The provider refused the request itself.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The provider answered with something that breaks its contract
    /// (wrong vector count or dimension).
    #[error("Contract violation: {0}")]
    Contract(String),
}

impl EmbeddingError {
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn malformed_request(msg: impl Into<String>) -> Self {
        Self::MalformedRequest(msg.into())
    }

    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }

    /// Whether the same batch may succeed if sent again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Transient(_))
    }
}

/// Errors that abort the embedding stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingStageError {
    #[error("Embedding stage aborted: {0}")]
    Fatal(EmbeddingError),
}

/// A record cannot be built into a Gold document because its identity field is missing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{entity_type} document has no identity field '{field}'")]
pub struct DocumentIdentityError {
    pub entity_type: EntityType,
    pub field: &'static str,
}

/// Run-level errors. Only these abort a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No configured source could be loaded.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The embedding stage hit a fatal provider error.
    #[error(transparent)]
    Embedding(#[from] EmbeddingStageError),

    /// The configuration cannot produce a valid run.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_classes() {
        assert!(EmbeddingError::rate_limited("429").is_retryable());
        assert!(EmbeddingError::transient("timeout").is_retryable());
        assert!(!EmbeddingError::authentication("401").is_retryable());
        assert!(!EmbeddingError::malformed_request("400").is_retryable());
        assert!(!EmbeddingError::contract("2 vectors for 3 texts").is_retryable());
    }

    #[test]
    fn test_messages() {
        let err = SourceError::schema_mismatch(EntityType::Property, "item 0 is not an object");
        assert_eq!(
            err.to_string(),
            "Schema mismatch for property source: item 0 is not an object"
        );

        let err = DocumentIdentityError {
            entity_type: EntityType::Article,
            field: "page_id",
        };
        assert_eq!(err.to_string(), "article document has no identity field 'page_id'");
    }
}
