//! Search index error types.
//!
//! This module defines the error types that can occur during search index operations.

use thiserror::Error;

use crate::errors::WriterError;

/// Errors that can occur during search index operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Failed to establish connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The search engine rejected the credentials.
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The whole request was throttled or timed out; it may succeed later.
    #[error("Transient error: {0}")]
    TransientError(String),

    /// Failed to create an index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// The bulk request as a whole was refused.
    #[error("Bulk operation error: {0}")]
    BulkOperationError(String),

    /// Failed to parse a response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl SearchIndexError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an authentication error.
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::AuthenticationError(msg.into())
    }

    /// Create a transient error.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a bulk operation error.
    pub fn bulk_operation(msg: impl Into<String>) -> Self {
        Self::BulkOperationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// The destination-fatal form of this error, if it is one.
    pub fn as_fatal(&self) -> Option<WriterError> {
        match self {
            Self::ConnectionError(msg) => Some(WriterError::connectivity(msg.clone())),
            Self::AuthenticationError(msg) => Some(WriterError::authentication(msg.clone())),
            Self::IndexCreationError(msg) => Some(WriterError::configuration(msg.clone())),
            Self::TransientError(_) | Self::BulkOperationError(_) | Self::ParseError(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert_eq!(
            SearchIndexError::connection("refused").as_fatal(),
            Some(WriterError::connectivity("refused"))
        );
        assert_eq!(
            SearchIndexError::authentication("401").as_fatal(),
            Some(WriterError::authentication("401"))
        );
        assert!(SearchIndexError::transient("429").as_fatal().is_none());
        assert!(SearchIndexError::bulk_operation("400").as_fatal().is_none());
    }
}
