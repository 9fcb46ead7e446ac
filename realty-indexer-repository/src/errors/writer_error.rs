//! Writer error types.
//!
//! A `WriterError` always means the destination cannot take any more work in
//! this run. Document-level problems are reported in a `BatchSummary` instead.

use thiserror::Error;

/// Destination-fatal errors raised by a `Writer`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriterError {
    /// The destination could not be reached.
    #[error("Connection error: {0}")]
    Connectivity(String),

    /// The destination refused the credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The writer is misconfigured for this destination.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WriterError {
    /// Create a connectivity error.
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Create an authentication error.
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
