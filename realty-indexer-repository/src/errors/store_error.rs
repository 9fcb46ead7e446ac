//! Errors raised by the graph and columnar store backends.

use thiserror::Error;

use crate::errors::WriterError;
use realty_indexer_shared::FailureKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A referenced node or row does not exist.
    #[error("Missing reference: {0}")]
    MissingReference(String),

    /// The store refused this item.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// A temporary failure; retrying may succeed.
    #[error("Transient error: {0}")]
    Transient(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn missing_reference(msg: impl Into<String>) -> Self {
        Self::MissingReference(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// The destination-fatal form of this error, if it is one.
    pub fn as_fatal(&self) -> Option<WriterError> {
        match self {
            Self::Unavailable(msg) => Some(WriterError::connectivity(msg.clone())),
            Self::Unauthorized(msg) => Some(WriterError::authentication(msg.clone())),
            _ => None,
        }
    }

    /// Per-document failure kind for non-fatal errors.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Unavailable(_) | Self::Unauthorized(_) => FailureKind::Connectivity,
            Self::MissingReference(_) => FailureKind::MissingReference,
            Self::Rejected(_) => FailureKind::Rejected,
            Self::Transient(_) => FailureKind::Transient,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::NotFound => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Transient(err.to_string()),
        }
    }
}
