//! Per-destination write results.

use serde::{Deserialize, Serialize};

use crate::entity::{Destination, EntityType};

/// Why a single document failed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Throttling, timeouts, temporary unavailability.
    Transient,
    /// The destination refused the document (mapping/validation errors).
    Rejected,
    /// A referenced entity does not exist on the destination.
    MissingReference,
    /// The destination was unreachable or refused the credentials.
    Connectivity,
}

impl FailureKind {
    /// Whether resubmitting the same document may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document_id: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl DocumentFailure {
    pub fn new(document_id: impl Into<String>, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            kind,
            reason: reason.into(),
        }
    }
}

/// Terminal state of a (destination, entity type) write unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Succeeded,
    ExhaustedRetries,
    Fatal,
}

/// Outcome of writing one entity type's documents to one destination.
///
/// The orchestrator folds every batch for a (destination, entity type) pair,
/// retries included, into exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResult {
    pub destination: Destination,
    pub entity_type: EntityType,
    /// Distinct documents submitted.
    pub attempted: usize,
    pub succeeded: usize,
    /// Documents that did not exist on the destination before this write.
    pub created: usize,
    /// Documents that replaced an existing stored document.
    pub updated: usize,
    pub failures: Vec<DocumentFailure>,
    /// Retry rounds consumed.
    pub retries: u32,
    pub outcome: WriteOutcome,
}

impl WriteResult {
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.document_id.as_str()).collect()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == WriteOutcome::Succeeded && self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_failures_are_retryable() {
        assert!(FailureKind::Transient.is_retryable());
        assert!(!FailureKind::Rejected.is_retryable());
        assert!(!FailureKind::MissingReference.is_retryable());
        assert!(!FailureKind::Connectivity.is_retryable());
    }

    #[test]
    fn test_write_result_failed_ids() {
        let result = WriteResult {
            destination: Destination::Search,
            entity_type: EntityType::Property,
            attempted: 3,
            succeeded: 2,
            created: 2,
            updated: 0,
            failures: vec![DocumentFailure::new("P2", FailureKind::Rejected, "mapper_parsing_exception")],
            retries: 0,
            outcome: WriteOutcome::ExhaustedRetries,
        };

        assert_eq!(result.failed_ids(), vec!["P2"]);
        assert_eq!(result.failed(), 1);
        assert!(!result.is_success());
    }
}
