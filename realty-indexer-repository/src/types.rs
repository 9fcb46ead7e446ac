//! Batch result types shared by every writer.

use realty_indexer_shared::{DocumentFailure, FailureKind};

/// Outcome of writing a single document within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// The document did not exist before and was stored.
    Created,
    /// The document replaced an existing one with the same id.
    Updated,
    /// The document was not stored.
    Failed { kind: FailureKind, reason: String },
}

/// Result of a batch operation for a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemResult {
    pub document_id: String,
    pub status: ItemStatus,
}

impl BatchItemResult {
    pub fn created(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            status: ItemStatus::Created,
        }
    }

    pub fn updated(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            status: ItemStatus::Updated,
        }
    }

    pub fn failed(document_id: impl Into<String>, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            status: ItemStatus::Failed {
                kind,
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, ItemStatus::Failed { .. })
    }
}

/// Summary of one `write_batch` call: one result per submitted document, in
/// submission order. Partial failures are reported here, never as errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub results: Vec<BatchItemResult>,
}

impl BatchSummary {
    pub fn new(results: Vec<BatchItemResult>) -> Self {
        Self { results }
    }

    /// Every document in `ids` failed with the same kind and reason.
    pub fn all_failed<'a>(
        ids: impl IntoIterator<Item = &'a str>,
        kind: FailureKind,
        reason: &str,
    ) -> Self {
        Self {
            results: ids
                .into_iter()
                .map(|id| BatchItemResult::failed(id, kind, reason))
                .collect(),
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn created(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ItemStatus::Created)
            .count()
    }

    pub fn updated(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ItemStatus::Updated)
            .count()
    }

    pub fn failures(&self) -> Vec<DocumentFailure> {
        self.results
            .iter()
            .filter_map(|r| match &r.status {
                ItemStatus::Failed { kind, reason } => {
                    Some(DocumentFailure::new(r.document_id.clone(), *kind, reason.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let summary = BatchSummary::new(vec![
            BatchItemResult::created("a"),
            BatchItemResult::updated("b"),
            BatchItemResult::failed("c", FailureKind::Transient, "es_rejected_execution_exception"),
        ]);

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.created(), 1);
        assert_eq!(summary.updated(), 1);

        let failures = summary.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].document_id, "c");
        assert_eq!(failures[0].kind, FailureKind::Transient);
    }

    #[test]
    fn test_all_failed() {
        let summary = BatchSummary::all_failed(["a", "b"], FailureKind::Rejected, "bad request");
        assert_eq!(summary.succeeded(), 0);
        assert_eq!(summary.failures().len(), 2);
    }
}
