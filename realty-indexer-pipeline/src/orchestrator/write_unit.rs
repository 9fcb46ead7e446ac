//! Retry state for one (destination, entity type) write unit.
//!
//! ```text
//! Pending -> InFlight -> Succeeded
//!                     -> PartiallyFailed -> Retrying -> Succeeded
//!                                                    -> PartiallyFailed
//!                                        -> ExhaustedRetries
//! (any non-terminal)  -> Fatal
//! ```
//!
//! The unit does no I/O. The orchestrator feeds it batch summaries and asks
//! it which documents to resubmit.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use realty_indexer_repository::{BatchSummary, ItemStatus};
use realty_indexer_shared::{
    Destination, DocumentFailure, EntityType, FailureKind, WriteOutcome, WriteResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    InFlight,
    PartiallyFailed,
    /// Resubmitting failed documents; `round` starts at 1.
    Retrying { round: u32 },
    Succeeded,
    ExhaustedRetries,
    Fatal,
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitState::Succeeded | UnitState::ExhaustedRetries | UnitState::Fatal
        )
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitState::Pending => f.write_str("pending"),
            UnitState::InFlight => f.write_str("in_flight"),
            UnitState::PartiallyFailed => f.write_str("partially_failed"),
            UnitState::Retrying { round } => write!(f, "retrying({})", round),
            UnitState::Succeeded => f.write_str("succeeded"),
            UnitState::ExhaustedRetries => f.write_str("exhausted_retries"),
            UnitState::Fatal => f.write_str("fatal"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid write unit transition: {event} in state {from}")]
pub struct InvalidTransition {
    pub from: UnitState,
    pub event: &'static str,
}

/// Accumulates the outcome of every batch written for one unit.
#[derive(Debug)]
pub struct WriteUnit {
    destination: Destination,
    entity_type: EntityType,
    max_retries: u32,
    state: UnitState,
    attempted: usize,
    retries: u32,
    succeeded: BTreeSet<String>,
    created: usize,
    updated: usize,
    failures: Vec<DocumentFailure>,
}

impl WriteUnit {
    pub fn new(destination: Destination, entity_type: EntityType, max_retries: u32) -> Self {
        Self {
            destination,
            entity_type,
            max_retries,
            state: UnitState::Pending,
            attempted: 0,
            retries: 0,
            succeeded: BTreeSet::new(),
            created: 0,
            updated: 0,
            failures: Vec::new(),
        }
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Retry rounds started so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn invalid(&self, event: &'static str) -> InvalidTransition {
        InvalidTransition {
            from: self.state,
            event,
        }
    }

    /// Start the first round with `attempted` documents.
    pub fn dispatch(&mut self, attempted: usize) -> Result<(), InvalidTransition> {
        if self.state != UnitState::Pending {
            return Err(self.invalid("dispatch"));
        }
        self.attempted = attempted;
        self.state = UnitState::InFlight;
        Ok(())
    }

    /// Fold one batch summary into the unit.
    pub fn record(&mut self, summary: &BatchSummary) -> Result<(), InvalidTransition> {
        if !matches!(self.state, UnitState::InFlight | UnitState::Retrying { .. }) {
            return Err(self.invalid("record"));
        }

        for item in &summary.results {
            match &item.status {
                ItemStatus::Failed { kind, reason } => {
                    self.failures.retain(|f| f.document_id != item.document_id);
                    self.failures
                        .push(DocumentFailure::new(item.document_id.clone(), *kind, reason.clone()));
                }
                status => {
                    self.failures.retain(|f| f.document_id != item.document_id);
                    if self.succeeded.insert(item.document_id.clone()) {
                        if *status == ItemStatus::Created {
                            self.created += 1;
                        } else {
                            self.updated += 1;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Close the current round once every batch of it has been recorded.
    pub fn complete_round(&mut self) -> Result<UnitState, InvalidTransition> {
        if !matches!(self.state, UnitState::InFlight | UnitState::Retrying { .. }) {
            return Err(self.invalid("complete_round"));
        }
        self.state = if self.failures.is_empty() {
            UnitState::Succeeded
        } else {
            UnitState::PartiallyFailed
        };
        Ok(self.state)
    }

    /// Decide the next round after a partial failure.
    ///
    /// Returns the ids to resubmit: only those whose failure is retryable.
    /// An empty list means the unit moved to `ExhaustedRetries`.
    pub fn plan_retry(&mut self) -> Result<Vec<String>, InvalidTransition> {
        if self.state != UnitState::PartiallyFailed {
            return Err(self.invalid("plan_retry"));
        }

        let retryable: Vec<String> = self
            .failures
            .iter()
            .filter(|f| f.kind.is_retryable())
            .map(|f| f.document_id.clone())
            .collect();

        if retryable.is_empty() || self.retries >= self.max_retries {
            self.state = UnitState::ExhaustedRetries;
            return Ok(Vec::new());
        }

        self.retries += 1;
        self.state = UnitState::Retrying {
            round: self.retries,
        };
        Ok(retryable)
    }

    /// Stop the unit for good. Every id in `unwritten` that neither succeeded
    /// nor already failed is reported as a connectivity failure.
    pub fn fail_fatal<I>(&mut self, reason: &str, unwritten: I) -> Result<(), InvalidTransition>
    where
        I: IntoIterator<Item = String>,
    {
        if self.state.is_terminal() {
            return Err(self.invalid("fail_fatal"));
        }

        for id in unwritten {
            let known = self.succeeded.contains(&id)
                || self.failures.iter().any(|f| f.document_id == id);
            if !known {
                self.failures
                    .push(DocumentFailure::new(id, FailureKind::Connectivity, reason));
            }
        }
        self.state = UnitState::Fatal;
        Ok(())
    }

    /// The unit's final result. Only valid in a terminal state.
    pub fn into_result(self) -> Result<WriteResult, InvalidTransition> {
        let outcome = match self.state {
            UnitState::Succeeded => WriteOutcome::Succeeded,
            UnitState::ExhaustedRetries => WriteOutcome::ExhaustedRetries,
            UnitState::Fatal => WriteOutcome::Fatal,
            _ => return Err(self.invalid("into_result")),
        };

        Ok(WriteResult {
            destination: self.destination,
            entity_type: self.entity_type,
            attempted: self.attempted,
            succeeded: self.succeeded.len(),
            created: self.created,
            updated: self.updated,
            failures: self.failures,
            retries: self.retries,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realty_indexer_repository::BatchItemResult;

    fn unit(max_retries: u32) -> WriteUnit {
        WriteUnit::new(Destination::Search, EntityType::Property, max_retries)
    }

    #[test]
    fn test_clean_round_succeeds() {
        let mut unit = unit(3);
        unit.dispatch(2).unwrap();
        unit.record(&BatchSummary::new(vec![
            BatchItemResult::created("P1"),
            BatchItemResult::updated("P2"),
        ]))
        .unwrap();

        assert_eq!(unit.complete_round().unwrap(), UnitState::Succeeded);
        let result = unit.into_result().unwrap();
        assert_eq!(result.outcome, WriteOutcome::Succeeded);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.created, 1);
        assert_eq!(result.updated, 1);
        assert_eq!(result.retries, 0);
    }

    #[test]
    fn test_retry_only_retryable_failures() {
        let mut unit = unit(3);
        unit.dispatch(3).unwrap();
        unit.record(&BatchSummary::new(vec![
            BatchItemResult::created("P1"),
            BatchItemResult::failed("P2", FailureKind::Transient, "429"),
            BatchItemResult::failed("P3", FailureKind::Rejected, "mapper_parsing_exception"),
        ]))
        .unwrap();
        assert_eq!(unit.complete_round().unwrap(), UnitState::PartiallyFailed);

        assert_eq!(unit.plan_retry().unwrap(), vec!["P2".to_string()]);
        assert_eq!(unit.state(), UnitState::Retrying { round: 1 });

        unit.record(&BatchSummary::new(vec![BatchItemResult::created("P2")]))
            .unwrap();
        assert_eq!(unit.complete_round().unwrap(), UnitState::PartiallyFailed);
        assert!(unit.plan_retry().unwrap().is_empty());
        assert_eq!(unit.state(), UnitState::ExhaustedRetries);

        let result = unit.into_result().unwrap();
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed_ids(), vec!["P3"]);
        assert_eq!(result.retries, 1);
        assert_eq!(result.outcome, WriteOutcome::ExhaustedRetries);
    }

    #[test]
    fn test_retry_budget_is_bounded() {
        let mut unit = unit(1);
        let transient = || BatchSummary::new(vec![BatchItemResult::failed("P1", FailureKind::Transient, "503")]);
        unit.dispatch(1).unwrap();
        unit.record(&transient()).unwrap();
        unit.complete_round().unwrap();
        assert_eq!(unit.plan_retry().unwrap().len(), 1);

        unit.record(&transient()).unwrap();
        unit.complete_round().unwrap();
        assert!(unit.plan_retry().unwrap().is_empty());

        let result = unit.into_result().unwrap();
        assert_eq!(result.retries, 1);
        assert_eq!(result.failures.len(), 1);
    }

    #[test]
    fn test_fatal_marks_unwritten_documents() {
        let mut unit = unit(3);
        unit.dispatch(3).unwrap();
        unit.record(&BatchSummary::new(vec![BatchItemResult::created("P1")]))
            .unwrap();
        unit.fail_fatal(
            "connection refused",
            ["P1", "P2", "P3"].map(String::from),
        )
        .unwrap();

        let result = unit.into_result().unwrap();
        assert_eq!(result.outcome, WriteOutcome::Fatal);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed_ids(), vec!["P2", "P3"]);
        assert!(result
            .failures
            .iter()
            .all(|f| f.kind == FailureKind::Connectivity));
    }

    #[test]
    fn test_fatal_before_dispatch() {
        let mut unit = unit(3);
        unit.fail_fatal("unreachable", ["N1".to_string()]).unwrap();

        let result = unit.into_result().unwrap();
        assert_eq!(result.attempted, 0);
        assert_eq!(result.failed(), 1);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut unit = unit(3);
        assert_eq!(
            unit.complete_round().unwrap_err(),
            InvalidTransition {
                from: UnitState::Pending,
                event: "complete_round"
            }
        );
        assert!(unit.plan_retry().is_err());

        unit.dispatch(0).unwrap();
        assert!(unit.dispatch(0).is_err());
        unit.complete_round().unwrap();
        assert!(unit.fail_fatal("late", Vec::new()).is_err());
        assert!(unit.record(&BatchSummary::default()).is_err());
    }
}
