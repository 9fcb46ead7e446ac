//! Run report assembly.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::DroppedRecord;
use realty_indexer_shared::{EntityType, WriteResult};

/// Pipeline tiers, in execution order. Cancellation is checked after each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Load,
    Enrich,
    Embed,
    Build,
    Write,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Load => "load",
            Tier::Enrich => "enrich",
            Tier::Embed => "embed",
            Tier::Build => "build",
            Tier::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunStatus {
    /// Every record made it through and every write succeeded.
    Completed,
    /// The run finished but some records were dropped or some writes failed.
    CompletedWithFailures,
    /// Stopped at a checkpoint; work completed before it is kept.
    Cancelled { after_tier: Tier },
}

/// Tier counts for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityReport {
    /// Why the entity type's source could not be loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub loaded: usize,
    pub enriched: usize,
    /// Records dropped by enrichment.
    pub dropped: Vec<DroppedRecord>,
    pub embedded: usize,
    /// Records with no embeddable text.
    pub embedding_skipped: usize,
    /// Ids of records whose embedding batch exhausted its retries.
    pub embedding_failed: Vec<String>,
    pub documents_built: usize,
    /// Records dropped by document building.
    pub documents_dropped: Vec<DroppedRecord>,
}

impl EntityReport {
    fn has_failures(&self) -> bool {
        self.source_error.is_some()
            || !self.dropped.is_empty()
            || !self.embedding_failed.is_empty()
            || !self.documents_dropped.is_empty()
    }
}

/// Final report of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub status: RunStatus,
    pub entities: BTreeMap<EntityType, EntityReport>,
    pub writes: Vec<WriteResult>,
}

impl RunReport {
    pub fn entity(&self, entity_type: EntityType) -> Option<&EntityReport> {
        self.entities.get(&entity_type)
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Documents that failed to write, across every destination.
    pub fn failed_writes(&self) -> usize {
        self.writes.iter().map(WriteResult::failed).sum()
    }
}

/// Collects tier outcomes as the run progresses.
#[derive(Debug)]
pub struct ResultAggregator {
    started_at: DateTime<Utc>,
    entities: BTreeMap<EntityType, EntityReport>,
    writes: Vec<WriteResult>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            entities: BTreeMap::new(),
            writes: Vec::new(),
        }
    }

    pub fn entity_mut(&mut self, entity_type: EntityType) -> &mut EntityReport {
        self.entities.entry(entity_type).or_default()
    }

    pub fn record_writes(&mut self, results: Vec<WriteResult>) {
        self.writes.extend(results);
    }

    /// Close the report. `cancelled_after` is the last tier that completed
    /// when the run was cancelled.
    pub fn finish(self, cancelled_after: Option<Tier>) -> RunReport {
        let status = match cancelled_after {
            Some(after_tier) => RunStatus::Cancelled { after_tier },
            None if self.entities.values().any(EntityReport::has_failures)
                || self.writes.iter().any(|w| !w.is_success()) =>
            {
                RunStatus::CompletedWithFailures
            }
            None => RunStatus::Completed,
        };

        let report = RunReport {
            started_at: self.started_at,
            finished_at: Utc::now(),
            status,
            entities: self.entities,
            writes: self.writes,
        };
        log_summary(&report);
        report
    }
}

fn log_summary(report: &RunReport) {
    for (entity_type, entity) in &report.entities {
        info!(
            entity_type = %entity_type,
            loaded = entity.loaded,
            enriched = entity.enriched,
            dropped = entity.dropped.len(),
            embedded = entity.embedded,
            embedding_failed = entity.embedding_failed.len(),
            documents_built = entity.documents_built,
            documents_dropped = entity.documents_dropped.len(),
            "Entity summary"
        );
    }
    for write in &report.writes {
        if write.is_success() {
            info!(
                destination = %write.destination,
                entity_type = %write.entity_type,
                succeeded = write.succeeded,
                created = write.created,
                updated = write.updated,
                "Write summary"
            );
        } else {
            warn!(
                destination = %write.destination,
                entity_type = %write.entity_type,
                succeeded = write.succeeded,
                failed = write.failed(),
                failed_ids = ?write.failed_ids(),
                outcome = ?write.outcome,
                "Write summary"
            );
        }
    }

    let elapsed_ms = (report.finished_at - report.started_at).num_milliseconds();
    info!(status = ?report.status, elapsed_ms, "Pipeline run finished");
}
