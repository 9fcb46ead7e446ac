//! Writer orchestrator.
//!
//! Commits Gold documents to every enabled destination. Destinations are
//! independent and written concurrently; within a destination, entity types
//! are written one at a time in prerequisite order so that referenced
//! entities reach a terminal state first.

mod write_unit;

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RetryPolicy;
use realty_indexer_repository::Writer;
use realty_indexer_shared::{Destination, EntityType, GoldDocument, WriteOutcome, WriteResult};

pub use write_unit::{InvalidTransition, UnitState, WriteUnit};

/// Documents for one destination, grouped by entity type.
pub type DocumentsByEntity = BTreeMap<EntityType, Vec<GoldDocument>>;

/// Dispatches documents to destination writers and folds the outcomes into
/// one `WriteResult` per (destination, entity type).
pub struct WriterOrchestrator {
    writers: Vec<Arc<dyn Writer>>,
    retry: RetryPolicy,
}

impl WriterOrchestrator {
    pub fn new(writers: Vec<Arc<dyn Writer>>, retry: RetryPolicy) -> Self {
        Self { writers, retry }
    }

    pub fn destinations(&self) -> BTreeSet<Destination> {
        self.writers.iter().map(|w| w.destination()).collect()
    }

    /// Write each destination's documents.
    ///
    /// Destinations without a writer are skipped with a warning. Failures
    /// never surface as errors; they are reported in the returned results,
    /// sorted by destination then entity type.
    #[instrument(skip(self, documents), fields(destinations = documents.len()))]
    pub async fn write(
        &self,
        documents: &BTreeMap<Destination, DocumentsByEntity>,
    ) -> Vec<WriteResult> {
        for destination in documents.keys() {
            if !self.writers.iter().any(|w| w.destination() == *destination) {
                warn!(destination = %destination, "No writer configured for destination");
            }
        }

        let results = Mutex::new(Vec::new());
        let tasks = self.writers.iter().filter_map(|writer| {
            documents
                .get(&writer.destination())
                .map(|docs| self.write_destination(writer.as_ref(), docs, &results))
        });
        join_all(tasks).await;

        let mut results = results.into_inner();
        results.sort_by_key(|r| (r.destination, r.entity_type));
        results
    }

    /// Entity types in an order where every prerequisite present comes first.
    pub fn write_order(
        destination: Destination,
        entity_types: impl IntoIterator<Item = EntityType>,
    ) -> Vec<EntityType> {
        let mut remaining: Vec<EntityType> = entity_types.into_iter().collect();
        remaining.sort();
        remaining.dedup();

        let mut ordered = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let ready = remaining.iter().position(|entity_type| {
                destination
                    .prerequisites(*entity_type)
                    .iter()
                    .all(|p| ordered.contains(p) || !remaining.contains(p))
            });
            // Prerequisites are acyclic; the fallback only guards the loop.
            let next = remaining.remove(ready.unwrap_or(0));
            ordered.push(next);
        }
        ordered
    }

    async fn write_destination(
        &self,
        writer: &dyn Writer,
        documents: &DocumentsByEntity,
        results: &Mutex<Vec<WriteResult>>,
    ) {
        let destination = writer.destination();
        let order = Self::write_order(destination, documents.keys().copied());

        let mut aborted = match writer.validate_connection().await {
            Ok(true) => {
                info!(destination = %destination, "Destination connection validated");
                None
            }
            Ok(false) => Some("destination not ready".to_string()),
            Err(err) => Some(err.to_string()),
        };
        if let Some(reason) = &aborted {
            error!(destination = %destination, reason = %reason, "Destination unavailable, skipping its writes");
        }

        for entity_type in order {
            let docs = documents
                .get(&entity_type)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let result = match &aborted {
                Some(reason) => Self::abandoned(destination, entity_type, docs, reason),
                None => {
                    let (result, fatal) = self.write_unit(writer, entity_type, docs).await;
                    if let Some(reason) = fatal {
                        error!(
                            destination = %destination,
                            entity_type = %entity_type,
                            reason = %reason,
                            "Fatal writer error, aborting destination"
                        );
                        aborted = Some(reason);
                    }
                    result
                }
            };

            info!(
                destination = %destination,
                entity_type = %entity_type,
                attempted = result.attempted,
                succeeded = result.succeeded,
                failed = result.failed(),
                retries = result.retries,
                outcome = ?result.outcome,
                "Write unit finished"
            );
            results.lock().await.push(result);
        }
    }

    /// Write one unit, returning its result and the fatal reason if the
    /// destination must be abandoned.
    async fn write_unit(
        &self,
        writer: &dyn Writer,
        entity_type: EntityType,
        documents: &[GoldDocument],
    ) -> (WriteResult, Option<String>) {
        let destination = writer.destination();
        match self.drive_unit(writer, entity_type, documents).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(destination = %destination, entity_type = %entity_type, error = %err, "Write unit state error");
                let reason = err.to_string();
                (
                    Self::abandoned(destination, entity_type, documents, &reason),
                    Some(reason),
                )
            }
        }
    }

    async fn drive_unit(
        &self,
        writer: &dyn Writer,
        entity_type: EntityType,
        documents: &[GoldDocument],
    ) -> Result<(WriteResult, Option<String>), InvalidTransition> {
        let destination = writer.destination();
        let batch_size = writer.batch_size().max(1);
        let mut unit = WriteUnit::new(destination, entity_type, self.retry.max_retries);
        unit.dispatch(documents.len())?;

        let by_id: HashMap<&str, &GoldDocument> =
            documents.iter().map(|d| (d.id.as_str(), d)).collect();
        let mut round: Cow<'_, [GoldDocument]> = Cow::Borrowed(documents);

        loop {
            for (index, chunk) in round.chunks(batch_size).enumerate() {
                match writer.write_batch(entity_type, chunk).await {
                    Ok(summary) => {
                        debug!(
                            destination = %destination,
                            entity_type = %entity_type,
                            size = chunk.len(),
                            succeeded = summary.succeeded(),
                            "Batch written"
                        );
                        unit.record(&summary)?;
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        let unwritten = round[index * batch_size..].iter().map(|d| d.id.clone());
                        unit.fail_fatal(&reason, unwritten)?;
                        return Ok((unit.into_result()?, Some(reason)));
                    }
                }
            }

            if unit.complete_round()? == UnitState::Succeeded {
                break;
            }

            let retry_ids = unit.plan_retry()?;
            if retry_ids.is_empty() {
                break;
            }

            let delay = self.retry.delay_for(unit.retries());
            warn!(
                destination = %destination,
                entity_type = %entity_type,
                round = unit.retries(),
                count = retry_ids.len(),
                delay_ms = delay.as_millis() as u64,
                "Resubmitting failed documents"
            );
            tokio::time::sleep(delay).await;

            round = Cow::Owned(
                retry_ids
                    .iter()
                    .filter_map(|id| by_id.get(id.as_str()).map(|d| (*d).clone()))
                    .collect(),
            );
        }

        Ok((unit.into_result()?, None))
    }

    /// Result for a unit that is never dispatched because its destination failed.
    fn abandoned(
        destination: Destination,
        entity_type: EntityType,
        documents: &[GoldDocument],
        reason: &str,
    ) -> WriteResult {
        let mut unit = WriteUnit::new(destination, entity_type, 0);
        let ids = documents.iter().map(|d| d.id.clone());
        match unit.fail_fatal(reason, ids).and_then(|_| unit.into_result()) {
            Ok(result) => result,
            // A fresh unit is never terminal, so both transitions hold.
            Err(_) => WriteResult {
                destination,
                entity_type,
                attempted: 0,
                succeeded: 0,
                created: 0,
                updated: 0,
                failures: Vec::new(),
                retries: 0,
                outcome: WriteOutcome::Fatal,
            },
        }
    }
}
