//! Destination writer trait definition.

use async_trait::async_trait;

use crate::errors::WriterError;
use crate::types::BatchSummary;
use realty_indexer_shared::{Destination, EntityType, GoldDocument};

/// A destination that accepts batches of Gold documents.
///
/// Writes are idempotent upserts keyed by document id: writing the same
/// document twice leaves one copy. Per-document problems are reported in the
/// returned `BatchSummary`; an `Err` means the destination is unusable for
/// the rest of the run.
#[async_trait]
pub trait Writer: Send + Sync {
    /// The destination this writer targets.
    fn destination(&self) -> Destination;

    /// Maximum number of documents accepted per `write_batch` call.
    fn batch_size(&self) -> usize;

    /// Check that the destination is reachable and usable.
    ///
    /// `Ok(false)` means reachable but not ready; the orchestrator treats it
    /// like a connectivity failure.
    async fn validate_connection(&self) -> Result<bool, WriterError>;

    /// Upsert one batch of documents of a single entity type.
    async fn write_batch(
        &self,
        entity_type: EntityType,
        documents: &[GoldDocument],
    ) -> Result<BatchSummary, WriterError>;
}
