//! Run configuration.
//!
//! A `PipelineConfig` is built once and passed by reference through every
//! stage; nothing reads configuration from ambient state.

use std::collections::BTreeSet;
use std::time::Duration;

use realty_indexer_repository::{SearchWriterConfig, WriterConfig};
use realty_indexer_shared::Destination;

/// Exponential backoff bounded by an attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before retry number `retry` (1-based): doubles each time, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(63);
        let delay_ms = self.initial_delay_ms.saturating_mul(1u64 << doublings);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Embedding stage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Upper bound on texts per call; the provider's own limit also applies.
    pub batch_size: usize,
    /// Maximum number of batch requests in flight at once.
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
    /// Name given to the vector attachment on each record.
    pub attachment_name: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_in_flight: 4,
            retry: RetryPolicy::default(),
            attachment_name: "description_embedding".to_string(),
        }
    }
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub destinations: BTreeSet<Destination>,
    /// Send Silver records straight to the columnar store instead of Gold documents.
    pub columnar_receives_silver: bool,
    pub embedding: EmbeddingConfig,
    /// Retry rounds for failed documents within a write unit.
    pub write_retry: RetryPolicy,
    pub columnar: WriterConfig,
    pub graph: WriterConfig,
    pub search: SearchWriterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            destinations: BTreeSet::from([Destination::Columnar]),
            columnar_receives_silver: false,
            embedding: EmbeddingConfig::default(),
            write_retry: RetryPolicy::default(),
            columnar: WriterConfig::for_destination(Destination::Columnar),
            graph: WriterConfig::for_destination(Destination::Graph),
            search: SearchWriterConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Configuration writing to exactly `destinations`, defaults elsewhere.
    pub fn with_destinations(destinations: impl IntoIterator<Item = Destination>) -> Self {
        Self {
            destinations: destinations.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn is_enabled(&self, destination: Destination) -> bool {
        self.destinations.contains(&destination)
    }
}
