//! # Realty Indexer Pipeline
//!
//! Medallion pipeline for property, neighborhood and article records.
//!
//! ## Architecture
//!
//! 1. **Loader**: reads sources into Bronze records, nested structure intact
//! 2. **Enricher**: promotes filter fields and a correlation id (Silver)
//! 3. **Embedding**: attaches vectors with bounded provider concurrency
//! 4. **Fork / Builders**: decides which Gold shapes each destination needs and builds them
//! 5. **Orchestrator**: writes to every destination with ordering, batching and partial retry
//! 6. **Aggregator**: folds everything into a `RunReport`

pub mod aggregator;
pub mod builders;
pub mod config;
pub mod embedding;
pub mod enricher;
pub mod errors;
pub mod fork;
pub mod loader;
pub mod orchestrator;
pub mod pipeline;

pub use aggregator::{EntityReport, ResultAggregator, RunReport, RunStatus, Tier};
pub use builders::{builder_for, build_documents, BuiltDocuments, DocumentBuilder};
pub use config::{EmbeddingConfig, PipelineConfig, RetryPolicy};
pub use embedding::{
    EmbeddedBatch, EmbeddingProvider, EmbeddingStage, HashingEmbeddingProvider, OpenAiConfig,
    OpenAiEmbeddingProvider,
};
pub use enricher::{EnrichedBatch, Enricher};
pub use errors::{
    DocumentIdentityError, DroppedRecord, EmbeddingError, EmbeddingStageError, EnrichmentError,
    PipelineError, SourceError,
};
pub use fork::{route, EntityPlan, ProcessingPlan};
pub use loader::{BronzeSource, SourceLoader, SourceSpec};
pub use orchestrator::{DocumentsByEntity, WriterOrchestrator};
pub use pipeline::Pipeline;
