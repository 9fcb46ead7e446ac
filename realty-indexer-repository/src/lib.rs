//! # Realty Indexer Repository
//!
//! Destination writers for the Gold tier and the backends behind them: an
//! OpenSearch provider for search, graph and columnar stores, and the
//! `Writer` trait the orchestrator drives.

pub mod columnar;
pub mod config;
pub mod errors;
pub mod graph;
pub mod interfaces;
pub mod opensearch;
pub mod types;
pub mod writers;

pub use columnar::{FileColumnarStore, InMemoryColumnarStore};
pub use config::{collection_name, SearchWriterConfig, WriterConfig};
pub use errors::{SearchIndexError, StoreError, WriterError};
pub use graph::InMemoryGraphStore;
pub use interfaces::{ColumnarStore, GraphEdge, GraphNode, GraphStore, SearchIndexProvider, Writer};
pub use opensearch::OpenSearchClient;
pub use types::{BatchItemResult, BatchSummary, ItemStatus};
pub use writers::{ColumnarWriter, GraphWriter, SearchIndexWriter};
