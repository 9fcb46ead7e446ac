//! Traits at the seams between the writers and their backends.

pub mod columnar_store;
pub mod graph_store;
pub mod search_index_provider;
pub mod writer;

pub use columnar_store::ColumnarStore;
pub use graph_store::{GraphEdge, GraphNode, GraphStore};
pub use search_index_provider::SearchIndexProvider;
pub use writer::Writer;
