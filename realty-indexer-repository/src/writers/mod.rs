//! `Writer` implementations, one per destination.

pub mod columnar;
pub mod graph;
pub mod search;

pub use columnar::ColumnarWriter;
pub use graph::{node_label, GraphWriter};
pub use search::SearchIndexWriter;
