//! Error types for the realty indexer repository.

mod search_index_error;
mod store_error;
mod writer_error;

pub use search_index_error::SearchIndexError;
pub use store_error::StoreError;
pub use writer_error::WriterError;
