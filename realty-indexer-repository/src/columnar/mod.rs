//! Columnar store backends.

pub mod file;
pub mod memory;

pub use file::FileColumnarStore;
pub use memory::InMemoryColumnarStore;
