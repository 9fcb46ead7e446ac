//! Graph store backends.

pub mod memory;

pub use memory::InMemoryGraphStore;
