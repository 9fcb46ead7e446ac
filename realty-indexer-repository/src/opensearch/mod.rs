//! OpenSearch backend for the search destination.

pub mod client;
pub mod index_config;

pub use client::OpenSearchClient;
pub use index_config::index_settings;
