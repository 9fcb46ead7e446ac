//! Graph store trait definition.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::StoreError;
use crate::types::ItemStatus;

/// A labelled node, keyed by `(label, id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub label: String,
    pub id: String,
    pub properties: Map<String, Value>,
}

/// A typed, directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphEdge {
    pub kind: String,
    pub from_label: String,
    pub from_id: String,
    pub to_label: String,
    pub to_id: String,
}

/// Minimal operations the graph writer needs from a graph database.
///
/// Both writes are merges: repeating them changes nothing.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Verify the store is reachable and the credentials are accepted.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Merge a node, returning whether it was created or updated.
    async fn upsert_node(&self, node: GraphNode) -> Result<ItemStatus, StoreError>;

    /// Merge an edge. Both endpoints must already exist; a missing endpoint
    /// yields `StoreError::MissingReference`.
    async fn merge_edge(&self, edge: GraphEdge) -> Result<(), StoreError>;
}
