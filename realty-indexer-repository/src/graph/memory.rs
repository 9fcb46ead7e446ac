//! In-process graph store.
//!
//! Keeps nodes and edges in memory and records the order nodes were written,
//! which is what the dependency-ordering guarantees are checked against.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::StoreError;
use crate::interfaces::{GraphEdge, GraphNode, GraphStore};
use crate::types::ItemStatus;

#[derive(Default)]
struct GraphState {
    nodes: HashMap<(String, String), GraphNode>,
    edges: BTreeSet<(String, String, String, String, String)>,
    write_log: Vec<(String, String)>,
}

/// A `GraphStore` held entirely in memory.
pub struct InMemoryGraphStore {
    state: Mutex<GraphState>,
    available: AtomicBool,
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GraphState::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("graph store is offline"))
        }
    }

    pub async fn node(&self, label: &str, id: &str) -> Option<GraphNode> {
        let state = self.state.lock().await;
        state.nodes.get(&(label.to_string(), id.to_string())).cloned()
    }

    pub async fn node_count(&self, label: &str) -> usize {
        let state = self.state.lock().await;
        state.nodes.keys().filter(|(l, _)| l == label).count()
    }

    pub async fn edges(&self) -> Vec<GraphEdge> {
        let state = self.state.lock().await;
        state
            .edges
            .iter()
            .map(|(kind, from_label, from_id, to_label, to_id)| GraphEdge {
                kind: kind.clone(),
                from_label: from_label.clone(),
                from_id: from_id.clone(),
                to_label: to_label.clone(),
                to_id: to_id.clone(),
            })
            .collect()
    }

    /// Every node write as `(label, id)`, in the order it happened.
    pub async fn write_log(&self) -> Vec<(String, String)> {
        self.state.lock().await.write_log.clone()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_available()
    }

    async fn upsert_node(&self, node: GraphNode) -> Result<ItemStatus, StoreError> {
        self.ensure_available()?;

        let mut state = self.state.lock().await;
        state.write_log.push((node.label.clone(), node.id.clone()));
        let key = (node.label.clone(), node.id.clone());
        let status = match state.nodes.insert(key, node) {
            Some(_) => ItemStatus::Updated,
            None => ItemStatus::Created,
        };
        Ok(status)
    }

    async fn merge_edge(&self, edge: GraphEdge) -> Result<(), StoreError> {
        self.ensure_available()?;

        let mut state = self.state.lock().await;
        for (label, id) in [(&edge.from_label, &edge.from_id), (&edge.to_label, &edge.to_id)] {
            if !state.nodes.contains_key(&(label.clone(), id.clone())) {
                return Err(StoreError::missing_reference(format!(
                    "{} node '{}' does not exist",
                    label, id
                )));
            }
        }

        debug!(kind = %edge.kind, from = %edge.from_id, to = %edge.to_id, "Merged edge");
        state.edges.insert((
            edge.kind,
            edge.from_label,
            edge.from_id,
            edge.to_label,
            edge.to_id,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn node(label: &str, id: &str) -> GraphNode {
        GraphNode {
            label: label.to_string(),
            id: id.to_string(),
            properties: Map::new(),
        }
    }

    fn edge(from: &str, to: &str) -> GraphEdge {
        GraphEdge {
            kind: "IN_NEIGHBORHOOD".to_string(),
            from_label: "Property".to_string(),
            from_id: from.to_string(),
            to_label: "Neighborhood".to_string(),
            to_id: to.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_node_is_idempotent() {
        let store = InMemoryGraphStore::new();

        assert_eq!(store.upsert_node(node("Neighborhood", "N1")).await.unwrap(), ItemStatus::Created);
        assert_eq!(store.upsert_node(node("Neighborhood", "N1")).await.unwrap(), ItemStatus::Updated);
        assert_eq!(store.node_count("Neighborhood").await, 1);
        assert_eq!(store.write_log().await.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_edge_requires_both_endpoints() {
        let store = InMemoryGraphStore::new();
        store.upsert_node(node("Property", "P1")).await.unwrap();

        let result = store.merge_edge(edge("P1", "N1")).await;
        assert!(matches!(result, Err(StoreError::MissingReference(_))));

        store.upsert_node(node("Neighborhood", "N1")).await.unwrap();
        store.merge_edge(edge("P1", "N1")).await.unwrap();
        store.merge_edge(edge("P1", "N1")).await.unwrap();
        assert_eq!(store.edges().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = InMemoryGraphStore::new();
        store.set_available(false);

        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        assert!(store.upsert_node(node("Property", "P1")).await.is_err());
    }
}
