//! In-process columnar store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::errors::StoreError;
use crate::interfaces::ColumnarStore;
use crate::types::ItemStatus;

/// A `ColumnarStore` keeping one keyed table per entity type in memory.
#[derive(Default)]
pub struct InMemoryColumnarStore {
    tables: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl InMemoryColumnarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    pub async fn row(&self, table: &str, key: &str) -> Option<Value> {
        self.tables
            .lock()
            .await
            .get(table)
            .and_then(|rows| rows.get(key).cloned())
    }
}

#[async_trait]
impl ColumnarStore for InMemoryColumnarStore {
    async fn check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_rows(
        &self,
        table: &str,
        rows: Vec<(String, Value)>,
    ) -> Result<Vec<ItemStatus>, StoreError> {
        let mut tables = self.tables.lock().await;
        let table = tables.entry(table.to_string()).or_default();

        Ok(rows
            .into_iter()
            .map(|(key, row)| match table.insert(key, row) {
                Some(_) => ItemStatus::Updated,
                None => ItemStatus::Created,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_replaces_by_key() {
        let store = InMemoryColumnarStore::new();

        let first = store
            .upsert_rows("properties", vec![("P1".to_string(), json!({ "price": 1 }))])
            .await
            .unwrap();
        let second = store
            .upsert_rows("properties", vec![("P1".to_string(), json!({ "price": 2 }))])
            .await
            .unwrap();

        assert_eq!(first, vec![ItemStatus::Created]);
        assert_eq!(second, vec![ItemStatus::Updated]);
        assert_eq!(store.row_count("properties").await, 1);
        assert_eq!(store.row("properties", "P1").await, Some(json!({ "price": 2 })));
    }
}
