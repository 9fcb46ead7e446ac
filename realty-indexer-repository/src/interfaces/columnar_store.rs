//! Columnar store trait definition.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StoreError;
use crate::types::ItemStatus;

/// Table-oriented analytical storage.
#[async_trait]
pub trait ColumnarStore: Send + Sync {
    /// Verify the store can be written to.
    async fn check(&self) -> Result<(), StoreError>;

    /// Upsert `(key, row)` pairs into `table`, replacing rows with the same key.
    ///
    /// Returns one status per row, in input order.
    async fn upsert_rows(
        &self,
        table: &str,
        rows: Vec<(String, Value)>,
    ) -> Result<Vec<ItemStatus>, StoreError>;
}
