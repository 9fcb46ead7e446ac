//! File-backed columnar store.
//!
//! Each table is a JSON-lines file `<dir>/<table>.jsonl` holding one keyed row
//! per line. An upsert rewrites the table through a temporary file and a
//! rename, so readers never observe a half-written table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::errors::StoreError;
use crate::interfaces::ColumnarStore;
use crate::types::ItemStatus;

#[derive(Debug, Serialize, Deserialize)]
struct StoredRow {
    key: String,
    row: Value,
}

/// A `ColumnarStore` writing one JSON-lines partition per table.
pub struct FileColumnarStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles on the table files.
    write_lock: Mutex<()>,
}

impl FileColumnarStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", table))
    }

    async fn load(path: &Path) -> Result<Vec<StoredRow>, StoreError> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    StoreError::rejected(format!("corrupt row in {}: {}", path.display(), e))
                })
            })
            .collect()
    }

    /// Read every row of a table, in file order.
    pub async fn read_table(&self, table: &str) -> Result<Vec<(String, Value)>, StoreError> {
        Ok(Self::load(&self.table_path(table))
            .await?
            .into_iter()
            .map(|stored| (stored.key, stored.row))
            .collect())
    }
}

#[async_trait]
impl ColumnarStore for FileColumnarStore {
    async fn check(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let metadata = fs::metadata(&self.dir).await?;
        if metadata.permissions().readonly() {
            return Err(StoreError::unavailable(format!(
                "{} is read-only",
                self.dir.display()
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert_rows(
        &self,
        table: &str,
        rows: Vec<(String, Value)>,
    ) -> Result<Vec<ItemStatus>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.table_path(table);

        let mut stored = Self::load(&path).await?;
        let mut positions: HashMap<String, usize> = stored
            .iter()
            .enumerate()
            .map(|(i, row)| (row.key.clone(), i))
            .collect();

        let mut statuses = Vec::with_capacity(rows.len());
        for (key, row) in rows {
            match positions.get(&key) {
                Some(&i) => {
                    stored[i].row = row;
                    statuses.push(ItemStatus::Updated);
                }
                None => {
                    positions.insert(key.clone(), stored.len());
                    stored.push(StoredRow { key, row });
                    statuses.push(ItemStatus::Created);
                }
            }
        }

        let mut contents = String::new();
        for row in &stored {
            let line = serde_json::to_string(row)
                .map_err(|e| StoreError::rejected(format!("unserializable row: {}", e)))?;
            contents.push_str(&line);
            contents.push('\n');
        }

        fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("jsonl.tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, &path).await?;

        debug!(table, rows = stored.len(), "Rewrote table");
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_rewrites_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileColumnarStore::new(dir.path());
        store.check().await.unwrap();

        let statuses = store
            .upsert_rows(
                "neighborhoods",
                vec![
                    ("N1".to_string(), json!({ "name": "Pacific Heights" })),
                    ("N2".to_string(), json!({ "name": "Mission" })),
                ],
            )
            .await
            .unwrap();
        assert_eq!(statuses, vec![ItemStatus::Created, ItemStatus::Created]);

        let statuses = store
            .upsert_rows(
                "neighborhoods",
                vec![("N1".to_string(), json!({ "name": "Pacific Heights West" }))],
            )
            .await
            .unwrap();
        assert_eq!(statuses, vec![ItemStatus::Updated]);

        let rows = store.read_table("neighborhoods").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "N1");
        assert_eq!(rows[0].1["name"], "Pacific Heights West");
        assert!(!store.table_path("neighborhoods").with_extension("jsonl.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_table_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileColumnarStore::new(dir.path());
        assert!(store.read_table("wiki_articles").await.unwrap().is_empty());
    }
}
