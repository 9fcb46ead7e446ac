//! Loader module for the realty indexer pipeline.
//!
//! Reads one entity family from its source and produces Bronze records with
//! the nested structure of every item preserved.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, instrument};

use crate::errors::SourceError;
use realty_indexer_shared::{BronzeRecord, EntityType, Payload};

/// Where a family of source records lives.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    /// A JSON document whose top level is an array of records.
    JsonFile(PathBuf),
    /// One JSON record per line.
    JsonLinesFile(PathBuf),
    /// Records already in memory.
    Inline(Vec<Value>),
}

impl SourceSpec {
    /// Pick the file format from the extension: `.jsonl` and `.ndjson` are
    /// line-delimited, anything else is a JSON array.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("jsonl") | Some("ndjson") => SourceSpec::JsonLinesFile(path),
            _ => SourceSpec::JsonFile(path),
        }
    }
}

/// A loaded, shape-checked source.
///
/// `records()` builds Bronze records on demand and can be called any number
/// of times; each call starts again from the first record.
#[derive(Debug, Clone)]
pub struct BronzeSource {
    entity_type: EntityType,
    items: Arc<Vec<Payload>>,
    loaded_at: DateTime<Utc>,
}

impl BronzeSource {
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = BronzeRecord> + '_ {
        self.items
            .iter()
            .map(move |payload| BronzeRecord::new(self.entity_type, payload.clone(), self.loaded_at))
    }
}

/// Reads sources into `BronzeSource`s.
#[derive(Debug, Clone, Default)]
pub struct SourceLoader;

impl SourceLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and shape-check a source for `entity_type`.
    ///
    /// Every item must be a JSON object carrying at least one of the entity
    /// type's signature fields; a single offending item rejects the source.
    #[instrument(skip(self, spec), fields(entity_type = %entity_type))]
    pub async fn load(
        &self,
        entity_type: EntityType,
        spec: &SourceSpec,
    ) -> Result<BronzeSource, SourceError> {
        let values = match spec {
            SourceSpec::JsonFile(path) => Self::read_json_array(entity_type, path).await?,
            SourceSpec::JsonLinesFile(path) => Self::read_json_lines(path).await?,
            SourceSpec::Inline(values) => values.clone(),
        };

        let items = Self::check_shape(entity_type, values)?;
        info!(count = items.len(), "Loaded source");

        Ok(BronzeSource {
            entity_type,
            items: Arc::new(items),
            loaded_at: Utc::now(),
        })
    }

    async fn read_json_array(
        entity_type: EntityType,
        path: &Path,
    ) -> Result<Vec<Value>, SourceError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&contents)
            .map_err(|e| SourceError::parse(format!("{}: {}", path.display(), e)))?;

        match value {
            Value::Array(items) => Ok(items),
            other => Err(SourceError::schema_mismatch(
                entity_type,
                format!(
                    "{} has a top-level {} instead of an array",
                    path.display(),
                    json_kind(&other)
                ),
            )),
        }
    }

    async fn read_json_lines(path: &Path) -> Result<Vec<Value>, SourceError> {
        let contents = tokio::fs::read_to_string(path).await?;
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| {
                    SourceError::parse(format!("{} line {}: {}", path.display(), n + 1, e))
                })
            })
            .collect()
    }

    fn check_shape(entity_type: EntityType, values: Vec<Value>) -> Result<Vec<Payload>, SourceError> {
        let signature = entity_type.signature_fields();

        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                Value::Object(map) => {
                    if signature.iter().any(|field| map.contains_key(*field)) {
                        Ok(map)
                    } else {
                        Err(SourceError::schema_mismatch(
                            entity_type,
                            format!("item {} has none of the fields {:?}", i, signature),
                        ))
                    }
                }
                other => Err(SourceError::schema_mismatch(
                    entity_type,
                    format!("item {} is a {}, not an object", i, json_kind(&other)),
                )),
            })
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
