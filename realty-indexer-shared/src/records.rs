//! Record tiers: Bronze (as loaded), Silver (enriched) and Embedded.
//!
//! The nested payload read from a source travels unchanged from Bronze to
//! Silver. Later tiers only decorate it: promoted filter fields, a correlation
//! id, and vector attachments.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::entity::EntityType;

/// Nested source payload, exactly as read.
pub type Payload = Map<String, Value>;

/// Schema version stamped on every Bronze record.
pub const BRONZE_SCHEMA_VERSION: u32 = 1;

/// Deterministic identifier derived from entity type and natural id.
///
/// Stable across runs and builds, so destinations can use it to recognise
/// documents they have already stored.
pub fn correlation_id(entity_type: EntityType, natural_id: &str) -> Uuid {
    let mut hasher = Md5::new();
    hasher.update(entity_type.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(natural_id.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}

/// A source record as loaded, before any refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BronzeRecord {
    entity_type: EntityType,
    natural_id: Option<String>,
    payload: Payload,
    schema_version: u32,
    loaded_at: DateTime<Utc>,
}

impl BronzeRecord {
    /// Create a Bronze record from a source payload.
    ///
    /// The natural id is read from the entity type's id field; string and
    /// integer ids are both accepted. Blank ids count as missing.
    pub fn new(entity_type: EntityType, payload: Payload, loaded_at: DateTime<Utc>) -> Self {
        let natural_id = payload
            .get(entity_type.natural_id_field())
            .and_then(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        Self {
            entity_type,
            natural_id,
            payload,
            schema_version: BRONZE_SCHEMA_VERSION,
            loaded_at,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn natural_id(&self) -> Option<&str> {
        self.natural_id.as_deref()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Scalar fields promoted to the top level of a Silver record for filtering.
///
/// Every field is derivable from the nested payload; absent inputs leave the
/// field unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// `price / square_feet`, present only when both are known and the area is positive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_sqft: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_household_income: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_home_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walkability_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// An enriched record: the Bronze payload, untouched, plus filter fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilverRecord {
    entity_type: EntityType,
    natural_id: String,
    correlation_id: Uuid,
    payload: Payload,
    filters: FilterFields,
    schema_version: u32,
    loaded_at: DateTime<Utc>,
}

impl SilverRecord {
    /// Wrap a Bronze payload. The correlation id is computed here.
    pub fn new(bronze: BronzeRecord, natural_id: String, filters: FilterFields) -> Self {
        Self {
            entity_type: bronze.entity_type,
            correlation_id: correlation_id(bronze.entity_type, &natural_id),
            natural_id,
            payload: bronze.payload,
            filters,
            schema_version: bronze.schema_version,
            loaded_at: bronze.loaded_at,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn natural_id(&self) -> &str {
        &self.natural_id
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// The nested payload exactly as loaded.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn filters(&self) -> &FilterFields {
        &self.filters
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Read a string at a nested path (e.g. `["address", "city"]`).
    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        value_at(&self.payload, path).and_then(Value::as_str)
    }

    /// Read a nested value at a path.
    pub fn value_at(&self, path: &[&str]) -> Option<&Value> {
        value_at(&self.payload, path)
    }
}

fn value_at<'a>(payload: &'a Payload, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = payload.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

/// A named vector attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorAttachment {
    /// Attachment name, e.g. `description_embedding`.
    pub name: String,
    /// Identifier of the provider/model that produced the vector.
    pub provider: String,
    pub dimension: usize,
    pub vector: Vec<f32>,
}

/// A Silver record with zero or more vector attachments.
///
/// Records without embeddable text carry no attachment rather than a
/// placeholder vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedRecord {
    pub silver: SilverRecord,
    pub embeddings: Vec<VectorAttachment>,
}

impl EmbeddedRecord {
    /// Pass a Silver record through without any embedding.
    pub fn unembedded(silver: SilverRecord) -> Self {
        Self {
            silver,
            embeddings: Vec::new(),
        }
    }

    pub fn with_embedding(silver: SilverRecord, attachment: VectorAttachment) -> Self {
        Self {
            silver,
            embeddings: vec![attachment],
        }
    }

    pub fn embedding(&self, name: &str) -> Option<&VectorAttachment> {
        self.embeddings.iter().find(|a| a.name == name)
    }

    pub fn entity_type(&self) -> EntityType {
        self.silver.entity_type()
    }

    pub fn natural_id(&self) -> &str {
        self.silver.natural_id()
    }
}
