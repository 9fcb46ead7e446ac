//! Gold documents: entity-specific, destination-oriented structures.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::composites::{Address, Demographics, Nested, Parking, PropertyDetails, SchoolRatings};
use crate::entity::{DocumentShape, EntityType};
use crate::records::{FilterFields, Payload, VectorAttachment};

/// Listing document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDocument {
    pub listing_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Nested<Address>>,
    /// `[lon, lat]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_details: Option<Nested<PropertyDetails>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parking: Option<Parking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<f64>,
    /// Renamed from the source's `listing_price`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_sqft: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_on_market: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_tour_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_history: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<VectorAttachment>,
}

/// Neighborhood profile document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodDocument {
    pub neighborhood_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// `[lon, lat]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demographics: Option<Nested<Demographics>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_ratings: Option<Nested<SchoolRatings>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_home_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walkability_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lifestyle_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikipedia_correlations: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<VectorAttachment>,
}

/// Encyclopedia article document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleDocument {
    pub page_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Renamed from the source's `long_summary`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_topics: Vec<String>,
    /// Renamed from the source's `best_city`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Renamed from the source's `best_state`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// `[lon, lat]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<VectorAttachment>,
}

/// A Silver-tier record handed to a destination without document building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassthroughDocument {
    pub payload: Payload,
    pub filters: FilterFields,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeddings: Vec<VectorAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentBody {
    Property(Box<PropertyDocument>),
    Neighborhood(Box<NeighborhoodDocument>),
    Article(Box<ArticleDocument>),
    Passthrough(Box<PassthroughDocument>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    InNeighborhood,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::InNeighborhood => "IN_NEIGHBORHOOD",
        }
    }
}

/// A reference to another entity, resolved by id at write time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub target_type: EntityType,
    pub target_id: String,
}

/// A destination-ready document built from exactly one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldDocument {
    /// Destination-agnostic identifier, used by every destination as the upsert key.
    pub id: String,
    pub entity_type: EntityType,
    pub shape: DocumentShape,
    pub correlation_id: Uuid,
    pub body: DocumentBody,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl GoldDocument {
    /// Flat JSON view for destinations: the body's fields plus identity fields.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(&self.body)?;
        if let Value::Object(ref mut map) = value {
            map.insert("id".to_string(), json!(self.id));
            map.insert("entity_type".to_string(), json!(self.entity_type));
            map.insert("correlation_id".to_string(), json!(self.correlation_id));
        }
        Ok(value)
    }

    pub fn embedding(&self) -> Option<&VectorAttachment> {
        match &self.body {
            DocumentBody::Property(doc) => doc.embedding.as_ref(),
            DocumentBody::Neighborhood(doc) => doc.embedding.as_ref(),
            DocumentBody::Article(doc) => doc.embedding.as_ref(),
            DocumentBody::Passthrough(doc) => doc.embeddings.first(),
        }
    }
}
