//! Entity, destination and document-shape vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an entity type or destination name fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseNameError {
    kind: &'static str,
    value: String,
}

/// The record families handled by the pipeline.
///
/// The declaration order is also the default processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Neighborhood,
    Property,
    Article,
}

impl EntityType {
    /// Every entity type, in processing order.
    pub const ALL: [EntityType; 3] = [
        EntityType::Neighborhood,
        EntityType::Property,
        EntityType::Article,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Property => "property",
            EntityType::Neighborhood => "neighborhood",
            EntityType::Article => "article",
        }
    }

    /// Top-level key holding the natural identifier of a source record.
    pub fn natural_id_field(&self) -> &'static str {
        match self {
            EntityType::Property => "listing_id",
            EntityType::Neighborhood => "neighborhood_id",
            EntityType::Article => "page_id",
        }
    }

    /// Top-level keys that identify a source record as belonging to this type.
    ///
    /// A record must carry at least one of them.
    pub fn signature_fields(&self) -> &'static [&'static str] {
        match self {
            EntityType::Property => &["listing_id", "property_details"],
            EntityType::Neighborhood => &["neighborhood_id", "demographics"],
            EntityType::Article => &["page_id", "title"],
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "property" | "properties" => Ok(EntityType::Property),
            "neighborhood" | "neighborhoods" => Ok(EntityType::Neighborhood),
            "article" | "articles" | "wikipedia" => Ok(EntityType::Article),
            other => Err(ParseNameError {
                kind: "entity type",
                value: other.to_string(),
            }),
        }
    }
}

/// Storage destinations the pipeline can fan out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Columnar file store.
    Columnar,
    /// Full-text / vector search engine.
    Search,
    /// Graph database.
    Graph,
}

impl Destination {
    pub const ALL: [Destination; 3] = [
        Destination::Columnar,
        Destination::Search,
        Destination::Graph,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Columnar => "columnar",
            Destination::Search => "search",
            Destination::Graph => "graph",
        }
    }

    /// The document shape this destination consumes.
    pub fn shape(&self) -> DocumentShape {
        match self {
            Destination::Columnar => DocumentShape::Columnar,
            Destination::Search => DocumentShape::Search,
            Destination::Graph => DocumentShape::Graph,
        }
    }

    /// Entity types that must reach a terminal state on this destination
    /// before `entity_type` may be written to it.
    ///
    /// Only the graph destination resolves references by id lookup, so it is
    /// the only one with prerequisites.
    pub fn prerequisites(&self, entity_type: EntityType) -> &'static [EntityType] {
        match (self, entity_type) {
            (Destination::Graph, EntityType::Property) => &[EntityType::Neighborhood],
            _ => &[],
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "columnar" | "parquet" => Ok(Destination::Columnar),
            "search" | "opensearch" | "elasticsearch" => Ok(Destination::Search),
            "graph" | "neo4j" => Ok(Destination::Graph),
            other => Err(ParseNameError {
                kind: "destination",
                value: other.to_string(),
            }),
        }
    }
}

/// Destination-oriented layout of a Gold document.
///
/// The same entity may be built into several shapes in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentShape {
    Columnar,
    Search,
    Graph,
}

impl DocumentShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentShape::Columnar => "columnar",
            DocumentShape::Search => "search",
            DocumentShape::Graph => "graph",
        }
    }
}

impl fmt::Display for DocumentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
