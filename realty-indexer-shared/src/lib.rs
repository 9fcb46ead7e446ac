//! # Realty Indexer Shared
//!
//! Types shared by every tier of the realty indexer: the entity and
//! destination vocabulary, the Bronze/Silver/Embedded record tiers, the
//! destination-oriented Gold documents and the per-destination write results.

pub mod composites;
pub mod documents;
pub mod entity;
pub mod records;
pub mod results;

pub use composites::{
    Address, Coordinates, Demographics, Nested, Parking, PropertyDetails, SchoolRatings,
};
pub use documents::{
    ArticleDocument, DocumentBody, GoldDocument, NeighborhoodDocument, PassthroughDocument,
    PropertyDocument, Relationship, RelationshipKind,
};
pub use entity::{Destination, DocumentShape, EntityType, ParseNameError};
pub use records::{
    correlation_id, BronzeRecord, EmbeddedRecord, FilterFields, Payload, SilverRecord,
    VectorAttachment, BRONZE_SCHEMA_VERSION,
};
pub use results::{DocumentFailure, FailureKind, WriteOutcome, WriteResult};
