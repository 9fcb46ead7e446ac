//! Bronze to Silver enrichment.
//!
//! Each entity type owns a `Denormalizer` that reads filter fields from known
//! nested paths. The payload itself is moved into the Silver record untouched.

mod article;
mod neighborhood;
mod property;

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::errors::{DroppedRecord, EnrichmentError};
use realty_indexer_shared::composites::{decode, lenient};
use realty_indexer_shared::{BronzeRecord, Coordinates, EntityType, FilterFields, Payload, SilverRecord};

pub use article::ArticleDenormalizer;
pub use neighborhood::NeighborhoodDenormalizer;
pub use property::PropertyDenormalizer;

/// Promotes an entity type's filter fields out of its nested payload.
///
/// Implementations are pure: the result depends on the payload alone.
pub trait Denormalizer: Send + Sync {
    fn entity_type(&self) -> EntityType;

    fn promote(&self, payload: &Payload) -> FilterFields;
}

/// The denormalizer for an entity type.
pub fn denormalizer_for(entity_type: EntityType) -> &'static dyn Denormalizer {
    match entity_type {
        EntityType::Property => &PropertyDenormalizer,
        EntityType::Neighborhood => &NeighborhoodDenormalizer,
        EntityType::Article => &ArticleDenormalizer,
    }
}

/// Output of enriching one entity type's records.
#[derive(Debug, Default)]
pub struct EnrichedBatch {
    pub records: Vec<SilverRecord>,
    pub dropped: Vec<DroppedRecord>,
}

/// Turns Bronze records into Silver records.
#[derive(Debug, Clone, Default)]
pub struct Enricher;

impl Enricher {
    pub fn new() -> Self {
        Self
    }

    /// Enrich a single record.
    ///
    /// Only a missing natural id is an error; any other missing input simply
    /// leaves the corresponding filter field unset.
    pub fn enrich(&self, bronze: BronzeRecord) -> Result<SilverRecord, EnrichmentError> {
        let entity_type = bronze.entity_type();
        let natural_id = bronze
            .natural_id()
            .map(str::to_string)
            .ok_or(EnrichmentError::MissingNaturalId {
                entity_type,
                field: entity_type.natural_id_field(),
            })?;

        let filters = denormalizer_for(entity_type).promote(bronze.payload());
        Ok(SilverRecord::new(bronze, natural_id, filters))
    }

    /// Enrich every record in parallel, keeping input order.
    ///
    /// Records that fail are logged and dropped; the batch always completes.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub fn enrich_all(&self, records: Vec<BronzeRecord>) -> EnrichedBatch {
        let results: Vec<Result<SilverRecord, EnrichmentError>> = records
            .into_par_iter()
            .map(|record| self.enrich(record))
            .collect();

        let mut batch = EnrichedBatch::default();
        for (position, result) in results.into_iter().enumerate() {
            match result {
                Ok(silver) => batch.records.push(silver),
                Err(err) => {
                    warn!(position, error = %err, "Dropping record that failed enrichment");
                    batch.dropped.push(DroppedRecord::new(format!("#{}", position), err));
                }
            }
        }

        debug!(
            enriched = batch.records.len(),
            dropped = batch.dropped.len(),
            "Enrichment complete"
        );
        batch
    }
}

/// First value found at any of `paths`.
fn first_at<'a>(payload: &'a Payload, paths: &[&[&str]]) -> Option<&'a Value> {
    paths.iter().find_map(|path| {
        let (first, rest) = path.split_first()?;
        let mut current = payload.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        (!current.is_null()).then_some(current)
    })
}

pub(crate) fn number_at(payload: &Payload, paths: &[&[&str]]) -> Option<f64> {
    paths
        .iter()
        .find_map(|path| first_at(payload, &[*path]).and_then(lenient::as_f64))
}

pub(crate) fn string_at(payload: &Payload, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .find_map(|path| first_at(payload, &[*path]).and_then(lenient::as_string))
}

/// Coordinates from the first of `paths` holding a latitude/longitude object.
pub(crate) fn coordinates_at(payload: &Payload, paths: &[&[&str]]) -> Option<Coordinates> {
    paths.iter().find_map(|path| {
        decode::<Coordinates>(first_at(payload, &[*path]))
            .filter(|c| c.latitude.is_some() && c.longitude.is_some())
    })
}

/// `numerator / denominator` when both are present and the denominator is positive.
pub(crate) fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn bronze(entity_type: EntityType, value: Value) -> BronzeRecord {
        match value {
            Value::Object(map) => BronzeRecord::new(entity_type, map, Utc::now()),
            _ => unreachable!("test payloads are objects"),
        }
    }

    #[test]
    fn test_enrich_keeps_nested_payload_identical() {
        let payload = json!({
            "listing_id": "P1",
            "listing_price": 750000,
            "address": { "street": "12 Oak Ln", "city": "Park City", "state": "UT", "zip": "84060" },
            "property_details": { "bedrooms": 3, "bathrooms": 2.5, "square_feet": 1500 },
            "price_history": [{ "date": "2023-01-01", "price": 700000 }],
            "unknown_block": { "deep": { "deeper": [1, 2, 3] } }
        });

        let silver = Enricher::new()
            .enrich(bronze(EntityType::Property, payload.clone()))
            .unwrap();

        assert_eq!(Value::Object(silver.payload().clone()), payload);
        assert_eq!(silver.natural_id(), "P1");
        assert_eq!(silver.filters().city.as_deref(), Some("Park City"));
        assert_eq!(silver.filters().price_per_sqft, Some(500.0));
    }

    #[test]
    fn test_missing_natural_id_is_an_error() {
        let result = Enricher::new().enrich(bronze(
            EntityType::Neighborhood,
            json!({ "name": "Old Town", "demographics": {} }),
        ));

        assert_eq!(
            result.unwrap_err(),
            EnrichmentError::MissingNaturalId {
                entity_type: EntityType::Neighborhood,
                field: "neighborhood_id"
            }
        );
    }

    #[test]
    fn test_enrich_all_drops_and_continues() {
        let records = vec![
            bronze(EntityType::Article, json!({ "page_id": 1, "title": "A" })),
            bronze(EntityType::Article, json!({ "title": "No id" })),
            bronze(EntityType::Article, json!({ "page_id": 3, "title": "C" })),
        ];

        let batch = Enricher::new().enrich_all(records);

        let ids: Vec<&str> = batch.records.iter().map(|r| r.natural_id()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(batch.dropped.len(), 1);
        assert_eq!(batch.dropped[0].id, "#1");
    }

    #[test]
    fn test_correlation_id_is_deterministic() {
        let enricher = Enricher::new();
        let a = enricher
            .enrich(bronze(EntityType::Property, json!({ "listing_id": "P7" })))
            .unwrap();
        let b = enricher
            .enrich(bronze(EntityType::Property, json!({ "listing_id": "P7", "extra": true })))
            .unwrap();
        let other_type = enricher
            .enrich(bronze(EntityType::Neighborhood, json!({ "neighborhood_id": "P7" })))
            .unwrap();

        assert_eq!(a.correlation_id(), b.correlation_id());
        assert_ne!(a.correlation_id(), other_type.correlation_id());
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(Some(10.0), Some(4.0)), Some(2.5));
        assert_eq!(ratio(Some(10.0), Some(0.0)), None);
        assert_eq!(ratio(None, Some(4.0)), None);
        assert_eq!(ratio(Some(10.0), None), None);
    }
}
