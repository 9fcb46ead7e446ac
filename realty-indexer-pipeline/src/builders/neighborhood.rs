//! Neighborhood profile documents.

use serde_json::Value;

use super::{identity, location, search_text, string_field, string_list, DocumentBuilder};
use crate::errors::DocumentIdentityError;
use realty_indexer_shared::{
    DocumentBody, DocumentShape, EmbeddedRecord, EntityType, GoldDocument, Nested,
    NeighborhoodDocument,
};

pub struct NeighborhoodBuilder;

impl DocumentBuilder for NeighborhoodBuilder {
    fn entity_type(&self) -> EntityType {
        EntityType::Neighborhood
    }

    fn build(
        &self,
        record: &EmbeddedRecord,
        shape: DocumentShape,
    ) -> Result<GoldDocument, DocumentIdentityError> {
        let silver = &record.silver;
        let neighborhood_id = identity(silver)?;
        let filters = silver.filters();

        let name = string_field(silver, &["name"]);
        let description = string_field(silver, &["description"]);
        let amenities = string_list(silver, &["amenities"]);
        let lifestyle_tags = string_list(silver, &["lifestyle_tags"]);

        let text = search_text([
            name.clone(),
            description.clone(),
            filters.city.clone(),
            filters.state.clone(),
            (!lifestyle_tags.is_empty()).then(|| lifestyle_tags.join(" ")),
            (!amenities.is_empty()).then(|| amenities.join(" ")),
        ]);

        let document = NeighborhoodDocument {
            neighborhood_id: neighborhood_id.clone(),
            name,
            city: filters.city.clone(),
            county: string_field(silver, &["county"]),
            state: filters.state.clone(),
            location: location(silver),
            demographics: Nested::from_value(silver.value_at(&["demographics"])),
            school_ratings: Nested::from_value(silver.value_at(&["school_ratings"])),
            median_home_price: filters.median_home_price,
            walkability_score: filters.walkability_score,
            description,
            amenities,
            lifestyle_tags,
            wikipedia_correlations: silver
                .value_at(&["wikipedia_correlations"])
                .and_then(Value::as_object)
                .cloned(),
            search_text: text,
            embedding: record.embeddings.first().cloned(),
        };

        Ok(GoldDocument {
            id: neighborhood_id,
            entity_type: EntityType::Neighborhood,
            shape,
            correlation_id: silver.correlation_id(),
            body: DocumentBody::Neighborhood(Box::new(document)),
            relationships: Vec::new(),
        })
    }
}
