//! Property listing documents.

use super::{
    format_number, identity, location, number_field, search_text, string_field, string_list,
    DocumentBuilder,
};
use crate::errors::DocumentIdentityError;
use realty_indexer_shared::{
    Address, DocumentBody, DocumentShape, EmbeddedRecord, EntityType, GoldDocument, Nested,
    Parking, PropertyDetails, PropertyDocument, Relationship, RelationshipKind,
};

pub struct PropertyBuilder;

impl DocumentBuilder for PropertyBuilder {
    fn entity_type(&self) -> EntityType {
        EntityType::Property
    }

    fn build(
        &self,
        record: &EmbeddedRecord,
        shape: DocumentShape,
    ) -> Result<GoldDocument, DocumentIdentityError> {
        let silver = &record.silver;
        let listing_id = identity(silver)?;
        let filters = silver.filters();

        let address: Option<Nested<Address>> = Nested::from_value(silver.value_at(&["address"]));
        let property_details: Option<Nested<PropertyDetails>> =
            Nested::from_value(silver.value_at(&["property_details"]));
        let parking = property_details
            .as_ref()
            .and_then(|details| Parking::from_garage_spaces(details.garage_spaces));

        let description = string_field(silver, &["description"]);
        let features = string_list(silver, &["features"]);
        let amenities = string_list(silver, &["amenities"]);

        let rooms = match (filters.bedrooms, filters.bathrooms) {
            (Some(beds), Some(baths)) => Some(format!(
                "{} bed {} bath",
                format_number(beds),
                format_number(baths)
            )),
            (Some(beds), None) => Some(format!("{} bed", format_number(beds))),
            _ => None,
        };
        let text = search_text([
            description.clone(),
            filters.property_type.clone(),
            rooms,
            filters.neighborhood_name.clone(),
            filters.city.clone(),
            filters.state.clone(),
            (!features.is_empty()).then(|| features.join(" ")),
            (!amenities.is_empty()).then(|| amenities.join(" ")),
        ]);

        let relationships = match (shape, &filters.neighborhood_id) {
            (DocumentShape::Graph, Some(neighborhood_id)) => vec![Relationship {
                kind: RelationshipKind::InNeighborhood,
                target_type: EntityType::Neighborhood,
                target_id: neighborhood_id.clone(),
            }],
            _ => Vec::new(),
        };

        let document = PropertyDocument {
            listing_id: listing_id.clone(),
            neighborhood_id: filters.neighborhood_id.clone(),
            neighborhood_name: filters.neighborhood_name.clone(),
            address,
            location: location(silver),
            property_details,
            parking,
            property_type: filters.property_type.clone(),
            bedrooms: filters.bedrooms,
            bathrooms: filters.bathrooms,
            square_feet: filters.square_feet,
            price: filters.price,
            price_per_sqft: filters.price_per_sqft,
            description,
            features,
            amenities,
            listing_date: string_field(silver, &["listing_date"]),
            days_on_market: number_field(silver, &["days_on_market"]),
            virtual_tour_url: string_field(silver, &["virtual_tour_url"]),
            images: string_list(silver, &["images"]),
            price_history: silver.value_at(&["price_history"]).filter(|v| !v.is_null()).cloned(),
            search_text: text,
            embedding: record.embeddings.first().cloned(),
        };

        Ok(GoldDocument {
            id: listing_id,
            entity_type: EntityType::Property,
            shape,
            correlation_id: silver.correlation_id(),
            body: DocumentBody::Property(Box::new(document)),
            relationships,
        })
    }
}
