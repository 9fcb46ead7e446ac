//! Filter fields for property listings.

use super::{coordinates_at, number_at, ratio, string_at, Denormalizer};
use realty_indexer_shared::{EntityType, FilterFields, Payload};

pub struct PropertyDenormalizer;

impl Denormalizer for PropertyDenormalizer {
    fn entity_type(&self) -> EntityType {
        EntityType::Property
    }

    fn promote(&self, payload: &Payload) -> FilterFields {
        let square_feet = number_at(payload, &[&["property_details", "square_feet"], &["square_feet"]]);
        let price = number_at(payload, &[&["listing_price"], &["price"]]);
        let coordinates = coordinates_at(payload, &[&["coordinates"], &["address", "location"]]);

        FilterFields {
            city: string_at(payload, &[&["address", "city"]]),
            state: string_at(payload, &[&["address", "state"]]),
            zip_code: string_at(payload, &[&["address", "zip"], &["address", "zip_code"]]),
            neighborhood_id: string_at(payload, &[&["neighborhood_id"], &["neighborhood", "id"]]),
            neighborhood_name: string_at(
                payload,
                &[&["neighborhood", "name"], &["neighborhood_name"]],
            ),
            property_type: string_at(
                payload,
                &[&["property_details", "property_type"], &["property_type"]],
            ),
            bedrooms: number_at(payload, &[&["property_details", "bedrooms"], &["bedrooms"]]),
            bathrooms: number_at(payload, &[&["property_details", "bathrooms"], &["bathrooms"]]),
            square_feet,
            price,
            price_per_sqft: ratio(price, square_feet),
            latitude: coordinates.and_then(|c| c.latitude),
            longitude: coordinates.and_then(|c| c.longitude),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    #[test]
    fn test_promotes_nested_fields() {
        let filters = PropertyDenormalizer.promote(&payload(json!({
            "listing_id": "P1",
            "neighborhood_id": "N1",
            "listing_price": "1,200,000",
            "address": { "city": "Salt Lake City", "state": "UT", "zip_code": 84101 },
            "coordinates": { "latitude": 40.76, "longitude": -111.89 },
            "property_details": { "bedrooms": 4, "bathrooms": 3, "square_feet": 2400, "property_type": "single_family" }
        })));

        assert_eq!(filters.city.as_deref(), Some("Salt Lake City"));
        assert_eq!(filters.zip_code.as_deref(), Some("84101"));
        assert_eq!(filters.neighborhood_id.as_deref(), Some("N1"));
        assert_eq!(filters.bedrooms, Some(4.0));
        assert_eq!(filters.property_type.as_deref(), Some("single_family"));
        assert_eq!(filters.price, Some(1_200_000.0));
        assert_eq!(filters.price_per_sqft, Some(500.0));
        assert_eq!(filters.latitude, Some(40.76));
        assert_eq!(filters.longitude, Some(-111.89));
    }

    #[test]
    fn test_price_per_sqft_absent_without_area() {
        let zero_area = PropertyDenormalizer.promote(&payload(json!({
            "listing_id": "P1",
            "listing_price": 500000,
            "property_details": { "square_feet": 0 }
        })));
        assert_eq!(zero_area.price, Some(500000.0));
        assert_eq!(zero_area.price_per_sqft, None);

        let no_price = PropertyDenormalizer.promote(&payload(json!({
            "listing_id": "P2",
            "property_details": { "square_feet": 1000 }
        })));
        assert_eq!(no_price.price_per_sqft, None);
    }
}
