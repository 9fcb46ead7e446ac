//! Filter fields for encyclopedia articles.

use super::{coordinates_at, number_at, string_at, Denormalizer};
use realty_indexer_shared::{EntityType, FilterFields, Payload};

pub struct ArticleDenormalizer;

impl Denormalizer for ArticleDenormalizer {
    fn entity_type(&self) -> EntityType {
        EntityType::Article
    }

    fn promote(&self, payload: &Payload) -> FilterFields {
        let coordinates = coordinates_at(payload, &[&["coordinates"], &["location"]]);

        FilterFields {
            city: string_at(payload, &[&["best_city"], &["location", "city"]]),
            state: string_at(payload, &[&["best_state"], &["location", "state"]]),
            relevance_score: number_at(payload, &[&["relevance_score"], &["relevance", "score"]]),
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

    #[test]
    fn test_promotes_best_location() {
        let Value::Object(payload) = json!({
            "page_id": 4242,
            "title": "Deer Valley",
            "best_city": "Park City",
            "best_state": "Utah",
            "relevance_score": 0.87,
            "location": { "latitude": 40.63, "longitude": -111.48 }
        }) else {
            unreachable!("object literal")
        };

        let filters = ArticleDenormalizer.promote(&payload);

        assert_eq!(filters.city.as_deref(), Some("Park City"));
        assert_eq!(filters.state.as_deref(), Some("Utah"));
        assert_eq!(filters.relevance_score, Some(0.87));
        assert_eq!(filters.latitude, Some(40.63));
    }
}
