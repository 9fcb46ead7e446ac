//! Filter fields for neighborhood profiles.

use super::{coordinates_at, number_at, string_at, Denormalizer};
use realty_indexer_shared::{EntityType, FilterFields, Payload};

pub struct NeighborhoodDenormalizer;

impl Denormalizer for NeighborhoodDenormalizer {
    fn entity_type(&self) -> EntityType {
        EntityType::Neighborhood
    }

    fn promote(&self, payload: &Payload) -> FilterFields {
        let coordinates = coordinates_at(payload, &[&["coordinates"], &["location"]]);

        FilterFields {
            city: string_at(payload, &[&["city"], &["address", "city"]]),
            state: string_at(payload, &[&["state"], &["address", "state"]]),
            neighborhood_id: string_at(payload, &[&["neighborhood_id"]]),
            neighborhood_name: string_at(payload, &[&["name"]]),
            population: number_at(payload, &[&["demographics", "population"]]),
            median_household_income: number_at(
                payload,
                &[&["demographics", "median_household_income"], &["median_household_income"]],
            ),
            median_home_price: number_at(
                payload,
                &[&["median_home_price"], &["demographics", "median_home_price"]],
            ),
            walkability_score: number_at(payload, &[&["walkability_score"]]),
            latitude: coordinates.and_then(|c| c.latitude),
            longitude: coordinates.and_then(|c| c.longitude),
            ..Default::default()
        }
    }
}
