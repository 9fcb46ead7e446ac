//! OpenSearch index configuration and mappings.
//!
//! One index per entity type. Nested composites are mapped as `object` so
//! they keep their structure, `location` is a `geo_point` and `embedding` a
//! `knn_vector` sized to the embedding provider.

use serde_json::{json, Value};

use realty_indexer_shared::EntityType;

/// Settings shared by every index.
fn base_settings() -> Value {
    json!({
        "number_of_shards": 1,
        "number_of_replicas": 1,
        "index.knn": true
    })
}

fn embedding_mapping(dimension: usize) -> Value {
    json!({
        "properties": {
            "name": { "type": "keyword" },
            "provider": { "type": "keyword" },
            "dimension": { "type": "integer" },
            "vector": {
                "type": "knn_vector",
                "dimension": dimension
            }
        }
    })
}

fn address_mapping() -> Value {
    json!({
        "type": "object",
        "properties": {
            "street": { "type": "text" },
            "city": { "type": "keyword" },
            "county": { "type": "keyword" },
            "state": { "type": "keyword" },
            "zip": { "type": "keyword" }
        }
    })
}

fn property_mappings(dimension: usize) -> Value {
    json!({
        "dynamic": true,
        "properties": {
            "id": { "type": "keyword" },
            "entity_type": { "type": "keyword" },
            "correlation_id": { "type": "keyword" },
            "listing_id": { "type": "keyword" },
            "neighborhood_id": { "type": "keyword" },
            "neighborhood_name": { "type": "keyword" },
            "address": address_mapping(),
            "location": { "type": "geo_point" },
            "property_details": {
                "type": "object",
                "properties": {
                    "square_feet": { "type": "float" },
                    "bedrooms": { "type": "float" },
                    "bathrooms": { "type": "float" },
                    "property_type": { "type": "keyword" },
                    "year_built": { "type": "integer" },
                    "lot_size": { "type": "float" },
                    "stories": { "type": "float" },
                    "garage_spaces": { "type": "float" }
                }
            },
            "parking": {
                "type": "object",
                "properties": {
                    "spaces": { "type": "integer" },
                    "garage": { "type": "boolean" }
                }
            },
            "property_type": { "type": "keyword" },
            "bedrooms": { "type": "float" },
            "bathrooms": { "type": "float" },
            "square_feet": { "type": "float" },
            "price": { "type": "float" },
            "price_per_sqft": { "type": "float" },
            "description": { "type": "text" },
            "features": { "type": "keyword" },
            "amenities": { "type": "keyword" },
            "listing_date": { "type": "date", "ignore_malformed": true },
            "days_on_market": { "type": "integer" },
            "virtual_tour_url": { "type": "keyword", "index": false },
            "images": { "type": "keyword", "index": false },
            "price_history": { "type": "object", "enabled": false },
            "search_text": { "type": "text" },
            "embedding": embedding_mapping(dimension)
        }
    })
}

fn neighborhood_mappings(dimension: usize) -> Value {
    json!({
        "dynamic": true,
        "properties": {
            "id": { "type": "keyword" },
            "entity_type": { "type": "keyword" },
            "correlation_id": { "type": "keyword" },
            "neighborhood_id": { "type": "keyword" },
            "name": {
                "type": "text",
                "fields": { "raw": { "type": "keyword" } }
            },
            "city": { "type": "keyword" },
            "county": { "type": "keyword" },
            "state": { "type": "keyword" },
            "location": { "type": "geo_point" },
            "demographics": {
                "type": "object",
                "properties": {
                    "population": { "type": "float" },
                    "median_household_income": { "type": "float" },
                    "median_age": { "type": "float" }
                }
            },
            "school_ratings": {
                "type": "object",
                "properties": {
                    "elementary": { "type": "float" },
                    "middle": { "type": "float" },
                    "high": { "type": "float" }
                }
            },
            "median_home_price": { "type": "float" },
            "walkability_score": { "type": "float" },
            "description": { "type": "text" },
            "amenities": { "type": "keyword" },
            "lifestyle_tags": { "type": "keyword" },
            "wikipedia_correlations": { "type": "object", "enabled": false },
            "search_text": { "type": "text" },
            "embedding": embedding_mapping(dimension)
        }
    })
}

fn article_mappings(dimension: usize) -> Value {
    json!({
        "dynamic": true,
        "properties": {
            "id": { "type": "keyword" },
            "entity_type": { "type": "keyword" },
            "correlation_id": { "type": "keyword" },
            "page_id": { "type": "keyword" },
            "title": {
                "type": "text",
                "fields": { "raw": { "type": "keyword" } }
            },
            "url": { "type": "keyword", "index": false },
            "summary": { "type": "text" },
            "short_summary": { "type": "text" },
            "categories": { "type": "keyword" },
            "key_topics": { "type": "keyword" },
            "city": { "type": "keyword" },
            "state": { "type": "keyword" },
            "location": { "type": "geo_point" },
            "relevance_score": { "type": "float" },
            "search_text": { "type": "text" },
            "embedding": embedding_mapping(dimension)
        }
    })
}

/// Get the index settings and mappings for an entity type's index.
///
/// # Arguments
///
/// * `entity_type` - The entity type stored in the index
/// * `dimension` - Length of the embedding vectors
pub fn index_settings(entity_type: EntityType, dimension: usize) -> Value {
    let mappings = match entity_type {
        EntityType::Property => property_mappings(dimension),
        EntityType::Neighborhood => neighborhood_mappings(dimension),
        EntityType::Article => article_mappings(dimension),
    };

    json!({
        "settings": base_settings(),
        "mappings": mappings
    })
}
