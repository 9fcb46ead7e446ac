//! Embeddable text, one extractor per entity type.

use serde_json::Value;

use realty_indexer_shared::{EntityType, SilverRecord};

/// Maximum characters of an article's full text used when it has no summary.
const FULL_TEXT_PREFIX_CHARS: usize = 2000;

/// Derives the text to embed for one entity type.
pub trait TextExtractor: Send + Sync {
    /// `None` when the record has nothing worth embedding.
    fn extract(&self, record: &SilverRecord) -> Option<String>;
}

pub struct PropertyTextExtractor;
pub struct NeighborhoodTextExtractor;
pub struct ArticleTextExtractor;

pub fn extractor_for(entity_type: EntityType) -> &'static dyn TextExtractor {
    match entity_type {
        EntityType::Property => &PropertyTextExtractor,
        EntityType::Neighborhood => &NeighborhoodTextExtractor,
        EntityType::Article => &ArticleTextExtractor,
    }
}

impl TextExtractor for PropertyTextExtractor {
    fn extract(&self, record: &SilverRecord) -> Option<String> {
        join_parts([
            text(record.value_at(&["description"])),
            list(record.value_at(&["features"])),
            list(record.value_at(&["amenities"])),
        ])
    }
}

impl TextExtractor for NeighborhoodTextExtractor {
    fn extract(&self, record: &SilverRecord) -> Option<String> {
        join_parts([
            text(record.value_at(&["name"])),
            text(record.value_at(&["description"])),
            list(record.value_at(&["lifestyle_tags"])),
            list(record.value_at(&["amenities"])),
        ])
    }
}

impl TextExtractor for ArticleTextExtractor {
    fn extract(&self, record: &SilverRecord) -> Option<String> {
        let body = text(record.value_at(&["long_summary"]))
            .or_else(|| text(record.value_at(&["short_summary"])))
            .or_else(|| {
                text(record.value_at(&["full_text"]))
                    .map(|full| full.chars().take(FULL_TEXT_PREFIX_CHARS).collect())
            });

        join_parts([text(record.value_at(&["title"])), body])
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn list(value: Option<&Value>) -> Option<String> {
    let items: Vec<&str> = value
        .and_then(Value::as_array)?
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    (!items.is_empty()).then(|| items.join(", "))
}

/// Join the present parts; `None` if nothing alphanumeric remains.
fn join_parts<const N: usize>(parts: [Option<String>; N]) -> Option<String> {
    let joined = parts.into_iter().flatten().collect::<Vec<_>>().join(". ");
    joined
        .chars()
        .any(char::is_alphanumeric)
        .then_some(joined)
}
