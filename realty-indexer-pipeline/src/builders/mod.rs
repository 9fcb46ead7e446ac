//! Silver/Embedded to Gold document builders.
//!
//! One builder per entity type, selected once by `builder_for`. Builders are
//! pure: they read a single record and never perform I/O.

mod article;
mod neighborhood;
mod passthrough;
mod property;

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::errors::{DocumentIdentityError, DroppedRecord};
use crate::fork::EntityPlan;
use realty_indexer_shared::composites::lenient;
use realty_indexer_shared::{
    Coordinates, DocumentShape, EmbeddedRecord, EntityType, GoldDocument, SilverRecord,
};

pub use article::ArticleBuilder;
pub use neighborhood::NeighborhoodBuilder;
pub use passthrough::PassthroughBuilder;
pub use property::PropertyBuilder;

/// Builds Gold documents for one entity type.
pub trait DocumentBuilder: Send + Sync {
    fn entity_type(&self) -> EntityType;

    /// Build the document for `shape`.
    ///
    /// Fails only when the identity field is missing; absent optional fields
    /// are omitted from the document.
    fn build(
        &self,
        record: &EmbeddedRecord,
        shape: DocumentShape,
    ) -> Result<GoldDocument, DocumentIdentityError>;
}

/// The builder for an entity type.
pub fn builder_for(entity_type: EntityType) -> &'static dyn DocumentBuilder {
    match entity_type {
        EntityType::Property => &PropertyBuilder,
        EntityType::Neighborhood => &NeighborhoodBuilder,
        EntityType::Article => &ArticleBuilder,
    }
}

/// Documents built for one entity type, grouped by shape, in record order.
#[derive(Debug, Default)]
pub struct BuiltDocuments {
    pub by_shape: BTreeMap<DocumentShape, Vec<GoldDocument>>,
    /// Silver passthrough documents for the columnar store.
    pub passthrough: Vec<GoldDocument>,
    pub dropped: Vec<DroppedRecord>,
}

impl BuiltDocuments {
    pub fn built(&self) -> usize {
        self.by_shape.values().map(Vec::len).sum::<usize>() + self.passthrough.len()
    }
}

/// Build every shape in `plan` for each record, in parallel.
///
/// A record whose identity is missing is dropped from every shape.
#[instrument(skip(records, plan), fields(entity_type = %entity_type, count = records.len()))]
pub fn build_documents(
    entity_type: EntityType,
    records: &[EmbeddedRecord],
    plan: &EntityPlan,
) -> BuiltDocuments {
    let builder = builder_for(entity_type);
    let passthrough = PassthroughBuilder::new(entity_type);

    let results: Vec<Result<(Vec<GoldDocument>, Option<GoldDocument>), DocumentIdentityError>> =
        records
            .par_iter()
            .map(|record| {
                let shaped = plan
                    .shapes
                    .iter()
                    .map(|shape| builder.build(record, *shape))
                    .collect::<Result<Vec<_>, _>>()?;
                let silver = if plan.silver_passthrough {
                    Some(passthrough.build(record, DocumentShape::Columnar)?)
                } else {
                    None
                };
                Ok((shaped, silver))
            })
            .collect();

    let mut built = BuiltDocuments::default();
    for (record, result) in records.iter().zip(results) {
        match result {
            Ok((shaped, silver)) => {
                for document in shaped {
                    built.by_shape.entry(document.shape).or_default().push(document);
                }
                built.passthrough.extend(silver);
            }
            Err(err) => {
                warn!(id = %record.natural_id(), error = %err, "Dropping record without document identity");
                built.dropped.push(DroppedRecord::new(record_label(record), err));
            }
        }
    }

    debug!(built = built.built(), dropped = built.dropped.len(), "Documents built");
    built
}

fn record_label(record: &EmbeddedRecord) -> String {
    match record.natural_id().trim() {
        "" => format!("{}:<missing>", record.entity_type()),
        id => id.to_string(),
    }
}

/// The record's natural id, or an identity error naming the id field.
pub(crate) fn identity(record: &SilverRecord) -> Result<String, DocumentIdentityError> {
    let entity_type = record.entity_type();
    match record.natural_id().trim() {
        "" => Err(DocumentIdentityError {
            entity_type,
            field: entity_type.natural_id_field(),
        }),
        id => Ok(id.to_string()),
    }
}

pub(crate) fn string_field(record: &SilverRecord, path: &[&str]) -> Option<String> {
    record.value_at(path).and_then(lenient::as_string)
}

pub(crate) fn number_field(record: &SilverRecord, path: &[&str]) -> Option<f64> {
    record.value_at(path).and_then(lenient::as_f64)
}

/// String items of an array field; non-string items are skipped.
pub(crate) fn string_list(record: &SilverRecord, path: &[&str]) -> Vec<String> {
    record
        .value_at(path)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(lenient::as_string).collect())
        .unwrap_or_default()
}

/// `[lon, lat]` from the promoted coordinates.
pub(crate) fn location(record: &SilverRecord) -> Option<[f64; 2]> {
    let filters = record.filters();
    Coordinates {
        latitude: filters.latitude,
        longitude: filters.longitude,
    }
    .lon_lat()
}

/// Join non-empty parts into a single search string.
pub(crate) fn search_text<I>(parts: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    parts
        .into_iter()
        .flatten()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole numbers print without a fractional part.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
