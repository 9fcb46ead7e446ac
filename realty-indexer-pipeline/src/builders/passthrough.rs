//! Silver records wrapped for the columnar store.

use super::{identity, DocumentBuilder};
use crate::errors::DocumentIdentityError;
use realty_indexer_shared::{
    DocumentBody, DocumentShape, EmbeddedRecord, EntityType, GoldDocument, PassthroughDocument,
};

/// Carries the Silver payload and filter fields as-is, without building an
/// entity document.
pub struct PassthroughBuilder {
    entity_type: EntityType,
}

impl PassthroughBuilder {
    pub fn new(entity_type: EntityType) -> Self {
        Self { entity_type }
    }
}

impl DocumentBuilder for PassthroughBuilder {
    fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    fn build(
        &self,
        record: &EmbeddedRecord,
        shape: DocumentShape,
    ) -> Result<GoldDocument, DocumentIdentityError> {
        let silver = &record.silver;
        let id = identity(silver)?;

        Ok(GoldDocument {
            id,
            entity_type: self.entity_type,
            shape,
            correlation_id: silver.correlation_id(),
            body: DocumentBody::Passthrough(Box::new(PassthroughDocument {
                payload: silver.payload().clone(),
                filters: silver.filters().clone(),
                embeddings: record.embeddings.clone(),
            })),
            relationships: Vec::new(),
        })
    }
}
