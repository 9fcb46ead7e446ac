//! Encyclopedia article documents.

use super::{identity, location, search_text, string_field, string_list, DocumentBuilder};
use crate::errors::DocumentIdentityError;
use realty_indexer_shared::{
    ArticleDocument, DocumentBody, DocumentShape, EmbeddedRecord, EntityType, GoldDocument,
};

pub struct ArticleBuilder;

impl DocumentBuilder for ArticleBuilder {
    fn entity_type(&self) -> EntityType {
        EntityType::Article
    }

    fn build(
        &self,
        record: &EmbeddedRecord,
        shape: DocumentShape,
    ) -> Result<GoldDocument, DocumentIdentityError> {
        let silver = &record.silver;
        let page_id = identity(silver)?;
        let filters = silver.filters();

        let title = string_field(silver, &["title"]);
        let summary = string_field(silver, &["long_summary"]);
        let short_summary = string_field(silver, &["short_summary"]);
        let key_topics = string_list(silver, &["key_topics"]);

        let text = search_text([
            title.clone(),
            summary.clone().or_else(|| short_summary.clone()),
            (!key_topics.is_empty()).then(|| key_topics.join(" ")),
            filters.city.clone(),
            filters.state.clone(),
        ]);

        let document = ArticleDocument {
            page_id: page_id.clone(),
            title,
            url: string_field(silver, &["url"]),
            summary,
            short_summary,
            categories: string_list(silver, &["categories"]),
            key_topics,
            city: filters.city.clone(),
            state: filters.state.clone(),
            location: location(silver),
            relevance_score: filters.relevance_score,
            search_text: text,
            embedding: record.embeddings.first().cloned(),
        };

        Ok(GoldDocument {
            id: page_id,
            entity_type: EntityType::Article,
            shape,
            correlation_id: silver.correlation_id(),
            body: DocumentBody::Article(Box::new(document)),
            relationships: Vec::new(),
        })
    }
}
