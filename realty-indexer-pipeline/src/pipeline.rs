//! Top-level run: load, enrich, embed, build, write.
//!
//! Each tier processes whole collections. The cancellation token is checked
//! after every tier; a cancelled run returns the report built so far.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::aggregator::{ResultAggregator, RunReport, Tier};
use crate::builders::{build_documents, BuiltDocuments};
use crate::config::PipelineConfig;
use crate::embedding::{EmbeddingProvider, EmbeddingStage};
use crate::enricher::Enricher;
use crate::errors::PipelineError;
use crate::fork::{route, ProcessingPlan};
use crate::loader::{BronzeSource, SourceLoader, SourceSpec};
use crate::orchestrator::{DocumentsByEntity, WriterOrchestrator};
use realty_indexer_repository::Writer;
use realty_indexer_shared::{
    Destination, DocumentShape, EmbeddedRecord, EntityType, GoldDocument, SilverRecord,
};

/// One configured pipeline. `run` may be called repeatedly; writes are
/// idempotent upserts so re-runs converge on the same stored state.
pub struct Pipeline {
    config: PipelineConfig,
    sources: BTreeMap<EntityType, SourceSpec>,
    loader: SourceLoader,
    enricher: Enricher,
    embedding: EmbeddingStage,
    orchestrator: WriterOrchestrator,
}

impl Pipeline {
    /// Wire a pipeline. Every enabled destination needs a writer; writers
    /// for disabled destinations are ignored.
    pub fn new(
        config: PipelineConfig,
        sources: BTreeMap<EntityType, SourceSpec>,
        provider: Arc<dyn EmbeddingProvider>,
        writers: Vec<Arc<dyn Writer>>,
    ) -> Result<Self, PipelineError> {
        let writers: Vec<Arc<dyn Writer>> = writers
            .into_iter()
            .filter(|w| config.is_enabled(w.destination()))
            .collect();

        if let Some(missing) = config
            .destinations
            .iter()
            .find(|d| !writers.iter().any(|w| w.destination() == **d))
        {
            return Err(PipelineError::configuration(format!(
                "destination '{}' is enabled but has no writer",
                missing
            )));
        }

        Ok(Self {
            embedding: EmbeddingStage::new(provider, config.embedding.clone()),
            orchestrator: WriterOrchestrator::new(writers, config.write_retry),
            loader: SourceLoader::new(),
            enricher: Enricher::new(),
            sources,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every tier once.
    ///
    /// Only a run where no source loads or a fatal embedding error returns
    /// `Err`; every other failure is recorded in the report.
    #[instrument(skip(self, cancel), fields(sources = self.sources.len()))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport, PipelineError> {
        let plan = route(&self.config);
        let mut aggregator = ResultAggregator::new();
        info!(destinations = ?plan.destinations(), "Starting pipeline run");

        let bronze = self.load(&mut aggregator).await?;
        if cancel.is_cancelled() {
            return Ok(cancelled(aggregator, Tier::Load));
        }

        let silver = self.enrich(bronze, &mut aggregator);
        if cancel.is_cancelled() {
            return Ok(cancelled(aggregator, Tier::Enrich));
        }

        let embedded = self.embed(silver, &mut aggregator).await?;
        if cancel.is_cancelled() {
            return Ok(cancelled(aggregator, Tier::Embed));
        }

        let documents = self.build(&plan, &embedded, &mut aggregator);
        if cancel.is_cancelled() {
            return Ok(cancelled(aggregator, Tier::Build));
        }

        let results = self.orchestrator.write(&documents).await;
        aggregator.record_writes(results);

        Ok(aggregator.finish(None))
    }

    /// Load every source. A source that fails is recorded against its
    /// entity type and the others carry on; the run only fails when no
    /// source loads at all.
    async fn load(
        &self,
        aggregator: &mut ResultAggregator,
    ) -> Result<BTreeMap<EntityType, BronzeSource>, PipelineError> {
        let mut loaded = BTreeMap::new();
        let mut last_error = None;
        for (entity_type, spec) in &self.sources {
            match self.loader.load(*entity_type, spec).await {
                Ok(source) => {
                    aggregator.entity_mut(*entity_type).loaded = source.len();
                    loaded.insert(*entity_type, source);
                }
                Err(err) => {
                    error!(entity_type = %entity_type, error = %err, "Source failed to load, skipping entity type");
                    aggregator.entity_mut(*entity_type).source_error = Some(err.to_string());
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if loaded.is_empty() => Err(err.into()),
            _ => Ok(loaded),
        }
    }

    fn enrich(
        &self,
        bronze: BTreeMap<EntityType, BronzeSource>,
        aggregator: &mut ResultAggregator,
    ) -> BTreeMap<EntityType, Vec<SilverRecord>> {
        bronze
            .into_iter()
            .map(|(entity_type, source)| {
                let batch = self.enricher.enrich_all(source.records().collect());
                let report = aggregator.entity_mut(entity_type);
                report.enriched = batch.records.len();
                report.dropped = batch.dropped;
                (entity_type, batch.records)
            })
            .collect()
    }

    async fn embed(
        &self,
        silver: BTreeMap<EntityType, Vec<SilverRecord>>,
        aggregator: &mut ResultAggregator,
    ) -> Result<BTreeMap<EntityType, Vec<EmbeddedRecord>>, PipelineError> {
        let mut embedded = BTreeMap::new();
        for (entity_type, records) in silver {
            let batch = self.embedding.embed(records).await?;
            let report = aggregator.entity_mut(entity_type);
            report.embedded = batch.embedded;
            report.embedding_skipped = batch.skipped;
            report.embedding_failed = batch.failed_ids;
            embedded.insert(entity_type, batch.records);
        }
        Ok(embedded)
    }

    /// Build the documents each destination receives, following the plan.
    fn build(
        &self,
        plan: &ProcessingPlan,
        embedded: &BTreeMap<EntityType, Vec<EmbeddedRecord>>,
        aggregator: &mut ResultAggregator,
    ) -> BTreeMap<Destination, DocumentsByEntity> {
        let mut by_destination: BTreeMap<Destination, DocumentsByEntity> = BTreeMap::new();
        if !plan.has_output() {
            warn!("No destinations enabled, nothing to write");
            return by_destination;
        }

        for (entity_type, records) in embedded {
            let Some(entity_plan) = plan.entity(*entity_type) else {
                continue;
            };
            let mut built = build_documents(*entity_type, records, entity_plan);
            let report = aggregator.entity_mut(*entity_type);
            report.documents_built = built.built();
            report.documents_dropped = std::mem::take(&mut built.dropped);

            for destination in plan.destinations() {
                let documents = take_for(&mut built, *destination, entity_plan.silver_passthrough);
                by_destination
                    .entry(*destination)
                    .or_default()
                    .insert(*entity_type, documents);
            }
        }
        by_destination
    }
}

/// The documents `destination` consumes out of one entity type's build.
fn take_for(
    built: &mut BuiltDocuments,
    destination: Destination,
    silver_passthrough: bool,
) -> Vec<GoldDocument> {
    if destination == Destination::Columnar && silver_passthrough {
        return std::mem::take(&mut built.passthrough);
    }
    let shape: DocumentShape = destination.shape();
    built.by_shape.remove(&shape).unwrap_or_default()
}

fn cancelled(aggregator: ResultAggregator, after_tier: Tier) -> RunReport {
    warn!(after_tier = %after_tier, "Pipeline run cancelled");
    aggregator.finish(Some(after_tier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbeddingProvider;
    use crate::errors::SourceError;
    use crate::RunStatus;
    use realty_indexer_repository::{
        ColumnarWriter, GraphWriter, InMemoryColumnarStore, InMemoryGraphStore, WriterConfig,
    };
    use serde_json::json;

    fn sources() -> BTreeMap<EntityType, SourceSpec> {
        BTreeMap::from([
            (
                EntityType::Neighborhood,
                SourceSpec::Inline(vec![json!({ "neighborhood_id": "N1", "name": "Old Town" })]),
            ),
            (
                EntityType::Property,
                SourceSpec::Inline(vec![
                    json!({ "listing_id": "P1", "neighborhood_id": "N1", "description": "Cabin" }),
                    json!({ "property_details": { "bedrooms": 2 } }),
                ]),
            ),
        ])
    }

    fn provider() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingEmbeddingProvider::default())
    }

    #[test]
    fn test_enabled_destination_needs_writer() {
        let config = PipelineConfig::with_destinations([Destination::Graph]);
        let result = Pipeline::new(config, sources(), provider(), vec![]);
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_run_reports_dropped_records() {
        let store = Arc::new(InMemoryColumnarStore::new());
        let writer: Arc<dyn Writer> = Arc::new(ColumnarWriter::new(
            store.clone(),
            WriterConfig::for_destination(Destination::Columnar),
        ));
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            sources(),
            provider(),
            vec![writer],
        )
        .unwrap();

        let report = pipeline.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.status, RunStatus::CompletedWithFailures);
        let property = report.entity(EntityType::Property).unwrap();
        assert_eq!(property.loaded, 2);
        assert_eq!(property.enriched, 1);
        assert_eq!(property.dropped[0].id, "#1");
        assert_eq!(property.embedded, 1);
        assert_eq!(store.row_count("properties").await, 1);
        assert_eq!(report.writes.len(), 2);
        assert!(report.writes.iter().all(|w| w.is_success()));
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_writing() {
        let graph = Arc::new(InMemoryGraphStore::new());
        let writer: Arc<dyn Writer> = Arc::new(GraphWriter::new(
            graph.clone(),
            WriterConfig::for_destination(Destination::Graph),
        ));
        let pipeline = Pipeline::new(
            PipelineConfig::with_destinations([Destination::Graph]),
            sources(),
            provider(),
            vec![writer],
        )
        .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = pipeline.run(&cancel).await.unwrap();

        assert_eq!(
            report.status,
            RunStatus::Cancelled {
                after_tier: Tier::Load
            }
        );
        assert!(report.writes.is_empty());
        assert_eq!(graph.node_count("Neighborhood").await, 0);
    }

    fn columnar_pipeline(
        sources: BTreeMap<EntityType, SourceSpec>,
    ) -> (Arc<InMemoryColumnarStore>, Pipeline) {
        let store = Arc::new(InMemoryColumnarStore::new());
        let writer: Arc<dyn Writer> = Arc::new(ColumnarWriter::new(
            store.clone(),
            WriterConfig::for_destination(Destination::Columnar),
        ));
        let pipeline =
            Pipeline::new(PipelineConfig::default(), sources, provider(), vec![writer]).unwrap();
        (store, pipeline)
    }

    #[tokio::test]
    async fn test_bad_source_only_skips_its_entity_type() {
        let mut sources = sources();
        sources.insert(
            EntityType::Article,
            SourceSpec::Inline(vec![json!({ "listing_id": "P1" })]),
        );
        let (store, pipeline) = columnar_pipeline(sources);

        let report = pipeline.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.status, RunStatus::CompletedWithFailures);
        let article = report.entity(EntityType::Article).unwrap();
        assert!(article
            .source_error
            .as_deref()
            .unwrap()
            .contains("Schema mismatch for article source"));
        assert_eq!(article.loaded, 0);
        assert_eq!(store.row_count("properties").await, 1);
        assert_eq!(store.row_count("neighborhoods").await, 1);
        assert!(report
            .writes
            .iter()
            .all(|w| w.entity_type != EntityType::Article));
    }

    #[tokio::test]
    async fn test_run_fails_when_no_source_loads() {
        let sources = BTreeMap::from([(
            EntityType::Article,
            SourceSpec::Inline(vec![json!({ "listing_id": "P1" })]),
        )]);
        let (store, pipeline) = columnar_pipeline(sources);

        let result = pipeline.run(&CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(PipelineError::Source(SourceError::SchemaMismatch { .. }))
        ));
        assert_eq!(store.row_count("wiki_articles").await, 0);
    }
}
