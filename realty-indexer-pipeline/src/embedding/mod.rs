//! Embedding stage.
//!
//! Extracts embeddable text per record, sends it to the provider in ordered
//! batches with a bounded number of requests in flight, and attaches the
//! returned vectors to the records they came from.

mod extractors;
mod hashing;
mod openai;
mod provider;

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, instrument, warn};

use crate::config::EmbeddingConfig;
use crate::errors::{EmbeddingError, EmbeddingStageError};
use realty_indexer_shared::{EmbeddedRecord, SilverRecord, VectorAttachment};

pub use extractors::{
    extractor_for, ArticleTextExtractor, NeighborhoodTextExtractor, PropertyTextExtractor,
    TextExtractor,
};
pub use hashing::HashingEmbeddingProvider;
pub use openai::{OpenAiConfig, OpenAiEmbeddingProvider};
pub use provider::EmbeddingProvider;

/// Texts of one provider call, with the positions of the records they belong to.
struct TextBatch {
    positions: Vec<usize>,
    texts: Vec<String>,
}

enum BatchOutcome {
    Embedded(Vec<Vec<f32>>),
    /// Retries ran out; the records pass through unembedded.
    GaveUp(EmbeddingError),
}

/// Output of the embedding stage for one set of records.
#[derive(Debug, Default)]
pub struct EmbeddedBatch {
    /// One record per input, in input order.
    pub records: Vec<EmbeddedRecord>,
    /// Records that received a vector.
    pub embedded: usize,
    /// Records with no embeddable text.
    pub skipped: usize,
    /// Natural ids of records whose batch exhausted its retries.
    pub failed_ids: Vec<String>,
    /// Number of provider calls made, retries included.
    pub calls: usize,
}

/// Attaches embeddings to Silver records.
pub struct EmbeddingStage {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
}

impl EmbeddingStage {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Self {
        Self { provider, config }
    }

    /// Texts per provider call: the configured size, never above the provider's limit.
    pub fn effective_batch_size(&self) -> usize {
        self.config
            .batch_size
            .min(self.provider.max_batch_size())
            .max(1)
    }

    /// Embed every record that has embeddable text.
    ///
    /// A batch that keeps failing with a retryable error is given up on and
    /// its records pass through without a vector. A fatal provider error
    /// aborts the whole stage.
    #[instrument(skip(self, records), fields(count = records.len(), provider = %self.provider.name()))]
    pub async fn embed(
        &self,
        records: Vec<SilverRecord>,
    ) -> Result<EmbeddedBatch, EmbeddingStageError> {
        let texts: Vec<Option<String>> = records
            .iter()
            .map(|record| extractor_for(record.entity_type()).extract(record))
            .collect();

        let batches = Self::batch_texts(texts, self.effective_batch_size());
        let batch_count = batches.len();

        // `buffered` stops pulling new batches once `max_in_flight` are pending
        // and yields results in submission order.
        let outcomes: Vec<(TextBatch, BatchOutcome, usize)> = stream::iter(batches)
            .map(|batch| self.embed_with_retry(batch))
            .buffered(self.config.max_in_flight.max(1))
            .try_collect()
            .await?;

        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; records.len()];
        let mut gave_up = vec![false; records.len()];
        let mut calls = 0;
        for (batch, outcome, attempts) in outcomes {
            calls += attempts;
            match outcome {
                BatchOutcome::Embedded(batch_vectors) => {
                    for (position, vector) in batch.positions.into_iter().zip(batch_vectors) {
                        vectors[position] = Some(vector);
                    }
                }
                BatchOutcome::GaveUp(_) => {
                    for position in batch.positions {
                        gave_up[position] = true;
                    }
                }
            }
        }

        let mut result = EmbeddedBatch {
            calls,
            ..Default::default()
        };
        for ((record, vector), gave_up) in records.into_iter().zip(vectors).zip(gave_up) {
            match vector {
                Some(vector) => {
                    result.embedded += 1;
                    let attachment = VectorAttachment {
                        name: self.config.attachment_name.clone(),
                        provider: self.provider.name().to_string(),
                        dimension: vector.len(),
                        vector,
                    };
                    result.records.push(EmbeddedRecord::with_embedding(record, attachment));
                }
                None => {
                    if gave_up {
                        result.failed_ids.push(record.natural_id().to_string());
                    } else {
                        result.skipped += 1;
                    }
                    result.records.push(EmbeddedRecord::unembedded(record));
                }
            }
        }

        info!(
            batches = batch_count,
            calls = result.calls,
            embedded = result.embedded,
            skipped = result.skipped,
            failed = result.failed_ids.len(),
            "Embedding stage complete"
        );
        Ok(result)
    }

    /// Group the records with text into batches of at most `batch_size`, in order.
    fn batch_texts(texts: Vec<Option<String>>, batch_size: usize) -> Vec<TextBatch> {
        let with_text: Vec<(usize, String)> = texts
            .into_iter()
            .enumerate()
            .filter_map(|(position, text)| text.map(|t| (position, t)))
            .collect();

        with_text
            .chunks(batch_size)
            .map(|chunk| TextBatch {
                positions: chunk.iter().map(|(p, _)| *p).collect(),
                texts: chunk.iter().map(|(_, t)| t.clone()).collect(),
            })
            .collect()
    }

    /// Call the provider for one batch, retrying retryable errors with backoff.
    ///
    /// Returns the batch, its outcome and the number of calls made.
    async fn embed_with_retry(
        &self,
        batch: TextBatch,
    ) -> Result<(TextBatch, BatchOutcome, usize), EmbeddingStageError> {
        let policy = self.config.retry;
        let mut attempt = 0u32;

        loop {
            let result = self
                .provider
                .embed(&batch.texts)
                .await
                .and_then(|vectors| self.check_contract(&batch, vectors));

            match result {
                Ok(vectors) => {
                    if attempt > 0 {
                        info!(attempt, count = batch.texts.len(), "Embedding succeeded after retry");
                    }
                    let calls = attempt as usize + 1;
                    return Ok((batch, BatchOutcome::Embedded(vectors), calls));
                }
                Err(err) if !err.is_retryable() => {
                    warn!(error = %err, "Fatal embedding error");
                    return Err(EmbeddingStageError::Fatal(err));
                }
                Err(err) if attempt >= policy.max_retries => {
                    warn!(
                        error = %err,
                        count = batch.texts.len(),
                        "Embedding batch exhausted retries, passing records through unembedded"
                    );
                    let calls = attempt as usize + 1;
                    return Ok((batch, BatchOutcome::GaveUp(err), calls));
                }
                Err(err) => {
                    attempt += 1;
                    let delay = policy.delay_for(attempt);
                    debug!(
                        attempt,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Embedding batch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn check_contract(
        &self,
        batch: &TextBatch,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if vectors.len() != batch.texts.len() {
            return Err(EmbeddingError::contract(format!(
                "{} vectors returned for {} texts",
                vectors.len(),
                batch.texts.len()
            )));
        }
        let dimension = self.provider.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(EmbeddingError::contract(format!(
                "vector of length {} from a provider declaring {}",
                bad.len(),
                dimension
            )));
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use async_trait::async_trait;
    use chrono::Utc;
    use realty_indexer_shared::{BronzeRecord, EntityType, FilterFields};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Scripted provider: pops a result per call, defaulting to success.
    struct MockProvider {
        script: Mutex<VecDeque<EmbeddingError>>,
        calls: AtomicUsize,
        max_batch: usize,
    }

    impl MockProvider {
        fn new(max_batch: usize, failures: Vec<EmbeddingError>) -> Self {
            Self {
                script: Mutex::new(failures.into()),
                calls: AtomicUsize::new(0),
                max_batch,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn dimension(&self) -> usize {
            2
        }

        fn max_batch_size(&self) -> usize {
            self.max_batch
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.script.lock().await.pop_front() {
                return Err(err);
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 0.0]).collect())
        }
    }

    fn silver(id: &str, description: Option<&str>) -> SilverRecord {
        let mut value = json!({ "listing_id": id });
        if let (Some(text), Value::Object(map)) = (description, &mut value) {
            map.insert("description".to_string(), json!(text));
        }
        let Value::Object(payload) = value else {
            unreachable!("object literal")
        };
        let bronze = BronzeRecord::new(EntityType::Property, payload, Utc::now());
        SilverRecord::new(bronze, id.to_string(), FilterFields::default())
    }

    fn config(max_retries: u32) -> EmbeddingConfig {
        EmbeddingConfig {
            batch_size: 10,
            max_in_flight: 2,
            retry: RetryPolicy::new(max_retries, 100, 1000),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_records_without_text_pass_through() {
        let provider = Arc::new(MockProvider::new(10, vec![]));
        let stage = EmbeddingStage::new(provider.clone(), config(0));

        let batch = stage
            .embed(vec![silver("P1", Some("abc")), silver("P2", None), silver("P3", Some("abcdef"))])
            .await
            .unwrap();

        assert_eq!(batch.records.len(), 3);
        assert_eq!(batch.embedded, 2);
        assert_eq!(batch.skipped, 1);
        assert!(batch.records[1].embeddings.is_empty());
        assert_eq!(batch.records[2].embeddings[0].vector, vec![6.0, 0.0]);
        assert_eq!(batch.records[2].embeddings[0].name, "description_embedding");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried() {
        let provider = Arc::new(MockProvider::new(
            10,
            vec![EmbeddingError::rate_limited("429"), EmbeddingError::rate_limited("429")],
        ));
        let stage = EmbeddingStage::new(provider.clone(), config(3));

        let batch = stage.embed(vec![silver("P1", Some("abc"))]).await.unwrap();

        assert_eq!(batch.embedded, 1);
        assert_eq!(batch.calls, 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_pass_records_through() {
        let provider = Arc::new(MockProvider::new(
            10,
            vec![EmbeddingError::transient("503"), EmbeddingError::transient("503")],
        ));
        let stage = EmbeddingStage::new(provider, config(1));

        let batch = stage
            .embed(vec![silver("P1", Some("abc")), silver("P2", Some("def"))])
            .await
            .unwrap();

        assert_eq!(batch.embedded, 0);
        assert_eq!(batch.failed_ids, vec!["P1".to_string(), "P2".to_string()]);
        assert!(batch.records.iter().all(|r| r.embeddings.is_empty()));
    }

    #[tokio::test]
    async fn test_only_given_up_batches_are_reported_failed() {
        let provider = Arc::new(MockProvider::new(1, vec![EmbeddingError::transient("503")]));
        let stage = EmbeddingStage::new(
            provider,
            EmbeddingConfig {
                max_in_flight: 1,
                ..config(0)
            },
        );

        let batch = stage
            .embed(vec![silver("P1", Some("abc")), silver("P2", None), silver("P3", Some("def"))])
            .await
            .unwrap();

        assert_eq!(batch.failed_ids, vec!["P1".to_string()]);
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.embedded, 1);
        assert_eq!(batch.records[2].embeddings.len(), 1);
    }

    #[tokio::test]
    async fn test_authentication_error_aborts_stage() {
        let provider = Arc::new(MockProvider::new(
            10,
            vec![EmbeddingError::authentication("401")],
        ));
        let stage = EmbeddingStage::new(provider, config(3));

        let result = stage.embed(vec![silver("P1", Some("abc"))]).await;

        assert_eq!(
            result.unwrap_err(),
            EmbeddingStageError::Fatal(EmbeddingError::authentication("401"))
        );
    }

    #[test]
    fn test_effective_batch_size_respects_provider_limit() {
        let stage = EmbeddingStage::new(Arc::new(MockProvider::new(4, vec![])), config(0));
        assert_eq!(stage.effective_batch_size(), 4);
    }
}
