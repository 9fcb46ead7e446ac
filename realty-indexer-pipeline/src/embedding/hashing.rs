//! Deterministic, offline embedding provider.
//!
//! Tokens are hashed into a fixed number of buckets with a signed count and
//! the result is L2-normalised. Equal texts always map to equal vectors.

use async_trait::async_trait;

use super::provider::EmbeddingProvider;
use crate::errors::EmbeddingError;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

pub struct HashingEmbeddingProvider {
    name: String,
    dimension: usize,
    max_batch_size: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize, max_batch_size: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            name: format!("hashing-{}", dimension),
            dimension,
            max_batch_size: max_batch_size.max(1),
        }
    }

    fn fnv1a(token: &str) -> u64 {
        token.bytes().fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        })
    }

    /// `None` when the tokens leave every bucket at zero.
    fn vectorize(&self, text: &str) -> Option<Vec<f32>> {
        let mut vector = vec![0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = Self::fnv1a(&token.to_lowercase());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            return None;
        }
        vector.iter_mut().for_each(|v| *v /= norm);
        Some(vector)
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new(384, 256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.len() > self.max_batch_size {
            return Err(EmbeddingError::malformed_request(format!(
                "batch of {} exceeds maximum {}",
                texts.len(),
                self.max_batch_size
            )));
        }
        texts
            .iter()
            .map(|text| {
                self.vectorize(text).ok_or_else(|| {
                    EmbeddingError::malformed_request(format!("no embeddable tokens in {:?}", text))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vectors_are_deterministic_and_normalized() {
        let provider = HashingEmbeddingProvider::new(32, 10);
        let texts = vec!["Quiet cul-de-sac".to_string(), "quiet CUL de sac".to_string()];

        let vectors = provider.embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 32);
        assert_eq!(vectors[0], vectors[1]);
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_token_less_text_is_refused() {
        let provider = HashingEmbeddingProvider::new(8, 10);
        let result = provider.embed(&["ok".to_string(), "---".to_string()]).await;
        assert!(matches!(result, Err(EmbeddingError::MalformedRequest(_))));
    }

    #[tokio::test]
    async fn test_rejects_oversized_batch() {
        let provider = HashingEmbeddingProvider::new(8, 1);
        let result = provider.embed(&["a".to_string(), "b".to_string()]).await;
        assert!(matches!(result, Err(EmbeddingError::MalformedRequest(_))));
    }
}
