//! Embedding provider trait definition.

use async_trait::async_trait;

use crate::errors::EmbeddingError;

/// A capability turning texts into fixed-size vectors.
///
/// Implementations return exactly one vector per input text, in input order,
/// each of length `dimension()`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier recorded on every vector this provider produces.
    fn name(&self) -> &str;

    /// Length of every returned vector.
    fn dimension(&self) -> usize;

    /// Largest number of texts accepted in one `embed` call.
    fn max_batch_size(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}
