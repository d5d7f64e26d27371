//! Embedding providers and the batching gateway in front of them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::document::EmbeddingVector;
use crate::error::{ProviderResult, RagError, Result};
use crate::retry::{RetryPolicy, call_with_retry};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific embedding backend (OpenAI, a local
/// model, a test double) and report failures as
/// [`ProviderFault`](crate::ProviderFault)s so the gateway can decide
/// whether to retry.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// A short name used in logs and errors.
    fn name(&self) -> &str;

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// The largest number of texts accepted in one request.
    fn max_batch_size(&self) -> usize {
        2048
    }

    /// Generate one embedding per input text, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> ProviderResult<Vec<EmbeddingVector>>;
}

/// Batches, retries and validates calls to an [`EmbeddingProvider`].
///
/// The gateway guarantees one vector per input text in input order, each of
/// the provider's advertised dimensionality, or an error.
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl EmbeddingGateway {
    /// Create a gateway sending at most `batch_size` texts per request
    /// (further capped by the provider's own limit).
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, retry: RetryPolicy) -> Self {
        let batch_size = batch_size.min(provider.max_batch_size()).max(1);
        Self { provider, batch_size, retry }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// The effective batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed every text, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingProvider`] on a non-retryable fault,
    /// exhausted retries, or a response with the wrong number of vectors,
    /// and [`RagError::DimensionMismatch`] if a vector has the wrong length.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_number, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(
                provider = self.provider.name(),
                batch_number,
                batch_size = batch.len(),
                "embedding batch"
            );
            let embedded = self.embed_one_batch(batch).await?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    /// Embed a single query string.
    ///
    /// # Errors
    ///
    /// See [`EmbeddingGateway::embed`].
    pub async fn embed_query(&self, text: &str) -> Result<EmbeddingVector> {
        let mut vectors = self.embed_one_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| RagError::EmbeddingProvider {
            provider: self.provider.name().to_string(),
            message: "provider returned no vector for the query".into(),
        })
    }

    async fn embed_one_batch(&self, batch: &[&str]) -> Result<Vec<EmbeddingVector>> {
        let provider = self.provider.as_ref();
        let name = provider.name();

        let vectors = call_with_retry(&self.retry, name, "embed", move || provider.embed_batch(batch))
            .await
            .map_err(|exhausted| {
                error!(
                    provider = name,
                    attempts = exhausted.attempts,
                    error = %exhausted.fault,
                    "embedding failed"
                );
                RagError::EmbeddingProvider {
                    provider: name.to_string(),
                    message: format!(
                        "{} (after {} attempt(s))",
                        exhausted.fault, exhausted.attempts
                    ),
                }
            })?;

        if vectors.len() != batch.len() {
            error!(provider = name, expected = batch.len(), actual = vectors.len(), "vector count mismatch");
            return Err(RagError::EmbeddingProvider {
                provider: name.to_string(),
                message: format!(
                    "expected {} vectors, provider returned {}",
                    batch.len(),
                    vectors.len()
                ),
            });
        }

        let expected = provider.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(RagError::DimensionMismatch { expected, actual: bad.len() });
        }

        Ok(vectors)
    }
}
