//! Similarity index contract for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, EmbeddingVector, RetrievedMatch};
use crate::error::Result;

/// A storage backend for chunk embeddings with cosine nearest-neighbor search.
///
/// Entries are keyed by `(document_id, chunk_index)`, so re-ingesting a
/// document overwrites its chunks instead of duplicating them.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{InMemoryIndex, SimilarityIndex};
///
/// let index = InMemoryIndex::new();
/// index.upsert(&chunks, &vectors).await?;
/// let matches = index.query(&query_vector, 10).await?;
/// ```
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Store each chunk with its vector. `chunks[i]` pairs with `vectors[i]`.
    async fn upsert(&self, chunks: &[Chunk], vectors: &[EmbeddingVector]) -> Result<()>;

    /// Replace every stored chunk of `document_id` with the given ones.
    ///
    /// The default implementation deletes then upserts; backends that can
    /// do both in one step should override it.
    async fn replace_document(
        &self,
        document_id: &str,
        chunks: &[Chunk],
        vectors: &[EmbeddingVector],
    ) -> Result<()> {
        self.delete_document(document_id).await?;
        self.upsert(chunks, vectors).await
    }

    /// Return at most `k` matches ordered by ascending cosine distance.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedMatch>>;

    /// Remove every chunk of a document, returning how many were removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<usize>;

    /// Remove everything.
    async fn clear(&self) -> Result<()>;
}
