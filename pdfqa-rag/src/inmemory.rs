//! In-memory similarity index using cosine distance.
//!
//! This module provides [`InMemoryIndex`], a brute-force index backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. Queries take the read
//! lock, so they run concurrently with each other; each write holds the
//! write lock for one whole call, so a document replacement is never
//! observed half-done. The index can be saved to and loaded from a JSON
//! snapshot.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{Chunk, EmbeddingVector, RetrievedMatch};
use crate::error::{RagError, Result};
use crate::vectorstore::SimilarityIndex;

const BACKEND: &str = "InMemory";

type EntryKey = (String, usize);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    chunk: Chunk,
    vector: EmbeddingVector,
}

/// Serialized form of an [`InMemoryIndex`].
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    dimensions: Option<usize>,
    entries: Vec<Entry>,
}

/// An in-memory similarity index using cosine distance.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{InMemoryIndex, SimilarityIndex};
///
/// let index = InMemoryIndex::with_dimensions(1536);
/// index.upsert(&chunks, &vectors).await?;
/// index.save_snapshot("index.json").await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    dimensions: Option<usize>,
    entries: RwLock<HashMap<EntryKey, Entry>>,
}

impl InMemoryIndex {
    /// Create a new empty index accepting vectors of any length.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty index that rejects vectors not of length `dimensions`.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions: Some(dimensions), entries: RwLock::default() }
    }

    /// The enforced vector length, if any.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Pin the vector length of an index loaded without one.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] if the index already enforces a
    /// different length or holds a vector of another length.
    pub async fn require_dimensions(mut self, dimensions: usize) -> Result<Self> {
        if let Some(existing) = self.dimensions.filter(|d| *d != dimensions) {
            return Err(store_error(format!(
                "index holds {existing}-dimensional vectors, provider produces {dimensions}"
            )));
        }
        if let Some(bad) = self.entries.get_mut().values().find(|e| e.vector.len() != dimensions) {
            return Err(store_error(format!(
                "stored vector has {} dimensions, provider produces {dimensions}",
                bad.vector.len()
            )));
        }
        self.dimensions = Some(dimensions);
        Ok(self)
    }

    /// Write every entry to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] if serialization or the write fails.
    /// The snapshot is written next to `path` and renamed into place, so an
    /// interrupted save leaves the previous snapshot intact.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = {
            let entries = self.entries.read().await;
            let mut entries: Vec<Entry> = entries.values().cloned().collect();
            entries.sort_by(|a, b| entry_order(&a.chunk, &b.chunk));
            Snapshot { dimensions: self.dimensions, entries }
        };
        let json = serde_json::to_vec(&snapshot)
            .map_err(|e| store_error(format!("failed to serialize snapshot: {e}")))?;
        let staging = staging_path(path);
        tokio::fs::write(&staging, json)
            .await
            .map_err(|e| store_error(format!("failed to write '{}': {e}", staging.display())))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| store_error(format!("failed to replace '{}': {e}", path.display())))?;
        info!(path = %path.display(), entry_count = snapshot.entries.len(), "saved index snapshot");
        Ok(())
    }

    /// Load an index previously written by [`save_snapshot`](Self::save_snapshot).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] if the file cannot be read or parsed.
    pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| store_error(format!("failed to read '{}': {e}", path.display())))?;
        let snapshot: Snapshot = serde_json::from_slice(&raw)
            .map_err(|e| store_error(format!("invalid snapshot '{}': {e}", path.display())))?;
        let entry_count = snapshot.entries.len();
        let entries = snapshot
            .entries
            .into_iter()
            .map(|entry| ((entry.chunk.document_id.clone(), entry.chunk.chunk_index), entry))
            .collect();
        info!(path = %path.display(), entry_count, "loaded index snapshot");
        Ok(Self { dimensions: snapshot.dimensions, entries: RwLock::new(entries) })
    }

    fn validate(&self, chunks: &[Chunk], vectors: &[EmbeddingVector]) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(store_error(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(expected) = self.dimensions {
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(store_error(format!(
                    "vector has {} dimensions, index expects {expected}",
                    bad.len()
                )));
            }
        }
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_else(|| OsString::from("index"));
    name.push(".tmp");
    path.with_file_name(name)
}

fn store_error(message: String) -> RagError {
    RagError::VectorStore { backend: BACKEND.to_string(), message }
}

fn entry_order(a: &Chunk, b: &Chunk) -> Ordering {
    a.document_id.cmp(&b.document_id).then(a.chunk_index.cmp(&b.chunk_index))
}

/// Compute cosine distance (1 − cosine similarity) between two vectors.
///
/// Returns 1.0 if either vector has zero magnitude and never returns a
/// negative value. Both vectors must have the same length.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).max(0.0)
}

#[async_trait]
impl SimilarityIndex for InMemoryIndex {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[EmbeddingVector]) -> Result<()> {
        self.validate(chunks, vectors)?;
        let mut entries = self.entries.write().await;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            entries.insert(
                (chunk.document_id.clone(), chunk.chunk_index),
                Entry { chunk: chunk.clone(), vector: vector.clone() },
            );
        }
        Ok(())
    }

    async fn replace_document(
        &self,
        document_id: &str,
        chunks: &[Chunk],
        vectors: &[EmbeddingVector],
    ) -> Result<()> {
        self.validate(chunks, vectors)?;
        let mut entries = self.entries.write().await;
        entries.retain(|(doc, _), _| doc != document_id);
        for (chunk, vector) in chunks.iter().zip(vectors) {
            entries.insert(
                (chunk.document_id.clone(), chunk.chunk_index),
                Entry { chunk: chunk.clone(), vector: vector.clone() },
            );
        }
        debug!(document.id = document_id, chunk_count = chunks.len(), "replaced document");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimensions.filter(|d| *d != vector.len()) {
            return Err(store_error(format!(
                "query vector has {} dimensions, index expects {expected}",
                vector.len()
            )));
        }
        let entries = self.entries.read().await;

        let mut scored: Vec<RetrievedMatch> = Vec::with_capacity(entries.len());
        for entry in entries.values() {
            if entry.vector.len() != vector.len() {
                return Err(store_error(format!(
                    "query vector has {} dimensions, stored chunk {}#{} has {}",
                    vector.len(),
                    entry.chunk.document_id,
                    entry.chunk.chunk_index,
                    entry.vector.len()
                )));
            }
            scored.push(RetrievedMatch {
                chunk: entry.chunk.clone(),
                distance: cosine_distance(&entry.vector, vector),
            });
        }

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| entry_order(&a.chunk, &b.chunk))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(doc, _), _| doc != document_id);
        Ok(before - entries.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}
