//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the ingest and question-answering
//! workflows by composing an [`EmbeddingProvider`], a [`CompletionProvider`],
//! a [`SimilarityIndex`] and a [`Chunker`].
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfqa_rag::{InMemoryIndex, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .completion_provider(Arc::new(my_model))
//!     .index(Arc::new(InMemoryIndex::new()))
//!     .build()?;
//!
//! pipeline.ingest_document(&document).await?;
//! let answer = pipeline.ask_question("What is EDA?").await?;
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chunking::{Chunker, SentenceChunker};
use crate::citation::CitationExtractor;
use crate::completion::CompletionProvider;
use crate::config::RagConfig;
use crate::context::ContextAssembler;
use crate::document::{AnswerResult, Document, RetrievalPlan, SourceRecord};
use crate::embedding::{EmbeddingGateway, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;
use crate::planner::RetrievalPlanner;
use crate::sources::deduplicate;
use crate::vectorstore::SimilarityIndex;

/// The RAG pipeline orchestrator.
///
/// Coordinates document ingestion (chunk → embed → store) and question
/// answering (plan → embed → search → cutoff → merge → assemble → generate
/// → cite). Holds only configuration and shared handles, so one instance
/// can serve concurrent requests behind an `Arc`. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    embeddings: EmbeddingGateway,
    index: Arc<dyn SimilarityIndex>,
    planner: RetrievalPlanner,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
    citations: CitationExtractor,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the similarity index.
    pub fn index(&self) -> &Arc<dyn SimilarityIndex> {
        &self.index
    }

    /// Return a reference to the retrieval planner.
    pub fn planner(&self) -> &RetrievalPlanner {
        &self.planner
    }

    /// Ingest a single document: chunk → embed → replace in the index.
    ///
    /// Every chunk is embedded before the index is touched, so a failure
    /// leaves the index as it was. Re-ingesting a document replaces its
    /// previous chunks. Returns the number of chunks stored.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidPage`] if a page is numbered 0.
    /// - [`RagError::EmptyDocument`] if no page yields any text.
    /// - Embedding and index errors are propagated unchanged.
    pub async fn ingest_document(&self, document: &Document) -> Result<usize> {
        if let Some(page) = document.pages.iter().find(|p| p.page_number == 0) {
            error!(document.id = %document.id, page_number = page.page_number, "invalid page number");
            return Err(RagError::InvalidPage {
                document_id: document.id.clone(),
                page_number: page.page_number,
            });
        }

        // 1. Chunk the document
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            warn!(document.id = %document.id, page_count = document.pages.len(), "no extractable text");
            return Err(RagError::EmptyDocument { document_id: document.id.clone() });
        }

        // 2. Embed every chunk
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embeddings.embed(&texts).await.inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
        })?;

        // 3. Swap the document's chunks in the index
        self.index.replace_document(&document.id, &chunks, &vectors).await.inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "index update failed during ingestion");
        })?;

        let chunk_count = chunks.len();
        info!(document.id = %document.id, page_count = document.pages.len(), chunk_count, "ingested document");

        Ok(chunk_count)
    }

    /// Answer a question from the indexed documents.
    ///
    /// A question with no sufficiently close passage still produces an
    /// answer: the model is told no context was found and the result has
    /// [`CitationQuality::NoContext`](crate::CitationQuality::NoContext).
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyQuestion`] for a blank question.
    /// - [`RagError::GenerationUnavailable`] if the model cannot be reached.
    /// - Embedding and index errors are propagated unchanged.
    pub async fn ask_question(&self, question: &str) -> Result<AnswerResult> {
        self.answer(question, None).await
    }

    /// Like [`ask_question`](Self::ask_question), but requests exactly
    /// `breadth` neighbors instead of the planned breadth.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `breadth` is 0, otherwise as
    /// [`ask_question`](Self::ask_question).
    pub async fn ask_question_with_breadth(
        &self,
        question: &str,
        breadth: usize,
    ) -> Result<AnswerResult> {
        if breadth == 0 {
            return Err(RagError::Config("breadth must be at least 1".to_string()));
        }
        self.answer(question, Some(breadth)).await
    }

    /// Run retrieval only: plan, embed, search, apply the cutoff and merge
    /// into numbered sources.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyQuestion`] for a blank question; embedding
    /// and index errors are propagated unchanged.
    pub async fn retrieve_sources(
        &self,
        question: &str,
        breadth: Option<usize>,
    ) -> Result<(RetrievalPlan, Vec<SourceRecord>)> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        // 1. Decide how many neighbors to fetch
        let mut plan = self.planner.plan(question);
        if let Some(breadth) = breadth {
            plan.breadth = breadth;
        }

        // 2. Embed the question
        let query_vector = self.embeddings.embed_query(question).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during query");
        })?;

        // 3. Search the index
        let matches = self.index.query(&query_vector, plan.breadth).await.inspect_err(|e| {
            error!(error = %e, "index query failed");
        })?;
        let retrieved = matches.len();

        // 4. Drop weak matches and merge per page
        let matches = self.planner.apply_cutoff(matches);
        let sources = deduplicate(&matches);

        info!(
            kind = ?plan.kind,
            scope = ?plan.scope,
            breadth = plan.breadth,
            retrieved,
            kept = matches.len(),
            source_count = sources.len(),
            "retrieval completed"
        );

        Ok((plan, sources))
    }

    /// Delete every chunk of a document, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Index errors are propagated unchanged.
    pub async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let removed = self.index.delete_document(document_id).await?;
        info!(document.id = document_id, removed, "deleted document");
        Ok(removed)
    }

    /// Number of chunks currently indexed.
    ///
    /// # Errors
    ///
    /// Index errors are propagated unchanged.
    pub async fn indexed_chunk_count(&self) -> Result<usize> {
        self.index.count().await
    }

    /// Remove every indexed chunk.
    ///
    /// # Errors
    ///
    /// Index errors are propagated unchanged.
    pub async fn clear(&self) -> Result<()> {
        self.index.clear().await?;
        info!("cleared index");
        Ok(())
    }

    async fn answer(&self, question: &str, breadth: Option<usize>) -> Result<AnswerResult> {
        let (plan, sources) = self.retrieve_sources(question, breadth).await?;

        // 5. Render the sources that fit the budget
        let context = self.assembler.assemble(&sources);

        // 6. Generate
        let text = self.generator.generate(question.trim(), plan.kind, &context).await?;

        // 7. Keep only what the answer cites
        let extracted = self.citations.extract(text, &context.sources);

        info!(
            quality = ?extracted.quality,
            sources_considered = context.sources.len(),
            citation_count = extracted.citations.len(),
            "question answered"
        );

        Ok(AnswerResult {
            text: extracted.text,
            citations: extracted.citations,
            quality: extracted.quality,
            plan,
            sources_considered: context.sources.len(),
        })
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The providers and the index are required. The config defaults to
/// [`RagConfig::default()`] and the chunker to a [`SentenceChunker`] using
/// the configured chunk size. Call [`build()`](RagPipelineBuilder::build)
/// to validate and produce the pipeline.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    completion_provider: Option<Arc<dyn CompletionProvider>>,
    index: Option<Arc<dyn SimilarityIndex>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the completion provider used for answers.
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion_provider = Some(provider);
        self
    }

    /// Set the similarity index.
    pub fn index(mut self, index: Arc<dyn SimilarityIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Replace the default sentence chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`], validating the configuration and that all
    /// required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let completion_provider = self
            .completion_provider
            .ok_or_else(|| RagError::Config("completion_provider is required".to_string()))?;
        let index = self.index.ok_or_else(|| RagError::Config("index is required".to_string()))?;
        let chunker =
            self.chunker.unwrap_or_else(|| Arc::new(SentenceChunker::new(config.chunk_size)));

        Ok(RagPipeline {
            embeddings: EmbeddingGateway::new(
                embedding_provider,
                config.embedding_batch_size,
                config.retry.clone(),
            ),
            generator: AnswerGenerator::new(
                completion_provider,
                config.temperature,
                config.max_output_tokens,
                config.retry.clone(),
            ),
            planner: RetrievalPlanner::new(&config),
            assembler: ContextAssembler::new(config.context_char_budget),
            citations: CitationExtractor::new(config.renumber_citations),
            chunker,
            index,
            config,
        })
    }
}
