//! # pdfqa-rag
//!
//! Retrieval-augmented question answering over the extracted text of PDF
//! documents, with answers that cite the pages they draw from.
//!
//! ## Overview
//!
//! Ingestion splits each page into sentence-aligned chunks, embeds them and
//! stores the vectors in a [`SimilarityIndex`]. Answering a question embeds
//! it, retrieves the nearest chunks (more of them for procedural or
//! enumerative questions), drops weak matches, merges chunks of the same page
//! into numbered sources, prompts a language model with those sources and
//! keeps only the sources the answer actually cites.
//!
//! - [`RagPipeline`] - the caller-facing `ingest_document` / `ask_question` surface
//! - [`EmbeddingProvider`] / [`CompletionProvider`] - model backends
//! - [`InMemoryIndex`] - the built-in cosine index with JSON snapshots
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pdfqa_rag::{Document, InMemoryIndex, RagConfig, RagPipeline};
//! use pdfqa_rag::openai::{OpenAICompletionProvider, OpenAIEmbeddingProvider};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
//!     .completion_provider(Arc::new(OpenAICompletionProvider::from_env()?))
//!     .index(Arc::new(InMemoryIndex::new()))
//!     .build()?;
//!
//! pipeline.ingest_document(&Document::from_page_texts("guide.pdf", pages)).await?;
//! let answer = pipeline.ask_question("What are the steps to install it?").await?;
//! ```
//!
//! ## Features
//!
//! - `openai` (default) - OpenAI and OpenAI-compatible (OpenRouter) providers

pub mod chunking;
pub mod citation;
pub mod completion;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod inmemory;
pub mod pipeline;
pub mod planner;
pub mod retry;
pub mod sources;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, SentenceChunker};
pub use citation::{CitationExtractor, ExtractedCitations};
pub use completion::{CompletionProvider, CompletionRequest};
pub use config::{RagConfig, RagConfigBuilder};
pub use context::{AssembledContext, ContextAssembler};
pub use document::{
    AnswerResult, Chunk, CitationQuality, Document, EmbeddingVector, Page, QuestionKind,
    RetrievalPlan, RetrievalScope, RetrievedMatch, SourceRecord,
};
pub use embedding::{EmbeddingGateway, EmbeddingProvider};
pub use error::{FaultKind, ProviderFault, ProviderResult, RagError, Result};
pub use generator::{AnswerGenerator, NO_CONTEXT_SIGNAL};
pub use inmemory::InMemoryIndex;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use planner::RetrievalPlanner;
pub use retry::RetryPolicy;
pub use vectorstore::SimilarityIndex;
