//! # Ask Basic Example
//!
//! Demonstrates the question-answering pipeline: ingest a small manual,
//! then ask questions and print page-cited answers.
//!
//! Uses `InMemoryIndex`, a deterministic bag-of-words embedder and an
//! extractive "model" that quotes the best source, so it runs with
//! **zero API keys**.
//!
//! Run: `cargo run --example ask_basic`

use std::sync::Arc;

use pdfqa_rag::{
    CitationQuality, CompletionProvider, CompletionRequest, Document, EmbeddingProvider,
    EmbeddingVector, InMemoryIndex, ProviderResult, RagConfig, RagPipeline,
};

// ---------------------------------------------------------------------------
// BagOfWordsEmbedder: hashes each word into one of `dimensions` buckets
// ---------------------------------------------------------------------------

struct BagOfWordsEmbedder {
    dimensions: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn name(&self) -> &str {
        "bag-of-words"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[&str]) -> ProviderResult<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

impl BagOfWordsEmbedder {
    fn embed_one(&self, text: &str) -> EmbeddingVector {
        let mut emb = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 3) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        emb
    }
}

// ---------------------------------------------------------------------------
// QuotingModel: answers with the first sentence of Source 1
// ---------------------------------------------------------------------------

struct QuotingModel;

#[async_trait::async_trait]
impl CompletionProvider for QuotingModel {
    fn name(&self) -> &str {
        "quoting-model"
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        let quote = request
            .user
            .split_once("[Source 1 - Page ")
            .and_then(|(_, rest)| rest.split_once("]: "))
            .map(|(_, text)| text.split_inclusive(". ").next().unwrap_or(text).trim());

        Ok(match quote {
            Some(sentence) => format!("According to the manual, {sentence} [Source 1]"),
            None => "I cannot answer this question based on the provided PDF documents.".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("pdfqa_rag=info").init();

    // -- 1. Configure the pipeline ----------------------------------------
    // Small chunks so the three-page manual yields several of them; the
    // renumbering option rewrites markers to start at [Source 1].
    let config = RagConfig::builder().chunk_size(160).renumber_citations(true).build()?;

    // -- 2. Build the pipeline with in-memory components ------------------
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(BagOfWordsEmbedder { dimensions: 128 }))
        .completion_provider(Arc::new(QuotingModel))
        .index(Arc::new(InMemoryIndex::new()))
        .build()?;

    // -- 3. Ingest a document, one string per page ------------------------
    let manual = Document::from_page_texts(
        "widget-manual.pdf",
        [
            "The Widget is a compact data logger. It records temperature and humidity \
             every minute and stores up to ninety days of readings.",
            "Installation steps: unpack the Widget, charge the battery for two hours, \
             mount the bracket on a wall, then pair the Widget with the mobile app.",
            "Troubleshooting: if readings stop, check the battery first. A blinking red \
             light means the storage is full and old readings must be exported.",
        ],
    );
    let chunk_count = pipeline.ingest_document(&manual).await?;
    println!("Ingested {} → {chunk_count} chunk(s)\n", manual.id);

    // -- 4. Ask questions -------------------------------------------------
    let questions = [
        "What does the Widget record?",
        "What are the installation steps?",
        "What does a blinking red light mean?",
        "Who invented the telephone?",
    ];

    for question in questions {
        let answer = pipeline.ask_question(question).await?;
        println!("Q: {question}");
        println!("   plan: {:?} / {:?}, breadth {}", answer.plan.kind, answer.plan.scope, answer.plan.breadth);
        println!("A: {}", answer.text);
        match answer.quality {
            CitationQuality::Grounded => {
                for source in &answer.citations {
                    println!(
                        "   [Source {}] {} page {} (distance {:.3})",
                        source.source_number,
                        source.document_id,
                        source.page_number,
                        source.best_distance(),
                    );
                }
            }
            other => println!("   ({other:?})"),
        }
        println!();
    }

    println!("Done.");
    Ok(())
}
