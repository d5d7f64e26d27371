//! `pdfqa` - ask questions about PDF documents and get page-cited answers.
//!
//! PDF text extraction happens outside this tool: `ingest` reads the text of
//! a document with pages separated by form feeds, which is what `pdftotext`
//! writes. The index lives in a JSON snapshot between invocations.

mod providers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdfqa_rag::{
    AnswerResult, CitationQuality, Document, EmbeddingProvider, InMemoryIndex, RagConfig, RagPipeline,
    SimilarityIndex,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PAGE_SEPARATOR: char = '\x0c';
const SNIPPET_CHARS: usize = 200;

#[derive(Parser)]
#[command(name = "pdfqa")]
#[command(about = "Answer questions about PDF documents with page-level citations", long_about = None)]
#[command(version)]
struct Cli {
    /// Index snapshot file
    #[arg(long, global = true, default_value = "pdfqa-index.json")]
    index: PathBuf,

    /// JSON configuration file (defaults apply to missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or replace a document from its extracted page text
    Ingest {
        /// Text file with pages separated by form feeds (pdftotext output)
        file: PathBuf,

        /// Document id (default: the file name)
        #[arg(long)]
        id: Option<String>,
    },

    /// Ask a question about the ingested documents
    Ask {
        /// The question
        question: String,

        /// Number of neighbors to retrieve, overriding the planned breadth
        #[arg(long)]
        breadth: Option<usize>,

        /// Chat model name
        #[arg(long)]
        model: Option<String>,

        /// Print the full answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how many chunks are indexed
    Status,

    /// Remove every indexed document
    Clear,

    /// Remove one document
    Delete {
        /// Document id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RagConfig::from_json_file(path)?,
        None => RagConfig::default(),
    };
    let index = open_index(&cli.index).await?;

    match cli.command {
        Commands::Ingest { file, id } => {
            let document = read_document(&file, id).await?;
            let embedder = providers::embedding_provider()?;
            let index = Arc::new(index.require_dimensions(embedder.dimensions()).await?);
            let pipeline = build_pipeline(config, embedder, index.clone(), None)?;
            let chunk_count = pipeline.ingest_document(&document).await?;
            index.save_snapshot(&cli.index).await?;
            println!(
                "Ingested '{}': {} pages, {chunk_count} chunks",
                document.id,
                document.pages.len()
            );
        }
        Commands::Ask { question, breadth, model, json } => {
            let embedder = providers::embedding_provider()?;
            let index = Arc::new(index.require_dimensions(embedder.dimensions()).await?);
            let pipeline = build_pipeline(config, embedder, index, model.as_deref())?;
            let answer = match breadth {
                Some(breadth) => pipeline.ask_question_with_breadth(&question, breadth).await?,
                None => pipeline.ask_question(&question).await?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Commands::Status => {
            let chunk_count = index.count().await?;
            println!("Index: {}", cli.index.display());
            println!("Chunks: {chunk_count}");
        }
        Commands::Clear => {
            index.clear().await?;
            index.save_snapshot(&cli.index).await?;
            println!("Cleared {}", cli.index.display());
        }
        Commands::Delete { id } => {
            let removed = index.delete_document(&id).await?;
            index.save_snapshot(&cli.index).await?;
            println!("Removed {removed} chunks of '{id}'");
        }
    }

    Ok(())
}

async fn open_index(path: &Path) -> Result<InMemoryIndex> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        Ok(InMemoryIndex::load_snapshot(path).await?)
    } else {
        info!(path = %path.display(), "no index snapshot yet, starting empty");
        Ok(InMemoryIndex::new())
    }
}

fn build_pipeline(
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<InMemoryIndex>,
    model: Option<&str>,
) -> Result<RagPipeline> {
    Ok(RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .completion_provider(providers::completion_provider(model)?)
        .index(index)
        .build()?)
}

async fn read_document(path: &Path, id: Option<String>) -> Result<Document> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let id = match id {
        Some(id) => id,
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("cannot derive a document id from {}", path.display()))?,
    };
    Ok(Document::from_page_texts(id, split_pages(&raw)))
}

/// Split extracted text into pages. `pdftotext` ends every page, including
/// the last one, with a form feed.
fn split_pages(raw: &str) -> Vec<&str> {
    let mut pages: Vec<&str> = raw.split(PAGE_SEPARATOR).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

fn print_answer(answer: &AnswerResult) {
    println!("{}\n", answer.text.trim());

    match answer.quality {
        CitationQuality::NoContext => {
            println!("(No relevant passages were found in the indexed documents.)");
        }
        CitationQuality::Uncited => {
            println!(
                "(The answer cites none of the {} retrieved sources.)",
                answer.sources_considered
            );
        }
        CitationQuality::Grounded => {
            println!("Sources:");
            for source in &answer.citations {
                println!(
                    "  [Source {}] {}, page {} (distance {:.3})",
                    source.source_number,
                    source.document_id,
                    source.page_number,
                    source.best_distance()
                );
                println!("      {}", source.snippet(SNIPPET_CHARS).replace('\n', " "));
            }
        }
    }
}
