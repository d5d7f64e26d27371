//! Data types for documents, chunks, retrieval matches, sources and answers.

use serde::{Deserialize, Serialize};

/// A fixed-length embedding of a chunk or a query.
pub type EmbeddingVector = Vec<f32>;

/// The extracted text of one PDF page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    /// 1-based page number.
    pub page_number: u32,
    /// The text extracted from the page.
    pub text: String,
}

impl Page {
    /// Create a page from its number and text.
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self { page_number, text: text.into() }
    }
}

/// A PDF document as delivered by the text extractor: its pages in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document, usually the uploaded file name.
    pub id: String,
    /// Pages in page order.
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a document from its identifier and pages.
    pub fn new(id: impl Into<String>, pages: Vec<Page>) -> Self {
        Self { id: id.into(), pages }
    }

    /// Build a document from page texts, numbering them from 1.
    pub fn from_page_texts<I, S>(id: impl Into<String>, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = texts
            .into_iter()
            .zip(1u32..)
            .map(|(text, page_number)| Page::new(page_number, text))
            .collect();
        Self::new(id, pages)
    }
}

/// A bounded, contiguous segment of one page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The text content of the chunk.
    pub text: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// 1-based page the chunk was taken from.
    pub page_number: u32,
    /// Position of the chunk within its document, from 0.
    pub chunk_index: usize,
    /// Number of pages in the parent document.
    pub total_pages: u32,
}

impl Chunk {
    /// Stable identifier, `{document_id}_{chunk_index}`.
    pub fn id(&self) -> String {
        format!("{}_{}", self.document_id, self.chunk_index)
    }
}

/// A [`Chunk`] returned by a similarity query with its cosine distance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedMatch {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine distance to the query (lower is more similar).
    pub distance: f32,
}

/// Retrieved evidence from one page of one document, citable as `[Source N]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRecord {
    /// Citation number, 1-based, unique within one answer.
    pub source_number: usize,
    /// The document the page belongs to.
    pub document_id: String,
    /// The page the evidence was taken from.
    pub page_number: u32,
    /// All retrieved chunk texts of the page in chunk order.
    pub merged_text: String,
    /// Distances of the merged matches, ascending.
    pub distances: Vec<f32>,
    /// Indices of the merged chunks, ascending.
    pub chunk_indices: Vec<usize>,
}

impl SourceRecord {
    /// The distance of the closest merged match.
    pub fn best_distance(&self) -> f32 {
        self.distances.first().copied().unwrap_or(f32::MAX)
    }

    /// A preview of the source text of at most `max_chars` characters,
    /// followed by `...` when shortened.
    pub fn snippet(&self, max_chars: usize) -> String {
        match self.merged_text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.merged_text[..cut]),
            None => self.merged_text.clone(),
        }
    }
}

/// How well an answer is supported by citations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CitationQuality {
    /// At least one valid source is cited.
    Grounded,
    /// Sources were available but the answer cites none of them.
    Uncited,
    /// No retrieved passage survived the distance cutoff.
    NoContext,
}

/// The broad intent of a question, used to pick prompt instructions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Summaries and overviews.
    Summary,
    /// Steps, processes and procedures.
    Procedure,
    /// Comparisons and analyses.
    Comparison,
    /// Short factual lookups.
    Fact,
    /// Anything else.
    General,
}

/// Whether a question is answered from a few or many neighbors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalScope {
    /// Ordinary questions.
    Narrow,
    /// Enumerative or procedural questions.
    Wide,
}

/// The retrieval decision made for one question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalPlan {
    /// The question's kind.
    pub kind: QuestionKind,
    /// Narrow or wide retrieval.
    pub scope: RetrievalScope,
    /// Number of neighbors requested from the index.
    pub breadth: usize,
}

/// The final answer returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    /// The generated answer text.
    pub text: String,
    /// Sources the answer actually cites, ascending by source number.
    pub citations: Vec<SourceRecord>,
    /// Whether the answer is grounded in cited sources.
    pub quality: CitationQuality,
    /// The retrieval decision for the question.
    pub plan: RetrievalPlan,
    /// Number of sources presented to the model.
    pub sources_considered: usize,
}

impl AnswerResult {
    /// Whether the caller should present a "no relevant information" response.
    pub fn is_unsupported(&self) -> bool {
        self.citations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_numbered_from_one() {
        let doc = Document::from_page_texts("a.pdf", ["first", "second"]);
        assert_eq!(doc.pages[0], Page::new(1, "first"));
        assert_eq!(doc.pages[1].page_number, 2);
    }

    #[test]
    fn snippet_shortens_on_char_boundary() {
        let source = SourceRecord {
            source_number: 1,
            document_id: "a.pdf".into(),
            page_number: 1,
            merged_text: "héllo wörld".into(),
            distances: vec![0.1],
            chunk_indices: vec![0],
        };
        assert_eq!(source.snippet(5), "héllo...");
        assert_eq!(source.snippet(50), "héllo wörld");
    }
}
