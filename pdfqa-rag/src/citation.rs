//! Extracting and validating `[Source N]` citation markers.
//!
//! Model output is free-form, so parsing is permissive: markers may carry a
//! suffix (`[Source 2 - Page 3]`), differ in case or spacing, and markers
//! that do not resolve to an assembled source are ignored.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::warn;

use crate::document::{CitationQuality, SourceRecord};

static SOURCE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*source\s+(\d+)\s*(?:[-–,:;][^\]]*)?\]")
        .expect("unreachable error: invalid citation marker pattern")
});

/// The citation part of an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCitations {
    /// The answer text, with markers rewritten when renumbering is enabled.
    pub text: String,
    /// The cited sources, ascending by source number.
    pub citations: Vec<SourceRecord>,
    /// Whether the answer is grounded in cited sources.
    pub quality: CitationQuality,
}

/// All source numbers referenced by markers in `text`, ascending.
pub fn cited_numbers(text: &str) -> BTreeSet<usize> {
    SOURCE_MARKER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

/// Resolves citation markers against the sources shown to the model.
#[derive(Debug, Clone, Default)]
pub struct CitationExtractor {
    renumber: bool,
}

impl CitationExtractor {
    /// Create an extractor. With `renumber` set, cited sources are renumbered
    /// 1..n in ascending order and the answer's markers are rewritten to match.
    pub fn new(renumber: bool) -> Self {
        Self { renumber }
    }

    /// Keep only the sources the answer cites.
    pub fn extract(&self, text: String, sources: &[SourceRecord]) -> ExtractedCitations {
        let cited = cited_numbers(&text);
        let mut citations: Vec<SourceRecord> =
            sources.iter().filter(|s| cited.contains(&s.source_number)).cloned().collect();
        citations.sort_by_key(|s| s.source_number);

        let quality = if sources.is_empty() {
            CitationQuality::NoContext
        } else if citations.is_empty() {
            warn!(
                available = sources.len(),
                markers = cited.len(),
                "answer cites none of the available sources"
            );
            CitationQuality::Uncited
        } else {
            CitationQuality::Grounded
        };

        if self.renumber && !citations.is_empty() {
            let (text, citations) = renumber(&text, citations);
            return ExtractedCitations { text, citations, quality };
        }

        ExtractedCitations { text, citations, quality }
    }
}

/// Renumber `citations` 1..n and rewrite resolvable markers in `text`.
/// Markers that do not resolve are left as written.
fn renumber(text: &str, mut citations: Vec<SourceRecord>) -> (String, Vec<SourceRecord>) {
    let mut remap = HashMap::new();
    for (i, citation) in citations.iter_mut().enumerate() {
        remap.insert(citation.source_number, i + 1);
        citation.source_number = i + 1;
    }

    let rewritten = SOURCE_MARKER.replace_all(text, |caps: &Captures<'_>| {
        let new_number = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .and_then(|old| remap.get(&old));
        match new_number {
            Some(new_number) => format!("[Source {new_number}]"),
            None => caps[0].to_string(),
        }
    });

    (rewritten.into_owned(), citations)
}
