//! Rendering sources into the context block of the generation prompt.

use tracing::debug;

use crate::document::SourceRecord;

/// The context handed to the answer generator.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    /// Labeled source blocks separated by blank lines. Empty when there are
    /// no sources.
    pub text: String,
    /// The sources that made it into `text`, in source-number order. Only
    /// these may be cited.
    pub sources: Vec<SourceRecord>,
    /// How many lower-ranked sources were left out to respect the budget.
    pub omitted: usize,
}

impl AssembledContext {
    /// Whether no source made it into the context.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Renders [`SourceRecord`]s as `[Source N - Page P]: text` blocks under a
/// soft character budget.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    /// Create an assembler with a budget of `max_chars` characters.
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Render one source block.
    pub fn render_block(source: &SourceRecord) -> String {
        format!("[Source {} - Page {}]: {}", source.source_number, source.page_number, source.merged_text)
    }

    /// Concatenate source blocks in source-number order.
    ///
    /// Blocks are added whole until the next one would push the context
    /// past the budget; that block and every later one are omitted. The
    /// first source is always kept, even if it alone exceeds the budget.
    pub fn assemble(&self, sources: &[SourceRecord]) -> AssembledContext {
        let mut ordered: Vec<&SourceRecord> = sources.iter().collect();
        ordered.sort_by_key(|s| s.source_number);

        let mut text = String::new();
        let mut used_chars = 0;
        let mut included = Vec::new();

        for source in &ordered {
            let block = Self::render_block(source);
            let separator = if text.is_empty() { 0 } else { 2 };
            let block_chars = block.chars().count() + separator;

            if !included.is_empty() && used_chars + block_chars > self.max_chars {
                break;
            }
            if separator > 0 {
                text.push_str("\n\n");
            }
            text.push_str(&block);
            used_chars += block_chars;
            included.push((*source).clone());
        }

        let omitted = ordered.len() - included.len();
        if omitted > 0 {
            debug!(included = included.len(), omitted, budget = self.max_chars, "context budget reached");
        }

        AssembledContext { text, sources: included, omitted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(number: usize, page: u32, text: &str) -> SourceRecord {
        SourceRecord {
            source_number: number,
            document_id: "doc.pdf".into(),
            page_number: page,
            merged_text: text.to_string(),
            distances: vec![0.1 * number as f32],
            chunk_indices: vec![number],
        }
    }

    #[test]
    fn blocks_are_labeled_and_ordered() {
        let context = ContextAssembler::new(1_000)
            .assemble(&[source(2, 9, "Second."), source(1, 4, "First.")]);
        assert_eq!(context.text, "[Source 1 - Page 4]: First.\n\n[Source 2 - Page 9]: Second.");
        assert_eq!(context.omitted, 0);
    }

    #[test]
    fn budget_drops_lowest_ranked_sources_whole() {
        let sources = [source(1, 1, &"a".repeat(40)), source(2, 2, &"b".repeat(40)), source(3, 3, "c")];
        let first_block = ContextAssembler::render_block(&sources[0]).chars().count();
        let context = ContextAssembler::new(first_block + 10).assemble(&sources);
        assert_eq!(context.sources.len(), 1);
        assert_eq!(context.omitted, 2);
        assert!(!context.text.contains('b'));
        assert!(!context.text.contains("Source 3"));
    }

    #[test]
    fn oversized_first_source_is_kept() {
        let context = ContextAssembler::new(5).assemble(&[source(1, 1, "longer than five")]);
        assert_eq!(context.sources.len(), 1);
        assert!(context.text.ends_with("longer than five"));
    }

    #[test]
    fn no_sources_empty_context() {
        let context = ContextAssembler::new(100).assemble(&[]);
        assert!(context.is_empty());
        assert!(context.text.is_empty());
    }
}
