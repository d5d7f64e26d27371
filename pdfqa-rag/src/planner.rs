//! Retrieval planning: how many neighbors to request for a question, and
//! which retrieved matches are close enough to keep.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::RagConfig;
use crate::document::{QuestionKind, RetrievalPlan, RetrievalScope, RetrievedMatch};

const SUMMARY_CUES: &[&str] = &[
    "summary",
    "summarize",
    "summarise",
    "overview",
    "main points",
    "key findings",
    "conclusion",
    "gist",
    "briefly explain",
];

const PROCEDURE_CUES: &[&str] = &[
    "step", "process", "procedure", "how to", "how do", "method", "sequence", "workflow",
];

/// Procedure cues that only count as whole words ("list" but not "specialist").
const PROCEDURE_WORDS: &[&str] = &["list", "order", "way"];

const COMPARISON_CUES: &[&str] = &[
    "compare",
    "comparison",
    "difference",
    "different",
    "versus",
    " vs",
    "similar",
    "analyze",
    "analyse",
    "analysis",
    "contrast",
    "relationship",
    "between",
];

const FACT_CUES: &[&str] =
    &["what is", "what are", "who is", "when", "where", "which", "define", "definition", "meaning"];

/// Words at or above this count never make a question a [`QuestionKind::Fact`].
const FACT_MAX_WORDS: usize = 10;

/// Decides retrieval breadth per question and filters matches by distance.
///
/// The planner holds no per-query state; one instance serves every request.
#[derive(Debug, Clone)]
pub struct RetrievalPlanner {
    narrow_breadth: usize,
    wide_breadth: usize,
    distance_cutoff: f32,
    wide_keywords: HashSet<String>,
}

impl RetrievalPlanner {
    /// Create a planner from the pipeline configuration.
    pub fn new(config: &RagConfig) -> Self {
        Self {
            narrow_breadth: config.narrow_breadth,
            wide_breadth: config.wide_breadth,
            distance_cutoff: config.distance_cutoff,
            wide_keywords: config.wide_keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Narrow or wide: wide when any whole word of the question is a wide keyword.
    pub fn scope(&self, question: &str) -> RetrievalScope {
        let lowered = question.to_lowercase();
        let wide = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| self.wide_keywords.contains(word));
        if wide { RetrievalScope::Wide } else { RetrievalScope::Narrow }
    }

    /// Classify the question and choose the breadth to request.
    pub fn plan(&self, question: &str) -> RetrievalPlan {
        let scope = self.scope(question);
        let breadth = match scope {
            RetrievalScope::Narrow => self.narrow_breadth,
            RetrievalScope::Wide => self.wide_breadth,
        };
        RetrievalPlan { kind: classify_kind(question), scope, breadth }
    }

    /// Keep matches strictly closer than the cutoff, ascending by distance.
    pub fn apply_cutoff(&self, mut matches: Vec<RetrievedMatch>) -> Vec<RetrievedMatch> {
        matches.retain(|m| m.distance < self.distance_cutoff);
        matches.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        matches
    }

    /// The configured cutoff.
    pub fn distance_cutoff(&self) -> f32 {
        self.distance_cutoff
    }
}

/// Classify a question by the cues it contains. Checked in order: summary,
/// procedure, comparison, short factual lookup, then general.
pub fn classify_kind(question: &str) -> QuestionKind {
    let lowered = question.to_lowercase();
    let has_any = |cues: &[&str]| cues.iter().any(|cue| lowered.contains(cue));
    let has_word = |words: &[&str]| {
        lowered.split(|c: char| !c.is_alphanumeric()).any(|word| words.contains(&word))
    };

    if has_any(SUMMARY_CUES) {
        QuestionKind::Summary
    } else if has_any(PROCEDURE_CUES) || has_word(PROCEDURE_WORDS) {
        QuestionKind::Procedure
    } else if has_any(COMPARISON_CUES) {
        QuestionKind::Comparison
    } else if has_any(FACT_CUES) && question.split_whitespace().count() < FACT_MAX_WORDS {
        QuestionKind::Fact
    } else {
        QuestionKind::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn planner() -> RetrievalPlanner {
        RetrievalPlanner::new(&RagConfig::default())
    }

    fn matched(page: u32, distance: f32) -> RetrievedMatch {
        RetrievedMatch {
            chunk: Chunk {
                text: format!("page {page}"),
                document_id: "doc.pdf".into(),
                page_number: page,
                chunk_index: page as usize,
                total_pages: 9,
            },
            distance,
        }
    }

    #[test]
    fn procedural_questions_get_wide_breadth() {
        let plan = planner().plan("What are the steps to install the software?");
        assert_eq!(plan.scope, RetrievalScope::Wide);
        assert!(plan.breadth >= 50);
        assert_eq!(plan.kind, QuestionKind::Procedure);
    }

    #[test]
    fn ordinary_questions_get_narrow_breadth() {
        let plan = planner().plan("What is EDA?");
        assert_eq!(plan.scope, RetrievalScope::Narrow);
        assert_eq!(plan.breadth, 10);
        assert_eq!(plan.kind, QuestionKind::Fact);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        assert_eq!(planner().scope("Where is the showroom?"), RetrievalScope::Narrow);
        assert_eq!(planner().scope("HOW does caching work?"), RetrievalScope::Wide);
    }

    #[test]
    fn custom_keywords_replace_defaults() {
        let config = RagConfig::builder().wide_keywords(["enumerate"]).build().unwrap();
        let planner = RetrievalPlanner::new(&config);
        assert_eq!(planner.scope("Enumerate the risks"), RetrievalScope::Wide);
        assert_eq!(planner.scope("List the risks"), RetrievalScope::Narrow);
    }

    #[test]
    fn cutoff_discards_distant_matches() {
        let kept = planner().apply_cutoff(vec![matched(1, 0.85), matched(2, 0.3), matched(3, 0.8)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chunk.page_number, 2);
    }

    #[test]
    fn kinds_follow_cue_priority() {
        assert_eq!(classify_kind("Summarize the main points"), QuestionKind::Summary);
        assert_eq!(classify_kind("Compare solar and wind power"), QuestionKind::Comparison);
        assert_eq!(classify_kind("List the requirements"), QuestionKind::Procedure);
        assert_eq!(classify_kind("In what order are the valves opened?"), QuestionKind::Procedure);
        assert_eq!(classify_kind("Who is the specialist on call?"), QuestionKind::Fact);
        assert_eq!(
            classify_kind("What is the reason the committee changed its mind about the budget?"),
            QuestionKind::General
        );
    }
}
