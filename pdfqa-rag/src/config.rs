//! Configuration for the RAG pipeline.
//!
//! Every tuned constant of the pipeline lives here with its default:
//! chunk size, the two retrieval breadths, the distance cutoff, the
//! context budget, generation parameters and the provider retry policy.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Words that mark a question as enumerative or procedural.
pub const DEFAULT_WIDE_KEYWORDS: &[&str] = &[
    "step",
    "steps",
    "process",
    "processes",
    "procedure",
    "procedures",
    "how",
    "method",
    "methods",
    "list",
    "lists",
    "sequence",
    "workflow",
];

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Neighbors requested for ordinary questions.
    pub narrow_breadth: usize,
    /// Neighbors requested for enumerative or procedural questions.
    pub wide_breadth: usize,
    /// Matches at or beyond this cosine distance are discarded.
    pub distance_cutoff: f32,
    /// Keywords that switch a question to the wide breadth.
    pub wide_keywords: Vec<String>,
    /// Soft character budget for the assembled context.
    pub context_char_budget: usize,
    /// Texts sent per embedding request.
    pub embedding_batch_size: usize,
    /// Sampling temperature for answer generation.
    pub temperature: f32,
    /// Output-length cap for answer generation, in tokens.
    pub max_output_tokens: u32,
    /// Renumber cited sources 1..n and rewrite the markers in the answer.
    pub renumber_citations: bool,
    /// Retry policy shared by the embedding and completion providers.
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            narrow_breadth: 10,
            wide_breadth: 50,
            distance_cutoff: 0.8,
            wide_keywords: DEFAULT_WIDE_KEYWORDS.iter().map(|k| (*k).to_string()).collect(),
            context_char_budget: 9_000,
            embedding_batch_size: 100,
            temperature: 0.7,
            max_output_tokens: 1_000,
            renumber_citations: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load a configuration from a JSON file. Missing fields take their
    /// defaults; the result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the file cannot be read or parsed, or
    /// if the values fail validation.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("cannot read '{}': {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the text is not valid JSON for this
    /// type or the values fail validation.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: RagConfig = serde_json::from_str(raw)
            .map_err(|e| RagError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size`, `narrow_breadth`, `context_char_budget`,
    ///   `embedding_batch_size` or `max_output_tokens` is zero
    /// - `wide_breadth < narrow_breadth`
    /// - `distance_cutoff` is outside `(0, 2]`
    /// - `temperature` is outside `[0, 2]`
    /// - `retry.max_attempts == 0`
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("chunk_size", self.chunk_size),
            ("narrow_breadth", self.narrow_breadth),
            ("context_char_budget", self.context_char_budget),
            ("embedding_batch_size", self.embedding_batch_size),
            ("max_output_tokens", self.max_output_tokens as usize),
            ("retry.max_attempts", self.retry.max_attempts as usize),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(RagError::Config(format!("{name} must be greater than zero")));
        }
        if self.wide_breadth < self.narrow_breadth {
            return Err(RagError::Config(format!(
                "wide_breadth ({}) must not be less than narrow_breadth ({})",
                self.wide_breadth, self.narrow_breadth
            )));
        }
        if !(self.distance_cutoff > 0.0 && self.distance_cutoff <= 2.0) {
            return Err(RagError::Config(format!(
                "distance_cutoff ({}) must be in (0, 2]",
                self.distance_cutoff
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "temperature ({}) must be in [0, 2]",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the breadth used for ordinary questions.
    pub fn narrow_breadth(mut self, k: usize) -> Self {
        self.config.narrow_breadth = k;
        self
    }

    /// Set the breadth used for enumerative or procedural questions.
    pub fn wide_breadth(mut self, k: usize) -> Self {
        self.config.wide_breadth = k;
        self
    }

    /// Set the distance at or beyond which matches are discarded.
    pub fn distance_cutoff(mut self, cutoff: f32) -> Self {
        self.config.distance_cutoff = cutoff;
        self
    }

    /// Replace the keywords that select the wide breadth.
    pub fn wide_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.wide_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Set the soft character budget for the assembled context.
    pub fn context_char_budget(mut self, chars: usize) -> Self {
        self.config.context_char_budget = chars;
        self
    }

    /// Set how many texts are sent per embedding request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the output-length cap in tokens.
    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.config.max_output_tokens = tokens;
        self
    }

    /// Renumber cited sources sequentially in the final answer.
    pub fn renumber_citations(mut self, enabled: bool) -> Self {
        self.config.renumber_citations = enabled;
        self
    }

    /// Set the provider retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
