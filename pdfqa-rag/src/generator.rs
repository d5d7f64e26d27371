//! Prompt construction and the completion call.

use std::sync::Arc;

use tracing::{debug, error};

use crate::completion::{CompletionProvider, CompletionRequest};
use crate::context::AssembledContext;
use crate::document::QuestionKind;
use crate::error::{FaultKind, ProviderFault, RagError, Result};
use crate::retry::{RetryPolicy, call_with_retry};

/// Sent in place of the context when retrieval found nothing usable.
pub const NO_CONTEXT_SIGNAL: &str = "No relevant context was found in the uploaded documents.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using only the \
context provided from PDF documents. If the context does not contain the answer, say so plainly \
instead of guessing. Format answers in Markdown with clear paragraphs, bold key terms and lists \
where they help. Cite every piece of information with its source marker, for example [Source 1].";

const BASE_INSTRUCTIONS: &str = "Use ONLY the information in the context below. If it does not \
contain the information needed, reply: \"I cannot answer this question based on the provided PDF \
documents.\" and name what is missing. Do not use outside knowledge.\n\
Cite every relevant source with its marker, such as [Source 1] or [Source 2].";

fn kind_instructions(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::Summary => {
            "This is a summary question:\n\
             - Extract the core conclusions and key findings, most important first\n\
             - Leave out minor details\n\
             - Keep it concise, using bullet points or short paragraphs\n\
             - Cite a source for each main point"
        }
        QuestionKind::Procedure => {
            "This is a procedure question:\n\
             - List every step in the correct order as a numbered list\n\
             - Read all sources; steps may be spread across several of them\n\
             - Do not skip any step mentioned in the context\n\
             - Cite the source for each step or group of steps"
        }
        QuestionKind::Comparison => {
            "This is a comparison question:\n\
             - Compare the aspects clearly, in separate sections or bullet points\n\
             - Highlight the key differences and similarities\n\
             - Cite sources for each point of comparison"
        }
        QuestionKind::Fact => {
            "This is a factual question:\n\
             - Answer directly and precisely\n\
             - Do not expand on unrelated information\n\
             - If several sources state the fact, cite all of them"
        }
        QuestionKind::General => {
            "Start with a brief direct answer, then give the supporting details.\n\
             Use lists when there are several points."
        }
    }
}

/// Builds the two-part prompt and asks the completion provider for an answer.
#[derive(Clone)]
pub struct AnswerGenerator {
    provider: Arc<dyn CompletionProvider>,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl AnswerGenerator {
    /// Create a generator with fixed generation parameters.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        temperature: f32,
        max_tokens: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self { provider, temperature, max_tokens, retry }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }

    /// Build the completion request for a question and its context.
    pub fn build_request(
        &self,
        question: &str,
        kind: QuestionKind,
        context: &AssembledContext,
    ) -> CompletionRequest {
        let context_text = if context.is_empty() { NO_CONTEXT_SIGNAL } else { context.text.as_str() };
        let closing = match context.sources.len() {
            0 => "Explain that the documents do not cover this question.".to_string(),
            1 => "Answer based on the context above and cite [Source 1].".to_string(),
            n => format!(
                "Answer based on the context above. Cite ALL relevant sources (Source 1 through \
                 Source {n}) that support the answer."
            ),
        };

        let user = format!(
            "{BASE_INSTRUCTIONS}\n\n{}\n\nContext from PDF documents:\n{context_text}\n\n\
             Question: {question}\n\n{closing}",
            kind_instructions(kind)
        );

        CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Generate an answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationUnavailable`] when the provider fails
    /// with a non-retryable fault, keeps failing until retries run out, or
    /// returns a blank completion.
    pub async fn generate(
        &self,
        question: &str,
        kind: QuestionKind,
        context: &AssembledContext,
    ) -> Result<String> {
        let request = &self.build_request(question, kind, context);
        let provider = self.provider.as_ref();
        let name = provider.name();
        debug!(provider = name, ?kind, sources = context.sources.len(), "requesting completion");

        let outcome = call_with_retry(&self.retry, name, "complete", move || async move {
            let text = provider.complete(request).await?;
            if text.trim().is_empty() {
                return Err(ProviderFault::new(FaultKind::Malformed, "empty completion"));
            }
            Ok::<_, ProviderFault>(text)
        })
        .await;

        outcome.map_err(|exhausted| {
            error!(
                provider = name,
                attempts = exhausted.attempts,
                error = %exhausted.fault,
                "generation failed"
            );
            RagError::GenerationUnavailable {
                provider: name.to_string(),
                attempts: exhausted.attempts,
                message: exhausted.fault.to_string(),
            }
        })
    }
}
