//! Completion provider trait for answer generation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

/// A single non-streaming chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// The system instruction.
    pub system: String,
    /// The user message: context plus question.
    pub user: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output-length cap in tokens.
    pub max_tokens: u32,
}

/// A language model that turns a system/user message pair into text.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::CompletionProvider;
///
/// let text = provider.complete(&request).await?;
/// ```
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// A short name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate a completion for the request.
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String>;
}
