//! Provider selection from the environment.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use pdfqa_rag::openai::{OPENROUTER_API_BASE, OpenAICompletionProvider, OpenAIEmbeddingProvider};
use pdfqa_rag::{CompletionProvider, EmbeddingProvider};
use tracing::debug;

const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
const OPENROUTER_KEY_VAR: &str = "OPENROUTER_API_KEY";
const FORCE_OPENROUTER_VAR: &str = "FORCE_OPENROUTER";
const OPENROUTER_DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
const OPENROUTER_REFERER: &str = "https://github.com/pdfqa/pdfqa";
const OPENROUTER_TITLE: &str = "PDF Q&A";

/// Embeddings always come from OpenAI (`OPENAI_API_KEY`).
pub fn embedding_provider() -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = OpenAIEmbeddingProvider::from_env()
        .context("embeddings need OPENAI_API_KEY to be set")?;
    Ok(Arc::new(provider))
}

/// Which service answers questions.
#[derive(Debug, PartialEq, Eq)]
enum CompletionRoute {
    OpenAI,
    OpenRouter(String),
}

/// OpenAI is preferred. OpenRouter is used when `FORCE_OPENROUTER=true` or
/// when no OpenAI key is set.
fn completion_route(
    force_openrouter: Option<&str>,
    openai_key: Option<&str>,
    openrouter_key: Option<&str>,
) -> Result<CompletionRoute> {
    let openrouter_key = openrouter_key.filter(|k| !k.is_empty()).map(str::to_string);
    let openai_key = openai_key.filter(|k| !k.is_empty());

    if force_openrouter.is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        let key = openrouter_key
            .with_context(|| format!("{FORCE_OPENROUTER_VAR}=true needs {OPENROUTER_KEY_VAR} to be set"))?;
        return Ok(CompletionRoute::OpenRouter(key));
    }
    match (openai_key, openrouter_key) {
        (Some(_), _) => Ok(CompletionRoute::OpenAI),
        (None, Some(key)) => Ok(CompletionRoute::OpenRouter(key)),
        (None, None) => {
            bail!("completions need {OPENAI_KEY_VAR} or {OPENROUTER_KEY_VAR} to be set")
        }
    }
}

/// Build the completion provider chosen by [`completion_route`].
pub fn completion_provider(model: Option<&str>) -> Result<Arc<dyn CompletionProvider>> {
    let route = completion_route(
        std::env::var(FORCE_OPENROUTER_VAR).ok().as_deref(),
        std::env::var(OPENAI_KEY_VAR).ok().as_deref(),
        std::env::var(OPENROUTER_KEY_VAR).ok().as_deref(),
    )?;

    match route {
        CompletionRoute::OpenRouter(key) => {
            let model = model.unwrap_or(OPENROUTER_DEFAULT_MODEL);
            debug!(model, "using OpenRouter for completions");
            let provider = OpenAICompletionProvider::new(key)?
                .with_base_url(OPENROUTER_API_BASE)
                .with_model(model)
                .with_header("HTTP-Referer", OPENROUTER_REFERER)?
                .with_header("X-Title", OPENROUTER_TITLE)?;
            Ok(Arc::new(provider))
        }
        CompletionRoute::OpenAI => {
            let mut provider = OpenAICompletionProvider::from_env()?;
            if let Some(model) = model {
                provider = provider.with_model(model);
            }
            debug!(model = provider.name(), "using OpenAI for completions");
            Ok(Arc::new(provider))
        }
    }
}
