//! Deterministic providers shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pdfqa_rag::{
    CompletionProvider, CompletionRequest, EmbeddingProvider, EmbeddingVector, FaultKind,
    ProviderFault, ProviderResult,
};

/// Embeds text onto one axis per keyword: component `i` counts the
/// occurrences of `keywords[i]`. Text without any keyword maps to the zero
/// vector, which is at distance 1.0 from everything.
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self { keywords: keywords.iter().map(|k| k.to_string()).collect(), calls: AtomicUsize::new(0) }
    }

    pub fn vector(&self, text: &str) -> EmbeddingVector {
        let lowered = text.to_lowercase();
        self.keywords.iter().map(|k| lowered.matches(k.as_str()).count() as f32).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    fn dimensions(&self) -> usize {
        self.keywords.len()
    }

    async fn embed_batch(&self, texts: &[&str]) -> ProviderResult<Vec<EmbeddingVector>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Replies from a script, then repeats its fallback. Records every request.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<ProviderResult<String>>>,
    fallback: ProviderResult<String>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    /// Always answer with `text`.
    pub fn answering(text: &str) -> Self {
        Self::new(Vec::new(), Ok(text.to_string()))
    }

    /// Always fail with `kind`.
    pub fn failing(kind: FaultKind) -> Self {
        Self::new(Vec::new(), Err(ProviderFault::new(kind, "scripted failure")))
    }

    pub fn new(script: Vec<ProviderResult<String>>, fallback: ProviderResult<String>) -> Self {
        Self { script: Mutex::new(script.into()), fallback, requests: Mutex::new(Vec::new()) }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
