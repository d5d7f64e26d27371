//! Batching, retry and validation behavior of the embedding gateway.

mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::KeywordEmbedder;
use pdfqa_rag::{
    EmbeddingGateway, EmbeddingProvider, EmbeddingVector, FaultKind, ProviderFault,
    ProviderResult, RagError, RetryPolicy,
};

/// Fails with the given kinds in order, then embeds every text as `[len, 1]`.
struct Flaky {
    faults: Mutex<Vec<FaultKind>>,
    calls: AtomicUsize,
}

impl Flaky {
    fn new(mut faults: Vec<FaultKind>) -> Self {
        faults.reverse();
        Self { faults: Mutex::new(faults), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn dimensions(&self) -> usize {
        2
    }

    async fn embed_batch(&self, texts: &[&str]) -> ProviderResult<Vec<EmbeddingVector>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.faults.lock().unwrap().pop() {
            return Err(ProviderFault::new(kind, "scripted"));
        }
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
    }
}

/// Returns malformed output: either too few vectors or vectors of the wrong length.
struct Misbehaving {
    drop_last: bool,
}

#[async_trait]
impl EmbeddingProvider for Misbehaving {
    fn name(&self) -> &str {
        "misbehaving"
    }

    fn dimensions(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[&str]) -> ProviderResult<Vec<EmbeddingVector>> {
        if self.drop_last {
            Ok(texts.iter().skip(1).map(|_| vec![0.0; 3]).collect())
        } else {
            Ok(texts.iter().map(|_| vec![0.0; 2]).collect())
        }
    }
}

#[tokio::test]
async fn batches_preserve_order_and_count() {
    let provider = Arc::new(KeywordEmbedder::new(&["alpha", "beta"]));
    let gateway = EmbeddingGateway::new(provider.clone(), 2, RetryPolicy::no_retry());
    let texts = ["alpha", "beta", "alpha alpha", "beta alpha", "nothing"];

    let vectors = gateway.embed(&texts).await.unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        vectors,
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]]
    );
}

#[tokio::test]
async fn batch_size_is_capped_at_one() {
    let gateway =
        EmbeddingGateway::new(Arc::new(KeywordEmbedder::new(&["a"])), 0, RetryPolicy::no_retry());
    assert_eq!(gateway.batch_size(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_faults_are_retried() {
    let provider = Arc::new(Flaky::new(vec![FaultKind::RateLimited, FaultKind::Unavailable]));
    let gateway = EmbeddingGateway::new(provider.clone(), 10, RetryPolicy::default());

    let vector = gateway.embed_query("hello").await.unwrap();

    assert_eq!(vector, vec![5.0, 1.0]);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_attempts() {
    let provider = Arc::new(Flaky::new(vec![FaultKind::Timeout; 5]));
    let gateway = EmbeddingGateway::new(provider.clone(), 10, RetryPolicy::default());

    let err = gateway.embed(&["hello"]).await.unwrap_err();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    match err {
        RagError::EmbeddingProvider { provider, message } => {
            assert_eq!(provider, "flaky");
            assert!(message.contains("3 attempt"), "unexpected message: {message}");
        }
        other => panic!("expected EmbeddingProvider, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn auth_faults_are_not_retried() {
    let provider = Arc::new(Flaky::new(vec![FaultKind::Auth]));
    let gateway = EmbeddingGateway::new(provider.clone(), 10, RetryPolicy::default());

    let err = gateway.embed(&["hello"]).await.unwrap_err();

    assert!(matches!(err, RagError::EmbeddingProvider { .. }));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_vectors_are_an_error() {
    let gateway = EmbeddingGateway::new(
        Arc::new(Misbehaving { drop_last: true }),
        10,
        RetryPolicy::no_retry(),
    );
    let err = gateway.embed(&["one", "two"]).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingProvider { .. }));
}

#[tokio::test]
async fn wrong_dimensions_are_an_error() {
    let gateway = EmbeddingGateway::new(
        Arc::new(Misbehaving { drop_last: false }),
        10,
        RetryPolicy::no_retry(),
    );
    let err = gateway.embed(&["one"]).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));
}
