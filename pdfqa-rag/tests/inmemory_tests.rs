//! In-memory index behavior: query ordering, re-ingestion, dimension checks,
//! snapshots and concurrent access.

use pdfqa_rag::document::Chunk;
use pdfqa_rag::inmemory::InMemoryIndex;
use pdfqa_rag::vectorstore::SimilarityIndex;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

fn chunk(document_id: &str, chunk_index: usize, page_number: u32) -> Chunk {
    Chunk {
        text: format!("chunk {chunk_index} of {document_id}"),
        document_id: document_id.to_string(),
        page_number,
        chunk_index,
        total_pages: 4,
    }
}

/// **Property 1: In-memory index query ordering**
/// *For any* set of stored vectors, querying SHALL return matches ordered by
/// ascending cosine distance, every distance SHALL be non-negative, and the
/// number of matches SHALL be `min(k, stored)`.
mod prop_inmemory_query_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn matches_ascending_and_bounded_by_k(
            vectors in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let matches = rt.block_on(async {
                let index = InMemoryIndex::with_dimensions(DIM);
                let chunks: Vec<Chunk> =
                    (0..vectors.len()).map(|i| chunk("doc.pdf", i, (i / 3 + 1) as u32)).collect();
                index.upsert(&chunks, &vectors).await.unwrap();
                index.query(&query, k).await.unwrap()
            });

            prop_assert_eq!(matches.len(), k.min(vectors.len()));
            for m in &matches {
                prop_assert!(m.distance >= 0.0, "negative distance {}", m.distance);
            }
            for window in matches.windows(2) {
                prop_assert!(
                    window[0].distance <= window[1].distance,
                    "matches not in ascending order: {} > {}",
                    window[0].distance,
                    window[1].distance,
                );
            }
        }
    }
}

/// **Property 2: Re-ingestion does not grow the index**
/// *For any* document, replacing it with the same chunks any number of
/// times SHALL leave exactly one entry per chunk.
mod prop_inmemory_replace_idempotent {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn repeated_replace_keeps_count(
            vectors in proptest::collection::vec(arb_normalized_embedding(DIM), 1..12),
            repeats in 1usize..4,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let count = rt.block_on(async {
                let index = InMemoryIndex::new();
                let other = [chunk("other.pdf", 0, 1)];
                index.upsert(&other, &[vectors[0].clone()]).await.unwrap();

                let chunks: Vec<Chunk> =
                    (0..vectors.len()).map(|i| chunk("doc.pdf", i, 1)).collect();
                for _ in 0..repeats {
                    index.replace_document("doc.pdf", &chunks, &vectors).await.unwrap();
                }
                index.count().await.unwrap()
            });

            prop_assert_eq!(count, vectors.len() + 1);
        }
    }
}

#[tokio::test]
async fn missing_snapshot_is_a_vector_store_error() {
    let err = InMemoryIndex::load_snapshot("/nonexistent/pdfqa-index.json").await.unwrap_err();
    assert!(matches!(err, pdfqa_rag::RagError::VectorStore { .. }));
}

#[tokio::test]
async fn query_of_the_wrong_length_is_rejected() {
    let index = InMemoryIndex::with_dimensions(3);
    index.upsert(&[chunk("doc.pdf", 0, 1)], &[vec![1.0, 0.0, 0.0]]).await.unwrap();

    for query in [vec![1.0, 0.0], vec![1.0, 0.0, 0.0, 0.0]] {
        let err = index.query(&query, 5).await.unwrap_err();
        assert!(matches!(err, pdfqa_rag::RagError::VectorStore { .. }), "{err}");
    }
    assert_eq!(index.query(&[1.0, 0.0, 0.0], 5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unpinned_index_rejects_queries_shorter_than_stored_vectors() {
    let index = InMemoryIndex::new();
    index.upsert(&[chunk("doc.pdf", 0, 1)], &[vec![1.0, 0.0, 0.0]]).await.unwrap();

    assert!(index.query(&[1.0, 0.0], 5).await.is_err());
}

#[tokio::test]
async fn pinning_a_loaded_index_checks_stored_vectors() {
    let index = InMemoryIndex::new();
    index.upsert(&[chunk("doc.pdf", 0, 1)], &[vec![1.0, 0.0]]).await.unwrap();
    assert!(index.require_dimensions(3).await.is_err());

    let pinned = InMemoryIndex::new().require_dimensions(3).await.unwrap();
    assert_eq!(pinned.dimensions(), Some(3));
    assert!(pinned.upsert(&[chunk("doc.pdf", 0, 1)], &[vec![1.0, 0.0]]).await.is_err());
    assert!(InMemoryIndex::with_dimensions(2).require_dimensions(3).await.is_err());
}

#[tokio::test]
async fn saving_replaces_the_previous_snapshot_whole() {
    let dir = std::env::temp_dir().join(format!("pdfqa-save-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("index.json");

    let index = InMemoryIndex::with_dimensions(2);
    index.upsert(&[chunk("a.pdf", 0, 1)], &[vec![1.0, 0.0]]).await.unwrap();
    index.save_snapshot(&path).await.unwrap();
    index.upsert(&[chunk("b.pdf", 0, 1)], &[vec![0.0, 1.0]]).await.unwrap();
    index.save_snapshot(&path).await.unwrap();

    let restored = InMemoryIndex::load_snapshot(&path).await.unwrap();
    assert_eq!(restored.count().await.unwrap(), 2);
    assert_eq!(restored.dimensions(), Some(2));
    let leftovers: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
    assert_eq!(leftovers.len(), 1);
    let _ = std::fs::remove_dir_all(dir);
}

/// Writers keep replacing their own documents while readers query; every
/// reader sees each document either whole or not at all.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replacements_are_never_seen_half_done() {
    use std::collections::HashMap;
    use std::sync::Arc;

    const DOCUMENTS: usize = 4;
    const ROUNDS: usize = 50;

    let index = Arc::new(InMemoryIndex::with_dimensions(2));
    let chunk_counts: Vec<usize> = (0..DOCUMENTS).map(|d| d + 2).collect();

    let mut tasks = Vec::new();
    for (d, &chunk_total) in chunk_counts.iter().enumerate() {
        let index = index.clone();
        tasks.push(tokio::spawn(async move {
            let id = format!("doc-{d}.pdf");
            let chunks: Vec<Chunk> = (0..chunk_total).map(|i| chunk(&id, i, 1)).collect();
            let vectors = vec![vec![1.0, d as f32]; chunk_total];
            for _ in 0..ROUNDS {
                index.replace_document(&id, &chunks, &vectors).await.unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }
    for _ in 0..DOCUMENTS {
        let index = index.clone();
        let chunk_counts = chunk_counts.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..ROUNDS {
                let matches = index.query(&[1.0, 0.5], 100).await.unwrap();
                let mut seen: HashMap<String, Vec<usize>> = HashMap::new();
                for m in matches {
                    seen.entry(m.chunk.document_id).or_default().push(m.chunk.chunk_index);
                }
                for (id, mut indices) in seen {
                    let d: usize = id["doc-".len()..id.len() - ".pdf".len()].parse().unwrap();
                    indices.sort_unstable();
                    assert_eq!(indices, (0..chunk_counts[d]).collect::<Vec<_>>(), "{id}");
                }
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(index.count().await.unwrap(), chunk_counts.iter().sum::<usize>());
}
