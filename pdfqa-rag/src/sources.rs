//! Merging retrieved chunks into page-level, numbered sources.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::document::{RetrievedMatch, SourceRecord};

/// Separator placed between merged chunk texts. Chunks are trimmed, so a
/// single space keeps the sentences of adjacent chunks intact.
const MERGE_SEPARATOR: &str = " ";

struct Group<'a> {
    document_id: &'a str,
    page_number: u32,
    parts: Vec<(usize, &'a str)>,
    distances: Vec<f32>,
}

/// Group matches by `(document_id, page_number)` into [`SourceRecord`]s.
///
/// Groups are numbered from 1 in the order they are first reached when
/// walking the matches by ascending distance, so Source 1 is always the page
/// holding the closest match. Within a group the texts are joined in
/// `chunk_index` order; a chunk retrieved twice is kept once, with its
/// closest distance.
pub fn deduplicate(matches: &[RetrievedMatch]) -> Vec<SourceRecord> {
    let mut ordered: Vec<&RetrievedMatch> = matches.iter().collect();
    ordered.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));

    let mut positions: HashMap<(&str, u32), usize> = HashMap::new();
    let mut groups: Vec<Group<'_>> = Vec::new();

    for m in ordered {
        let key = (m.chunk.document_id.as_str(), m.chunk.page_number);
        let position = *positions.entry(key).or_insert_with(|| {
            groups.push(Group {
                document_id: key.0,
                page_number: key.1,
                parts: Vec::new(),
                distances: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[position];
        if !group.parts.iter().any(|(index, _)| *index == m.chunk.chunk_index) {
            group.parts.push((m.chunk.chunk_index, m.chunk.text.as_str()));
            group.distances.push(m.distance);
        }
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(i, mut group)| {
            group.parts.sort_by_key(|(index, _)| *index);
            let merged_text =
                group.parts.iter().map(|(_, text)| *text).collect::<Vec<_>>().join(MERGE_SEPARATOR);
            SourceRecord {
                source_number: i + 1,
                document_id: group.document_id.to_string(),
                page_number: group.page_number,
                merged_text,
                distances: group.distances,
                chunk_indices: group.parts.iter().map(|(index, _)| *index).collect(),
            }
        })
        .collect()
}
