//! Per-chat filtering and per-record deduplication of global candidates.
//!
//! A video is stored as several keyframe rows under one message. Only the
//! best-scoring row of each logical record survives, then the survivors are
//! re-sorted by similarity.

use std::collections::HashMap;

use dejavu_core::{Collection, RecordKey, SimilarityHit, SimilarityRow};

/// Keep rows of `chat_id` only, collapse each record to its best row and
/// sort by similarity descending.
///
/// Ties are broken by row id so repeated calls over the same candidates
/// produce the same order.
pub fn best_hits_for_chat(
    rows: Vec<SimilarityRow>,
    collection: Collection,
    chat_id: i64,
) -> Vec<SimilarityHit> {
    let mut best: HashMap<RecordKey, SimilarityHit> = HashMap::new();
    for row in rows.into_iter().filter(|r| r.chat_id == chat_id) {
        let hit = SimilarityHit::from_row(row, collection);
        match best.get(&hit.record) {
            Some(existing) if existing.similarity >= hit.similarity => {}
            _ => {
                best.insert(hit.record, hit);
            }
        }
    }

    let mut hits: Vec<SimilarityHit> = best.into_values().collect();
    hits.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.row_id.cmp(&b.row_id))
    });
    hits
}

/// Slice `[offset, offset + limit)` out of ranked hits.
///
/// The page is reported as having more when it came back full.
pub fn page(hits: Vec<SimilarityHit>, limit: usize, offset: usize) -> (Vec<SimilarityHit>, bool) {
    let slice: Vec<SimilarityHit> = hits.into_iter().skip(offset).take(limit).collect();
    let has_more = slice.len() == limit;
    (slice, has_more)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn row(chat_id: i64, message_id: i64, frame_index: i32, similarity: f32) -> SimilarityRow {
        SimilarityRow {
            id: Uuid::new_v4(),
            chat_id,
            message_id: Some(message_id),
            frame_index,
            similarity,
        }
    }

    #[test]
    fn test_foreign_chat_rows_are_dropped() {
        let rows = vec![row(1, 10, 0, 0.99), row(2, 20, 0, 0.98), row(1, 11, 0, 0.5)];
        let hits = best_hits_for_chat(rows, Collection::MediaEmbeddings, 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_id, Some(20));
    }

    #[test]
    fn test_video_frames_collapse_to_best_frame() {
        let rows = vec![
            row(1, 10, 0, 0.70),
            row(1, 10, 2, 0.97),
            row(1, 10, 1, 0.80),
            row(1, 11, 0, 0.90),
        ];
        let hits = best_hits_for_chat(rows, Collection::MediaEmbeddings, 1);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].message_id, Some(10));
        assert_eq!(hits[0].frame_index, 2);
        assert!((hits[0].similarity - 0.97).abs() < f32::EPSILON);
        assert_eq!(hits[1].message_id, Some(11));
    }

    #[test]
    fn test_ignore_entries_are_not_merged() {
        let mut a = row(1, 10, 0, 0.99);
        let mut b = row(1, 10, 0, 0.98);
        a.message_id = Some(10);
        b.message_id = Some(10);
        let hits = best_hits_for_chat(vec![a, b], Collection::IgnoredMedia, 1);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_page_reports_full_pages() {
        let rows: Vec<SimilarityRow> = (0..5)
            .map(|i| row(1, i, 0, 0.9 - i as f32 * 0.01))
            .collect();
        let hits = best_hits_for_chat(rows, Collection::MediaEmbeddings, 1);

        let (first, more) = page(hits.clone(), 3, 0);
        assert_eq!(first.len(), 3);
        assert!(more);

        let (second, more) = page(hits.clone(), 3, 3);
        assert_eq!(second.len(), 2);
        assert!(!more);

        let (empty, more) = page(hits, 3, 9);
        assert!(empty.is_empty());
        assert!(!more);
    }
}
