//! Per-chat search behaviour over the exact in-memory store.

use std::collections::HashSet;
use std::sync::Arc;

use dejavu_db::test_fixtures::{unit_vector, vector_with_similarity};
use dejavu_db::InMemoryStore;
use dejavu_search::{
    Collection, FrameEmbedding, MediaEmbeddingRepository, MediaType, RecordKey, SimilarityQuery,
    TenantSearch, TenantSearchConfig,
};

async fn photo(store: &InMemoryStore, chat: i64, message: i64, similarity: f32) {
    store
        .insert_frames(
            chat,
            message,
            MediaType::Photo,
            &[FrameEmbedding::new(0, vector_with_similarity(0, 1, similarity))],
        )
        .await
        .unwrap();
}

fn media_query(chat: i64) -> SimilarityQuery {
    SimilarityQuery::new(Collection::MediaEmbeddings, unit_vector(0), chat)
}

fn message_ids(page: &dejavu_search::SearchPage) -> Vec<i64> {
    page.hits.iter().filter_map(|h| h.message_id).collect()
}

#[tokio::test]
async fn test_search_never_returns_other_chats() {
    let store = Arc::new(InMemoryStore::new());
    // Chat A owns the closest vectors in the whole index
    for message in 1..=5 {
        photo(&store, -100, message, 0.999).await;
    }
    photo(&store, -200, 1, 0.90).await;

    let search = TenantSearch::new(store.clone(), TenantSearchConfig::default());
    let page = search
        .search(&media_query(-200).with_min_similarity(0.5).with_limit(3))
        .await
        .unwrap();

    assert_eq!(message_ids(&page), vec![1]);
    assert!(page.hits.iter().all(|h| h.similarity < 0.95));
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_same_media_twice_is_found() {
    let store = Arc::new(InMemoryStore::new());
    let search = TenantSearch::new(store.clone(), TenantSearchConfig::default());

    photo(&store, -1, 10, 1.0).await;
    let page = search
        .search(&media_query(-1).with_min_similarity(0.96))
        .await
        .unwrap();
    assert_eq!(message_ids(&page), vec![10]);

    photo(&store, -1, 11, 1.0).await;
    let page = search
        .search(&media_query(-1).with_min_similarity(0.96))
        .await
        .unwrap();
    let ids: HashSet<i64> = message_ids(&page).into_iter().collect();
    assert_eq!(ids, HashSet::from([10, 11]));
}

#[tokio::test]
async fn test_video_frames_count_as_one_record() {
    let store = Arc::new(InMemoryStore::new());
    let frames: Vec<FrameEmbedding> = [0.7, 0.99, 0.8, 0.6]
        .iter()
        .enumerate()
        .map(|(i, s)| FrameEmbedding::new(i as i32, vector_with_similarity(0, 1, *s)))
        .collect();
    store
        .insert_frames(-5, 42, MediaType::Video, &frames)
        .await
        .unwrap();
    photo(&store, -5, 43, 0.75).await;

    let search = TenantSearch::new(store.clone(), TenantSearchConfig::default());
    let page = search
        .search(&media_query(-5).with_min_similarity(0.5).with_limit(5))
        .await
        .unwrap();

    assert_eq!(page.hits.len(), 2);
    assert_eq!(page.hits[0].record, RecordKey::Message(42));
    assert_eq!(page.hits[0].frame_index, 1);
    assert_eq!(page.hits[1].record, RecordKey::Message(43));
}

#[tokio::test]
async fn test_consecutive_pages_match_one_large_page() {
    let store = Arc::new(InMemoryStore::new());
    for message in 1..=8 {
        photo(&store, -10, message, 0.99 - message as f32 * 0.02).await;
        photo(&store, -20, message, 0.99 - message as f32 * 0.02).await;
    }
    let search = TenantSearch::new(store.clone(), TenantSearchConfig::default());
    let base = media_query(-10).with_min_similarity(0.24);

    let first = search.search(&base.clone().with_limit(3)).await.unwrap();
    let second = search
        .search(&base.clone().with_limit(3).with_offset(3))
        .await
        .unwrap();
    let both = search.search(&base.with_limit(6)).await.unwrap();

    let first_ids = message_ids(&first);
    let second_ids = message_ids(&second);
    assert!(first_ids.iter().all(|id| !second_ids.contains(id)));

    let mut joined = first_ids.clone();
    joined.extend(second_ids);
    assert_eq!(joined, message_ids(&both));
    assert!(first.has_more);
    assert!(second.has_more);
}

#[tokio::test]
async fn test_threshold_filters_weak_matches() {
    let store = Arc::new(InMemoryStore::new());
    photo(&store, -3, 1, 0.97).await;
    photo(&store, -3, 2, 0.90).await;

    let search = TenantSearch::new(store.clone(), TenantSearchConfig::default());
    let page = search
        .search(&media_query(-3).with_min_similarity(0.96))
        .await
        .unwrap();
    assert_eq!(message_ids(&page), vec![1]);
}
