//! In-process store with exact cosine search.
//!
//! Implements every store trait over plain vectors behind one mutex. Used by
//! unit tests across the workspace and by the CLI when no database is wanted.
//! Queries are exhaustive, so results equal those of a perfect-recall index.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use pgvector::Vector;
use uuid::Uuid;

use dejavu_core::{
    ChatImportState, ChatStateRepository, Collection, Error, FrameEmbedding,
    IgnoreListEntry, IgnoreListRepository, MediaEmbeddingRecord, MediaEmbeddingRepository,
    MediaType, Result, SimilarityRow, VectorIndex,
};

use crate::check_dimension;

#[derive(Default)]
struct Tables {
    media: Vec<MediaEmbeddingRecord>,
    ignored: Vec<IgnoreListEntry>,
    chat_state: HashMap<i64, ChatImportState>,
}

/// Shared in-memory implementation of all store traits.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

/// Cosine similarity between two vectors; 0 when either has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Internal("in-memory store lock poisoned".to_string()))
    }

    /// Every stored media row, in insertion order.
    pub fn media_rows(&self) -> Result<Vec<MediaEmbeddingRecord>> {
        Ok(self.lock()?.media.clone())
    }

    fn insert_locked(
        tables: &mut Tables,
        chat_id: i64,
        message_id: i64,
        media_type: MediaType,
        frames: &[FrameEmbedding],
    ) -> u64 {
        let mut inserted = 0;
        for frame in frames {
            let exists = tables.media.iter().any(|r| {
                r.chat_id == chat_id
                    && r.message_id == message_id
                    && r.frame_index == frame.frame_index
            });
            if exists {
                continue;
            }
            tables.media.push(MediaEmbeddingRecord {
                id: Uuid::now_v7(),
                chat_id,
                message_id,
                media_type,
                frame_index: frame.frame_index,
                embedding: frame.embedding.clone(),
            });
            inserted += 1;
        }
        inserted
    }
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    async fn query_by_similarity(
        &self,
        collection: Collection,
        vector: &Vector,
        min_similarity: f32,
        limit: i64,
        _probes: u32,
    ) -> Result<Vec<SimilarityRow>> {
        let query = vector.as_slice();
        let tables = self.lock()?;
        let mut rows: Vec<SimilarityRow> = match collection {
            Collection::MediaEmbeddings => tables
                .media
                .iter()
                .map(|r| SimilarityRow {
                    id: r.id,
                    chat_id: r.chat_id,
                    message_id: Some(r.message_id),
                    frame_index: r.frame_index,
                    similarity: cosine_similarity(query, r.embedding.as_slice()),
                })
                .collect(),
            Collection::IgnoredMedia => tables
                .ignored
                .iter()
                .map(|e| SimilarityRow {
                    id: e.id,
                    chat_id: e.chat_id,
                    message_id: e.message_id,
                    frame_index: 0,
                    similarity: cosine_similarity(query, e.embedding.as_slice()),
                })
                .collect(),
        };
        rows.retain(|r| r.similarity >= min_similarity);
        rows.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn count_distinct_chats(&self, collection: Collection) -> Result<i64> {
        let tables = self.lock()?;
        let mut chats: Vec<i64> = match collection {
            Collection::MediaEmbeddings => tables.media.iter().map(|r| r.chat_id).collect(),
            Collection::IgnoredMedia => tables.ignored.iter().map(|e| e.chat_id).collect(),
        };
        chats.sort_unstable();
        chats.dedup();
        Ok(chats.len() as i64)
    }
}

#[async_trait]
impl MediaEmbeddingRepository for InMemoryStore {
    async fn insert_frames(
        &self,
        chat_id: i64,
        message_id: i64,
        media_type: MediaType,
        frames: &[FrameEmbedding],
    ) -> Result<u64> {
        for frame in frames {
            check_dimension(&frame.embedding)?;
        }
        let mut tables = self.lock()?;
        Ok(Self::insert_locked(
            &mut tables,
            chat_id,
            message_id,
            media_type,
            frames,
        ))
    }

    async fn replace_frames(
        &self,
        chat_id: i64,
        message_id: i64,
        media_type: MediaType,
        frames: &[FrameEmbedding],
    ) -> Result<u64> {
        for frame in frames {
            check_dimension(&frame.embedding)?;
        }
        let mut tables = self.lock()?;
        tables
            .media
            .retain(|r| !(r.chat_id == chat_id && r.message_id == message_id));
        Ok(Self::insert_locked(
            &mut tables,
            chat_id,
            message_id,
            media_type,
            frames,
        ))
    }

    async fn get_for_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Vec<MediaEmbeddingRecord>> {
        let tables = self.lock()?;
        let mut rows: Vec<MediaEmbeddingRecord> = tables
            .media
            .iter()
            .filter(|r| r.chat_id == chat_id && r.message_id == message_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.frame_index);
        Ok(rows)
    }

    async fn max_message_id(&self, chat_id: i64) -> Result<Option<i64>> {
        let tables = self.lock()?;
        Ok(tables
            .media
            .iter()
            .filter(|r| r.chat_id == chat_id)
            .map(|r| r.message_id)
            .max())
    }

    async fn count_for_chat(&self, chat_id: i64, media_type: Option<MediaType>) -> Result<i64> {
        let tables = self.lock()?;
        Ok(tables
            .media
            .iter()
            .filter(|r| r.chat_id == chat_id && media_type.map_or(true, |t| r.media_type == t))
            .count() as i64)
    }
}

#[async_trait]
impl IgnoreListRepository for InMemoryStore {
    async fn insert(
        &self,
        chat_id: i64,
        message_id: Option<i64>,
        embedding: &Vector,
    ) -> Result<Uuid> {
        check_dimension(embedding)?;
        let id = Uuid::now_v7();
        self.lock()?.ignored.push(IgnoreListEntry {
            id,
            chat_id,
            message_id,
            embedding: embedding.clone(),
        });
        Ok(id)
    }

    async fn count_for_chat(&self, chat_id: i64) -> Result<i64> {
        let tables = self.lock()?;
        Ok(tables.ignored.iter().filter(|e| e.chat_id == chat_id).count() as i64)
    }
}

#[async_trait]
impl ChatStateRepository for InMemoryStore {
    async fn get(&self, chat_id: i64) -> Result<Option<ChatImportState>> {
        Ok(self.lock()?.chat_state.get(&chat_id).copied())
    }

    async fn upsert(&self, state: &ChatImportState) -> Result<()> {
        self.lock()?.chat_state.insert(state.chat_id, *state);
        Ok(())
    }
}
