//! Media embedding repository implementation.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use dejavu_core::{
    Error, FrameEmbedding, MediaEmbeddingRecord, MediaEmbeddingRepository, MediaType, Result,
};

use crate::check_dimension;

/// PostgreSQL implementation of MediaEmbeddingRepository.
#[derive(Clone)]
pub struct PgMediaEmbeddingRepository {
    pool: Pool<Postgres>,
}

impl PgMediaEmbeddingRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert frames inside an existing transaction.
    pub async fn insert_frames_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        chat_id: i64,
        message_id: i64,
        media_type: MediaType,
        frames: &[FrameEmbedding],
    ) -> Result<u64> {
        let mut inserted = 0;
        for frame in frames {
            check_dimension(&frame.embedding)?;
            let result = sqlx::query(
                "INSERT INTO media_embedding (id, chat_id, message_id, media_type, frame_index, embedding)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (chat_id, message_id, frame_index) DO NOTHING",
            )
            .bind(Uuid::now_v7())
            .bind(chat_id)
            .bind(message_id)
            .bind(media_type.as_str())
            .bind(frame.frame_index)
            .bind(&frame.embedding)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }
}

#[async_trait]
impl MediaEmbeddingRepository for PgMediaEmbeddingRepository {
    async fn insert_frames(
        &self,
        chat_id: i64,
        message_id: i64,
        media_type: MediaType,
        frames: &[FrameEmbedding],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let inserted = self
            .insert_frames_tx(&mut tx, chat_id, message_id, media_type, frames)
            .await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(inserted)
    }

    async fn replace_frames(
        &self,
        chat_id: i64,
        message_id: i64,
        media_type: MediaType,
        frames: &[FrameEmbedding],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        sqlx::query("DELETE FROM media_embedding WHERE chat_id = $1 AND message_id = $2")
            .bind(chat_id)
            .bind(message_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        let inserted = self
            .insert_frames_tx(&mut tx, chat_id, message_id, media_type, frames)
            .await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(inserted)
    }

    async fn get_for_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Vec<MediaEmbeddingRecord>> {
        let rows = sqlx::query(
            "SELECT id, chat_id, message_id, media_type, frame_index, embedding
             FROM media_embedding
             WHERE chat_id = $1 AND message_id = $2
             ORDER BY frame_index",
        )
        .bind(chat_id)
        .bind(message_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter()
            .map(|row| {
                let media_type: String = row.get("media_type");
                Ok(MediaEmbeddingRecord {
                    id: row.get("id"),
                    chat_id: row.get("chat_id"),
                    message_id: row.get("message_id"),
                    media_type: media_type.parse().map_err(Error::Serialization)?,
                    frame_index: row.get("frame_index"),
                    embedding: row.get::<Vector, _>("embedding"),
                })
            })
            .collect()
    }

    async fn max_message_id(&self, chat_id: i64) -> Result<Option<i64>> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(message_id) FROM media_embedding WHERE chat_id = $1")
                .bind(chat_id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(max)
    }

    async fn count_for_chat(&self, chat_id: i64, media_type: Option<MediaType>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM media_embedding
             WHERE chat_id = $1 AND ($2::varchar IS NULL OR media_type = $2)",
        )
        .bind(chat_id)
        .bind(media_type.map(|t| t.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }
}
