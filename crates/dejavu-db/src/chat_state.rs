//! Chat import state repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use dejavu_core::{ChatImportState, ChatStateRepository, Error, Result};

/// PostgreSQL implementation of ChatStateRepository.
#[derive(Clone)]
pub struct PgChatStateRepository {
    pool: Pool<Postgres>,
}

impl PgChatStateRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// When the chat's state was last written.
    pub async fn updated_at(&self, chat_id: i64) -> Result<Option<DateTime<Utc>>> {
        sqlx::query_scalar("SELECT updated_at FROM chat_import_state WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }
}

#[async_trait]
impl ChatStateRepository for PgChatStateRepository {
    async fn get(&self, chat_id: i64) -> Result<Option<ChatImportState>> {
        let row = sqlx::query(
            "SELECT chat_id, is_media_imported, is_video_imported_by_frames
             FROM chat_import_state WHERE chat_id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| ChatImportState {
            chat_id: row.get("chat_id"),
            is_media_imported: row.get("is_media_imported"),
            is_video_imported_by_frames: row.get("is_video_imported_by_frames"),
        }))
    }

    async fn upsert(&self, state: &ChatImportState) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_import_state (chat_id, is_media_imported, is_video_imported_by_frames, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (chat_id) DO UPDATE
             SET is_media_imported = $2, is_video_imported_by_frames = $3, updated_at = NOW()",
        )
        .bind(state.chat_id)
        .bind(state.is_media_imported)
        .bind(state.is_video_imported_by_frames)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
