//! Ignore-list repository implementation.
//!
//! The table is append-only; there is deliberately no delete here.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use dejavu_core::{Error, IgnoreListRepository, Result};

use crate::check_dimension;

/// PostgreSQL implementation of IgnoreListRepository.
#[derive(Clone)]
pub struct PgIgnoreListRepository {
    pool: Pool<Postgres>,
}

impl PgIgnoreListRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IgnoreListRepository for PgIgnoreListRepository {
    async fn insert(
        &self,
        chat_id: i64,
        message_id: Option<i64>,
        embedding: &Vector,
    ) -> Result<Uuid> {
        check_dimension(embedding)?;
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO ignored_media (id, chat_id, message_id, embedding) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(chat_id)
        .bind(message_id)
        .bind(embedding)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    async fn count_for_chat(&self, chat_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ignored_media WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }
}
