//! Global similarity queries against the VectorChord indexes.
//!
//! Both collections carry one `vchordrq` cosine index over every chat. The
//! index cannot filter by chat, so queries here are deliberately global and
//! the per-chat narrowing happens in `dejavu-search`.

use std::time::Instant;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use dejavu_core::{Collection, Error, Result, SimilarityRow, VectorIndex};

use crate::check_dimension;

/// PostgreSQL implementation of VectorIndex.
#[derive(Clone)]
pub struct PgVectorIndex {
    pool: Pool<Postgres>,
}

impl PgVectorIndex {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn similarity_sql(collection: Collection) -> String {
        let frame_column = match collection {
            Collection::MediaEmbeddings => "frame_index",
            Collection::IgnoredMedia => "0 AS frame_index",
        };
        format!(
            "SELECT id, chat_id, message_id, {frame_column},
                    (1 - (embedding <=> $1))::real AS similarity
             FROM {table}
             WHERE (embedding <=> $1) <= $2
             ORDER BY embedding <=> $1
             LIMIT $3",
            table = collection.table_name(),
        )
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn query_by_similarity(
        &self,
        collection: Collection,
        vector: &Vector,
        min_similarity: f32,
        limit: i64,
        probes: u32,
    ) -> Result<Vec<SimilarityRow>> {
        check_dimension(vector)?;
        let start = Instant::now();
        let max_distance = 1.0 - f64::from(min_similarity);

        // The probes setting is transaction-local, so the query must share it.
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        sqlx::query("SELECT set_config('vchordrq.probes', $1, true)")
            .bind(probes.to_string())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let rows = sqlx::query(&Self::similarity_sql(collection))
            .bind(vector)
            .bind(max_distance)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await
            .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;

        let rows: Vec<SimilarityRow> = rows
            .into_iter()
            .map(|row| SimilarityRow {
                id: row.get("id"),
                chat_id: row.get("chat_id"),
                message_id: row.get("message_id"),
                frame_index: row.get("frame_index"),
                similarity: row.get("similarity"),
            })
            .collect();

        debug!(
            subsystem = "db",
            component = "vector_index",
            op = "query_by_similarity",
            collection = %collection,
            candidate_count = rows.len(),
            limit,
            probes,
            duration_ms = start.elapsed().as_millis() as u64,
            "Global similarity query complete"
        );
        Ok(rows)
    }

    async fn count_distinct_chats(&self, collection: Collection) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(DISTINCT chat_id) FROM {}",
            collection.table_name()
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_sql_targets_collection_table() {
        let sql = PgVectorIndex::similarity_sql(Collection::MediaEmbeddings);
        assert!(sql.contains("FROM media_embedding"));
        assert!(sql.contains("frame_index"));

        let sql = PgVectorIndex::similarity_sql(Collection::IgnoredMedia);
        assert!(sql.contains("FROM ignored_media"));
        assert!(sql.contains("0 AS frame_index"));
    }

    #[test]
    fn test_similarity_sql_orders_by_distance() {
        let sql = PgVectorIndex::similarity_sql(Collection::MediaEmbeddings);
        assert!(sql.contains("ORDER BY embedding <=> $1"));
        assert!(sql.contains("LIMIT $3"));
    }
}
