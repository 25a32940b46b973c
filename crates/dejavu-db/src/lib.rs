//! # dejavu-db
//!
//! PostgreSQL store for dejavu.
//!
//! This crate provides:
//! - Connection pool management
//! - Per-frame media embedding storage
//! - The append-only ignore list
//! - Per-chat backfill state
//! - Global cosine queries over the VectorChord indexes
//! - An exact in-memory store implementing the same traits
//!
//! ## Example
//!
//! ```rust,ignore
//! use dejavu_db::Database;
//!
//! let db = Database::connect("postgres://localhost/dejavu").await?;
//! db.migrate().await?;
//! let latest = db.media.max_message_id(chat_id).await?;
//! ```

pub mod chat_state;
pub mod ignored_media;
pub mod media_embeddings;
pub mod memory;
pub mod pool;
pub mod vector_index;

// Always compiled so integration tests (in tests/) and downstream crates can use it
pub mod test_fixtures;

pub use dejavu_core::*;

pub use chat_state::PgChatStateRepository;
pub use ignored_media::PgIgnoreListRepository;
pub use media_embeddings::PgMediaEmbeddingRepository;
pub use memory::{cosine_similarity, InMemoryStore};
pub use pool::{create_pool, log_pool_metrics, PoolConfig};
pub use vector_index::PgVectorIndex;

use dejavu_core::defaults::EMBED_DIMENSION;

/// Reject vectors that do not match the column dimension.
pub(crate) fn check_dimension(vector: &Vector) -> Result<()> {
    let len = vector.as_slice().len();
    if len != EMBED_DIMENSION {
        return Err(Error::InvalidInput(format!(
            "embedding has {} dimensions, expected {}",
            len, EMBED_DIMENSION
        )));
    }
    Ok(())
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Per-frame media embeddings.
    pub media: PgMediaEmbeddingRepository,
    /// Ignore-list fingerprints.
    pub ignored: PgIgnoreListRepository,
    /// Per-chat backfill progress.
    pub chat_state: PgChatStateRepository,
    /// Global similarity queries over both collections.
    pub index: PgVectorIndex,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            media: PgMediaEmbeddingRepository::new(pool.clone()),
            ignored: PgIgnoreListRepository::new(pool.clone()),
            chat_state: PgChatStateRepository::new(pool.clone()),
            index: PgVectorIndex::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool settings.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, &PoolConfig::default()).await
    }

    /// Connect with explicit pool settings, e.g. [`PoolConfig::from_env`].
    pub async fn connect_with_config(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = create_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
