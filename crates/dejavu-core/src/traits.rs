//! Core traits for dejavu abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy: the vector store, the embedding provider, and the chat
//! platform collaborators the engine talks to.

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// STORE TRAITS
// =============================================================================

/// Approximate similarity queries over a whole collection.
///
/// The index is shared by every chat and has no per-chat predicate; callers
/// that need per-chat results go through the multi-tenant search layer.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Rows ordered by similarity descending with `similarity >= min_similarity`,
    /// at most `limit` of them. `probes` trades latency for recall.
    async fn query_by_similarity(
        &self,
        collection: Collection,
        vector: &Vector,
        min_similarity: f32,
        limit: i64,
        probes: u32,
    ) -> Result<Vec<SimilarityRow>>;

    /// Number of distinct chats with at least one row in the collection.
    async fn count_distinct_chats(&self, collection: Collection) -> Result<i64>;
}

/// Repository for per-frame media embeddings.
#[async_trait]
pub trait MediaEmbeddingRepository: Send + Sync {
    /// Insert one row per frame. Rows that already exist for the same
    /// `(chat, message, frame)` are left untouched. Returns rows inserted.
    async fn insert_frames(
        &self,
        chat_id: i64,
        message_id: i64,
        media_type: MediaType,
        frames: &[FrameEmbedding],
    ) -> Result<u64>;

    /// Delete every row of `(chat, message)` and insert `frames` in their place.
    async fn replace_frames(
        &self,
        chat_id: i64,
        message_id: i64,
        media_type: MediaType,
        frames: &[FrameEmbedding],
    ) -> Result<u64>;

    /// All rows stored for a message, ordered by frame index.
    async fn get_for_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Vec<MediaEmbeddingRecord>>;

    /// Highest message id stored for the chat.
    async fn max_message_id(&self, chat_id: i64) -> Result<Option<i64>>;

    /// Count rows for a chat, optionally restricted to one media type.
    async fn count_for_chat(&self, chat_id: i64, media_type: Option<MediaType>) -> Result<i64>;
}

/// Append-only repository of ignore-list fingerprints.
#[async_trait]
pub trait IgnoreListRepository: Send + Sync {
    /// Append a fingerprint.
    async fn insert(
        &self,
        chat_id: i64,
        message_id: Option<i64>,
        embedding: &Vector,
    ) -> Result<Uuid>;

    /// Number of fingerprints held for a chat.
    async fn count_for_chat(&self, chat_id: i64) -> Result<i64>;
}

/// Repository for per-chat backfill progress.
#[async_trait]
pub trait ChatStateRepository: Send + Sync {
    async fn get(&self, chat_id: i64) -> Result<Option<ChatImportState>>;

    async fn upsert(&self, state: &ChatImportState) -> Result<()>;
}

// =============================================================================
// EMBEDDING PROVIDER TRAITS
// =============================================================================

/// Maps images and text into one shared embedding space.
#[async_trait]
pub trait MediaEmbedder: Send + Sync {
    /// Embed an encoded image (JPEG, PNG, WebP).
    async fn embed_image(&self, image: &[u8]) -> Result<Vector>;

    /// Embed a text query into the same space as images.
    async fn embed_text(&self, text: &str) -> Result<Vector>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Decodes still frames from a video at fixed relative positions.
#[async_trait]
pub trait KeyframeExtractor: Send + Sync {
    /// Frames that fail to decode are omitted; an empty result is not an error.
    async fn extract_keyframes(&self, video: &[u8]) -> Result<Vec<Keyframe>>;
}

/// Brings a free-text query into the embedding model's language.
#[async_trait]
pub trait QueryTranslator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}

/// Leaves queries untouched.
pub struct PassthroughTranslator;

#[async_trait]
impl QueryTranslator for PassthroughTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

// =============================================================================
// CHAT PLATFORM TRAITS
// =============================================================================

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a reply and return the id of the sent message.
    async fn send_reply(&self, reply: OutgoingReply) -> Result<i64>;

    /// Remove inline controls from a previously sent message.
    async fn clear_controls(&self, chat_id: i64, message_id: i64) -> Result<()>;

    /// Resolve a downloadable URL for a media identifier.
    async fn file_url(&self, file_id: &str) -> Result<String>;
}

/// Fetches raw bytes from a resolved media URL.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// Opens the exclusive full-history session.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Failing here is fatal to the sweep that asked.
    async fn open(&self) -> Result<Box<dyn HistorySession>>;
}

/// A connected full-history session.
#[async_trait]
pub trait HistorySession: Send + Sync {
    /// Messages with `id > resume_after`, oldest first, matching `filter`.
    ///
    /// An `Err` item means the session broke; iteration cannot continue.
    fn messages(
        &self,
        chat_id: i64,
        resume_after: i64,
        filter: HistoryFilter,
    ) -> BoxStream<'_, Result<HistoryMessage>>;

    /// Download the raw file behind a historical message.
    async fn download(&self, media: &HistoryMedia) -> Result<Vec<u8>>;

    /// Disconnect the session.
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough_translator_returns_input() {
        let translated = PassthroughTranslator.translate("кіт на дивані").await.unwrap();
        assert_eq!(translated, "кіт на дивані");
    }
}
