//! Core data models for dejavu.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use pgvector::Vector;

// =============================================================================
// STORED RECORDS
// =============================================================================

/// Kind of media a stored embedding row was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Photo => "photo",
            MediaType::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "photo" => Ok(Self::Photo),
            "video" => Ok(Self::Video),
            _ => Err(format!("Invalid media type: {}", s)),
        }
    }
}

/// One stored embedding row: a photo, or one keyframe of a video.
///
/// All rows of a `(chat_id, message_id)` pair share `media_type`, and
/// `frame_index` is unique within the pair (always 0 for photos).
#[derive(Debug, Clone)]
pub struct MediaEmbeddingRecord {
    pub id: Uuid,
    pub chat_id: i64,
    pub message_id: i64,
    pub media_type: MediaType,
    pub frame_index: i32,
    pub embedding: Vector,
}

/// An embedding computed for one frame, not yet persisted.
#[derive(Debug, Clone)]
pub struct FrameEmbedding {
    pub frame_index: i32,
    pub embedding: Vector,
}

impl FrameEmbedding {
    pub fn new(frame_index: i32, embedding: Vector) -> Self {
        Self {
            frame_index,
            embedding,
        }
    }
}

/// A moderator-curated fingerprint that must never raise a duplicate alert.
#[derive(Debug, Clone)]
pub struct IgnoreListEntry {
    pub id: Uuid,
    pub chat_id: i64,
    /// Message the fingerprint was taken from, when known.
    pub message_id: Option<i64>,
    pub embedding: Vector,
}

/// Per-chat backfill progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatImportState {
    pub chat_id: i64,
    pub is_media_imported: bool,
    pub is_video_imported_by_frames: bool,
}

impl ChatImportState {
    /// State of a chat that has never been swept.
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            ..Default::default()
        }
    }

    /// State after a complete full-history sweep.
    pub fn fully_imported(chat_id: i64) -> Self {
        Self {
            chat_id,
            is_media_imported: true,
            is_video_imported_by_frames: true,
        }
    }

    pub fn phase(&self) -> ImportPhase {
        match (self.is_media_imported, self.is_video_imported_by_frames) {
            (false, _) => ImportPhase::NotImported,
            (true, false) => ImportPhase::VideoLegacy,
            (true, true) => ImportPhase::VideoFramed,
        }
    }
}

/// Durable phase of the backfill state machine for one chat.
///
/// `Importing` and `ReindexingVideo` are transient and only exist while a
/// sweep holds the coordinator, so they are not represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    /// Never swept (or a previous sweep did not finish).
    NotImported,
    /// Swept with the single-thumbnail video representation.
    VideoLegacy,
    /// Swept with the multi-frame video representation.
    VideoFramed,
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotImported => write!(f, "not_imported"),
            Self::VideoLegacy => write!(f, "video_legacy"),
            Self::VideoFramed => write!(f, "video_framed"),
        }
    }
}

// =============================================================================
// SIMILARITY SEARCH
// =============================================================================

/// Logical vector collection in the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Embeddings of every posted photo and video keyframe.
    MediaEmbeddings,
    /// Ignore-list fingerprints.
    IgnoredMedia,
}

impl Collection {
    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::MediaEmbeddings => "media_embedding",
            Collection::IgnoredMedia => "ignored_media",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// One row returned by a global (cross-chat) similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityRow {
    pub id: Uuid,
    pub chat_id: i64,
    pub message_id: Option<i64>,
    pub frame_index: i32,
    /// Cosine similarity, `1 - cosine_distance`.
    pub similarity: f32,
}

impl SimilarityRow {
    /// Identity of the logical record this row belongs to.
    ///
    /// Media rows group by message (all keyframes of a video are one record).
    /// Ignore-list rows are records of their own.
    pub fn record_key(&self, collection: Collection) -> RecordKey {
        match (collection, self.message_id) {
            (Collection::MediaEmbeddings, Some(message_id)) => RecordKey::Message(message_id),
            _ => RecordKey::Entry(self.id),
        }
    }
}

/// Reference to a logical record in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Message(i64),
    Entry(Uuid),
}

/// A per-chat search hit: the best-matching row of one logical record.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub record: RecordKey,
    pub row_id: Uuid,
    pub message_id: Option<i64>,
    pub frame_index: i32,
    pub similarity: f32,
}

impl SimilarityHit {
    pub fn from_row(row: SimilarityRow, collection: Collection) -> Self {
        Self {
            record: row.record_key(collection),
            row_id: row.id,
            message_id: row.message_id,
            frame_index: row.frame_index,
            similarity: row.similarity,
        }
    }
}

/// Parameters of a per-chat similarity search.
#[derive(Debug, Clone)]
pub struct SimilarityQuery {
    pub collection: Collection,
    pub vector: Vector,
    pub min_similarity: f32,
    pub chat_id: i64,
    pub limit: i64,
    pub offset: i64,
}

impl SimilarityQuery {
    pub fn new(collection: Collection, vector: Vector, chat_id: i64) -> Self {
        Self {
            collection,
            vector,
            min_similarity: 0.0,
            chat_id,
            limit: crate::defaults::MATCH_IMAGE_COUNT,
            offset: 0,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// One page of per-chat search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<SimilarityHit>,
    /// The page was full. A heuristic, not a proof that more rows exist.
    pub has_more: bool,
}

impl SearchPage {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

// =============================================================================
// MEDIA
// =============================================================================

/// A still frame decoded from a video.
#[derive(Debug, Clone)]
pub struct Keyframe {
    /// Index into the fixed keyframe positions; gaps mean a frame failed to decode.
    pub frame_index: i32,
    pub timestamp_secs: f64,
    pub bytes: Vec<u8>,
}

// =============================================================================
// CHAT PLATFORM
// =============================================================================

/// Media attached to an incoming live message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaAttachment {
    /// Largest available photo size.
    Photo { file_id: String },
    /// Full video plus the platform-generated thumbnail, when present.
    Video {
        file_id: String,
        thumbnail_file_id: Option<String>,
    },
}

impl MediaAttachment {
    pub fn media_type(&self) -> MediaType {
        match self {
            MediaAttachment::Photo { .. } => MediaType::Photo,
            MediaAttachment::Video { .. } => MediaType::Video,
        }
    }
}

/// A media message received from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMedia {
    pub chat_id: i64,
    pub message_id: i64,
    pub attachment: MediaAttachment,
}

/// Inline control attached to an outgoing reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineControl {
    pub label: String,
    /// Opaque payload handed back when the control is pressed.
    pub payload: String,
}

/// A reply to be sent to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingReply {
    pub chat_id: i64,
    pub text: String,
    /// Message this reply addresses; sent even if that message no longer exists.
    pub reply_to: Option<i64>,
    /// Suppress the recipient notification.
    pub silent: bool,
    pub control: Option<InlineControl>,
}

impl OutgoingReply {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            silent: false,
            control: None,
        }
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn with_control(mut self, control: InlineControl) -> Self {
        self.control = Some(control);
        self
    }
}

// =============================================================================
// CHAT HISTORY
// =============================================================================

/// Which messages a history iteration yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFilter {
    PhotoVideo,
    Video,
}

impl HistoryFilter {
    pub fn accepts(&self, media_type: MediaType) -> bool {
        match self {
            HistoryFilter::PhotoVideo => true,
            HistoryFilter::Video => media_type == MediaType::Video,
        }
    }
}

/// Downloadable media handle inside a history session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMedia {
    pub media_type: MediaType,
    /// Session-specific file location, opaque to the engine.
    pub location: String,
    /// Location of the platform thumbnail of a video, when present.
    pub thumbnail_location: Option<String>,
}

impl HistoryMedia {
    pub fn photo(location: impl Into<String>) -> Self {
        Self {
            media_type: MediaType::Photo,
            location: location.into(),
            thumbnail_location: None,
        }
    }

    pub fn video(location: impl Into<String>, thumbnail_location: Option<String>) -> Self {
        Self {
            media_type: MediaType::Video,
            location: location.into(),
            thumbnail_location,
        }
    }

    /// The thumbnail as a downloadable handle of its own.
    pub fn thumbnail(&self) -> Option<HistoryMedia> {
        self.thumbnail_location
            .as_ref()
            .map(|location| HistoryMedia::photo(location.clone()))
    }
}

/// A historical message yielded by a full-history session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub id: i64,
    pub media: HistoryMedia,
}
