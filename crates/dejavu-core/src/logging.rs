//! Structured logging schema and field name constants for dejavu.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation can query ingestion, search and sweep events uniformly.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention (sweep aborted) |
//! | WARN  | Recoverable per-item issue (download, decode, send failed) |
//! | INFO  | Lifecycle events, sweep start/finish, ignore-list additions |
//! | DEBUG | Decision points (multiplier refresh, ignore hit, sweep plan) |
//! | TRACE | Per-row data (individual similarity rows) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "search", "inference", "media", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "tenant_search", "ingestion", "backfill", "retrieval"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "search", "ingest", "sweep", "reindex", "send"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Chat (tenant) identifier.
pub const CHAT_ID: &str = "chat_id";

/// Message identifier within a chat.
pub const MESSAGE_ID: &str = "message_id";

/// Keyframe index within a video message.
pub const FRAME_INDEX: &str = "frame_index";

/// Logical collection queried ("media_embedding", "ignored_media").
pub const COLLECTION: &str = "collection";

/// Retrieval query text.
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search.
pub const RESULT_COUNT: &str = "result_count";

/// Number of candidate rows fetched from the global index.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Oversampling multiplier applied to a search.
pub const MULTIPLIER: &str = "multiplier";

/// Sweep watermark (highest processed message id).
pub const WATERMARK: &str = "watermark";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
