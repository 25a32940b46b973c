//! Centralized default constants for dejavu.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration loaders fall back to these when an environment variable is
//! unset or unparsable.

// =============================================================================
// EMBEDDING
// =============================================================================

/// Dimension of the shared image/text embedding space.
pub const EMBED_DIMENSION: usize = 512;

/// Default CLIP model served by the embedding server.
pub const CLIP_MODEL: &str = "clip-vit-base-patch16";

/// Default embedding server base URL.
pub const CLIP_URL: &str = "http://127.0.0.1:8090";

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// VIDEO
// =============================================================================

/// Relative positions (fraction of duration) at which keyframes are taken.
///
/// Indexing and searching use the same positions, so frame `i` of one video
/// is comparable with frame `i` of another.
pub const KEYFRAME_POSITIONS: [f64; 4] = [0.1, 0.3, 0.5, 0.7];

/// Timeout for each ffmpeg/ffprobe invocation in seconds.
pub const FFMPEG_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// MATCHING
// =============================================================================

/// Minimum similarity for a stored image to count as a duplicate.
pub const MATCH_IMAGE_THRESHOLD: f32 = 0.96;

/// Minimum similarity for text retrieval (favors recall).
pub const MATCH_TEXT_THRESHOLD: f32 = 0.24;

/// Maximum number of duplicate alerts and retrieval replies per page.
pub const MATCH_IMAGE_COUNT: i64 = 3;

/// Cosine-distance radius for ignore-list fingerprints (similarity >= 0.96).
pub const IGNORE_RADIUS: f32 = 0.04;

// =============================================================================
// SEARCH
// =============================================================================

/// How long the distinct-chat count behind the oversampling multiplier is trusted.
pub const CHAT_COUNT_TTL_SECS: u64 = 20 * 60;

/// Oversampling factor per distinct chat.
pub const OVERSAMPLE_PER_CHAT: i64 = 5;

/// Upper bound of the oversampling multiplier.
pub const OVERSAMPLE_MAX: i64 = 50;

/// Default number of index lists probed per query.
pub const SEARCH_PROBES: u32 = 10;

// =============================================================================
// OUTBOUND MESSAGING
// =============================================================================

/// Fixed delay between consecutive outbound replies, in milliseconds.
pub const REPLY_DELAY_MS: u64 = 1000;

/// Platform limit on inline control payload size, in bytes.
pub const CALLBACK_DATA_MAX_BYTES: usize = 64;

/// Largest retrieval offset a continuation may carry.
pub const MAX_CONTINUATION_OFFSET: i64 = 10_000;

/// Queries too long for inline continuations that are remembered server-side.
pub const CONTINUATION_CAPACITY: usize = 1024;

// =============================================================================
// STORE
// =============================================================================

/// Default database URL for local development.
pub const DATABASE_URL: &str = "postgres://localhost/dejavu";

/// Default maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_radius_matches_image_threshold() {
        assert!((1.0 - IGNORE_RADIUS - MATCH_IMAGE_THRESHOLD).abs() < 1e-6);
    }

    #[test]
    fn test_keyframe_positions_are_ordered_fractions() {
        let mut prev = 0.0;
        for p in KEYFRAME_POSITIONS {
            assert!(p > prev && p < 1.0);
            prev = p;
        }
    }

    #[test]
    fn test_max_offset_fits_inline_continuation() {
        let payload = format!(r#"islm-{{"k":"{}","o":{}}}"#, "0".repeat(16), MAX_CONTINUATION_OFFSET);
        assert!(payload.len() <= CALLBACK_DATA_MAX_BYTES);
    }

    #[test]
    fn test_retrieval_is_looser_than_duplicate_detection() {
        assert!(MATCH_TEXT_THRESHOLD < MATCH_IMAGE_THRESHOLD);
    }
}
