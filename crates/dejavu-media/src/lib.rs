//! # dejavu-media
//!
//! Media intelligence for group chats.
//!
//! This crate provides:
//! - Live ingestion: ignore check, duplicate detection, persistence, alerts
//! - The per-chat ignore list and its moderator command
//! - The backfill/reindex state machine behind the history import command
//! - Text retrieval with continuation-based paging
//! - [`MediaEngine`], which owns the sweep latch and the oversampling cache
//!   and routes events from the command layer
//!
//! ## Example
//!
//! ```ignore
//! use dejavu_media::{ChatEvent, Collaborators, MediaConfig, MediaEngine, MediaStore};
//!
//! let db = dejavu_db::Database::connect(&database_url).await?;
//! let engine = MediaEngine::new(
//!     MediaStore::from_database(&db),
//!     collaborators,
//!     MediaConfig::from_env()?,
//! );
//! engine.handle(ChatEvent::Media(incoming)).await?;
//! ```

pub mod backfill;
pub mod config;
pub mod continuation;
pub mod coordinator;
pub mod encoder;
pub mod engine;
pub mod features;
pub mod ignore;
pub mod ingestion;
pub mod replies;
pub mod retrieval;
pub mod sender;
pub mod testing;

pub use dejavu_core::*;

pub use backfill::{BackfillService, ImportOutcome, SweepReport};
pub use config::MediaConfig;
pub use continuation::{Continuation, ContinuationStore, CONTINUATION_PREFIX};
pub use coordinator::{SweepCoordinator, SweepGuard};
pub use encoder::{EncodedMedia, HttpMediaDownloader, LiveMediaFetcher, MediaEncoder};
pub use engine::{ChatEvent, Collaborators, EventOutcome, MediaEngine, MediaStore};
pub use features::{features, FeatureRegistration, Trigger};
pub use ignore::{IgnoreList, IgnoreOutcome, ReplyTarget};
pub use ingestion::{DuplicateMatch, IngestOutcome, IngestionPipeline};
pub use retrieval::{RetrievalOutcome, RetrievalService};
pub use sender::ReplySender;
