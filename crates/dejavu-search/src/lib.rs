//! # dejavu-search
//!
//! Multi-tenant similarity search for dejavu.
//!
//! Every chat's media lives in one shared VectorChord index that cannot filter
//! by chat. This crate provides:
//! - The oversampling multiplier and its TTL-refreshed chat count cache
//! - The probes knob trading recall for latency
//! - Per-chat filtering, per-record deduplication and paging
//!
//! ## Example
//!
//! ```ignore
//! use dejavu_search::{TenantSearch, TenantSearchConfig};
//! use dejavu_core::{Collection, SimilarityQuery};
//!
//! let search = TenantSearch::new(index, TenantSearchConfig::from_env()?);
//! let page = search
//!     .search(
//!         &SimilarityQuery::new(Collection::MediaEmbeddings, vector, chat_id)
//!             .with_min_similarity(0.96)
//!             .with_limit(3),
//!     )
//!     .await?;
//! ```

pub mod dedup;
pub mod oversampling;
pub mod probes;
pub mod tenant;

pub use dejavu_core::*;

pub use dedup::{best_hits_for_chat, page};
pub use oversampling::{multiplier_for, OversamplingCache};
pub use probes::{RecallTarget, INDEX_LISTS};
pub use tenant::{TenantSearch, TenantSearchConfig};
