//! # dejavu-core
//!
//! Core types, traits, and abstractions for the dejavu media-intelligence engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other dejavu crates depend on: the stored record shapes, the
//! collaborator seams (store, embedding provider, chat transport, history
//! session) and the shared error type.

pub mod defaults;
pub mod error;
pub mod links;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use links::{link_chat_id, message_link};
pub use models::*;
pub use traits::*;
