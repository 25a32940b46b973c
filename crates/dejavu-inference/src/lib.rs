//! # dejavu-inference
//!
//! Embedding provider for dejavu.
//!
//! This crate provides:
//! - An HTTP backend for a CLIP-style image/text embedding server
//! - Keyframe extraction with ffmpeg at fixed relative positions
//! - Query language detection ahead of text embedding
//! - A deterministic mock embedder and extractor (feature `mock`)
//!
//! # Feature Flags
//!
//! - `mock`: Enable the mock provider for tests in downstream crates

pub mod clip;
pub mod keyframes;
pub mod language;

// Mock embedding provider for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use dejavu_core::*;

pub use clip::{ClipConfig, ClipHttpBackend};
pub use keyframes::FfmpegKeyframeExtractor;
pub use language::{is_latin, prepare_query};
