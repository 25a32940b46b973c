//! Mock embedding provider for deterministic testing.
//!
//! Unknown inputs hash to a pseudo-random unit vector, so identical bytes
//! always embed identically and distinct bytes are nearly orthogonal.
//! Specific inputs can be pinned to chosen vectors.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dejavu_inference::mock::{MockEmbedder, MockKeyframeExtractor};
//!
//! let embedder = MockEmbedder::new()
//!     .with_text("a cat", cat_vector)
//!     .with_failing_image(b"corrupt");
//! let extractor = MockKeyframeExtractor::new().with_frame_count(4);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use dejavu_core::defaults::{EMBED_DIMENSION, KEYFRAME_POSITIONS};
use dejavu_core::{Error, Keyframe, KeyframeExtractor, MediaEmbedder, Result, Vector};

/// Deterministic unit vector derived from `seed`.
pub fn hashed_vector(seed: &[u8], dimension: usize) -> Vector {
    let mut values = Vec::with_capacity(dimension);
    let mut counter: u32 = 0;
    while values.len() < dimension {
        let digest = Sha256::new()
            .chain_update(seed)
            .chain_update(counter.to_le_bytes())
            .finalize();
        for chunk in digest.chunks(2) {
            if values.len() == dimension {
                break;
            }
            let raw = u16::from_le_bytes([chunk[0], chunk[1]]);
            values.push(raw as f32 / u16::MAX as f32 * 2.0 - 1.0);
        }
        counter += 1;
    }
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
    Vector::from(values)
}

#[derive(Default)]
struct EmbedderState {
    images: HashMap<Vec<u8>, Vector>,
    texts: HashMap<String, Vector>,
    failing_images: HashSet<Vec<u8>>,
    failing_texts: HashSet<String>,
    image_calls: usize,
    text_calls: usize,
}

/// Mock image/text embedder.
#[derive(Clone)]
pub struct MockEmbedder {
    dimension: usize,
    state: Arc<Mutex<EmbedderState>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: EMBED_DIMENSION,
            state: Arc::new(Mutex::new(EmbedderState::default())),
        }
    }

    /// Pin the vector returned for specific image bytes.
    pub fn with_image(self, bytes: &[u8], vector: Vector) -> Self {
        self.state.lock().unwrap().images.insert(bytes.to_vec(), vector);
        self
    }

    /// Pin the vector returned for a text query.
    pub fn with_text(self, text: &str, vector: Vector) -> Self {
        self.state.lock().unwrap().texts.insert(text.to_string(), vector);
        self
    }

    /// Make embedding these image bytes fail.
    pub fn with_failing_image(self, bytes: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_images
            .insert(bytes.to_vec());
        self
    }

    /// Make embedding this text query fail.
    pub fn with_failing_text(self, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_texts
            .insert(text.to_string());
        self
    }

    pub fn image_call_count(&self) -> usize {
        self.state.lock().unwrap().image_calls
    }

    pub fn text_call_count(&self) -> usize {
        self.state.lock().unwrap().text_calls
    }
}

#[async_trait]
impl MediaEmbedder for MockEmbedder {
    async fn embed_image(&self, image: &[u8]) -> Result<Vector> {
        let mut state = self.state.lock().unwrap();
        state.image_calls += 1;
        if state.failing_images.contains(image) {
            return Err(Error::Embedding("mock image failure".to_string()));
        }
        Ok(state
            .images
            .get(image)
            .cloned()
            .unwrap_or_else(|| hashed_vector(image, self.dimension)))
    }

    async fn embed_text(&self, text: &str) -> Result<Vector> {
        let mut state = self.state.lock().unwrap();
        state.text_calls += 1;
        if state.failing_texts.contains(text) {
            return Err(Error::Embedding("mock text failure".to_string()));
        }
        Ok(state
            .texts
            .get(text)
            .cloned()
            .unwrap_or_else(|| hashed_vector(text.as_bytes(), self.dimension)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-clip"
    }
}

/// Mock keyframe extractor.
///
/// Frame `i` of a video is the video bytes followed by `#i`. Videos can be
/// pinned to explicit frames, or marked undecodable.
#[derive(Clone)]
pub struct MockKeyframeExtractor {
    frame_count: usize,
    pinned: Arc<Mutex<HashMap<Vec<u8>, Vec<Keyframe>>>>,
    failing: Arc<Mutex<HashSet<Vec<u8>>>>,
}

impl Default for MockKeyframeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKeyframeExtractor {
    pub fn new() -> Self {
        Self {
            frame_count: KEYFRAME_POSITIONS.len(),
            pinned: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = frame_count;
        self
    }

    /// Return exactly these frame payloads for a video, indexed in order.
    pub fn with_frames(self, video: &[u8], frames: Vec<Vec<u8>>) -> Self {
        let keyframes = frames
            .into_iter()
            .enumerate()
            .map(|(i, bytes)| Keyframe {
                frame_index: i as i32,
                timestamp_secs: i as f64,
                bytes,
            })
            .collect();
        self.pinned.lock().unwrap().insert(video.to_vec(), keyframes);
        self
    }

    /// Make extraction of this video fail.
    pub fn with_failing_video(self, video: &[u8]) -> Self {
        self.failing.lock().unwrap().insert(video.to_vec());
        self
    }

    /// Payload the default extractor produces for frame `index` of `video`.
    pub fn frame_bytes(video: &[u8], index: usize) -> Vec<u8> {
        let mut bytes = video.to_vec();
        bytes.extend_from_slice(format!("#{}", index).as_bytes());
        bytes
    }
}

#[async_trait]
impl KeyframeExtractor for MockKeyframeExtractor {
    async fn extract_keyframes(&self, video: &[u8]) -> Result<Vec<Keyframe>> {
        if self.failing.lock().unwrap().contains(video) {
            return Err(Error::Decode("mock undecodable video".to_string()));
        }
        if let Some(frames) = self.pinned.lock().unwrap().get(video) {
            return Ok(frames.clone());
        }
        Ok((0..self.frame_count)
            .map(|i| Keyframe {
                frame_index: i as i32,
                timestamp_secs: KEYFRAME_POSITIONS.get(i).copied().unwrap_or(1.0),
                bytes: Self::frame_bytes(video, i),
            })
            .collect())
    }
}
