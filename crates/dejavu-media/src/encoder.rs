//! Media to frame embeddings.
//!
//! A photo is one frame at index 0. A video is embedded per keyframe; when no
//! keyframe can be produced the platform thumbnail stands in as frame 0.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use dejavu_core::{
    ChatTransport, Error, FrameEmbedding, KeyframeExtractor, MediaAttachment, MediaDownloader,
    MediaEmbedder, MediaType, Result,
};

/// Frames of one media item, ready to store or search.
#[derive(Debug, Clone)]
pub struct EncodedMedia {
    pub media_type: MediaType,
    pub frames: Vec<FrameEmbedding>,
}

#[derive(Clone)]
pub struct MediaEncoder {
    embedder: Arc<dyn MediaEmbedder>,
    extractor: Arc<dyn KeyframeExtractor>,
}

impl MediaEncoder {
    pub fn new(embedder: Arc<dyn MediaEmbedder>, extractor: Arc<dyn KeyframeExtractor>) -> Self {
        Self {
            embedder,
            extractor,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn MediaEmbedder> {
        &self.embedder
    }

    pub async fn encode_photo(&self, image: &[u8]) -> Result<EncodedMedia> {
        let embedding = self.embedder.embed_image(image).await?;
        Ok(EncodedMedia {
            media_type: MediaType::Photo,
            frames: vec![FrameEmbedding::new(0, embedding)],
        })
    }

    /// Embed a video's keyframes, falling back to its thumbnail.
    ///
    /// `video` is the outcome of downloading the full file. `thumbnail` is only
    /// polled when no keyframe could be embedded.
    pub async fn encode_video<F, Fut>(
        &self,
        video: Result<Vec<u8>>,
        thumbnail: F,
    ) -> Result<EncodedMedia>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Vec<u8>>>>,
    {
        let cause = match video {
            Ok(bytes) => match self.embed_keyframes(&bytes).await {
                Ok(frames) if !frames.is_empty() => {
                    return Ok(EncodedMedia {
                        media_type: MediaType::Video,
                        frames,
                    })
                }
                Ok(_) => Error::Decode("no decodable keyframes".to_string()),
                Err(e) => e,
            },
            Err(e) => e,
        };

        match thumbnail().await {
            Ok(Some(image)) => {
                debug!(
                    subsystem = "media",
                    component = "encoder",
                    cause = %cause,
                    "Using video thumbnail as frame 0"
                );
                let embedding = self.embedder.embed_image(&image).await?;
                Ok(EncodedMedia {
                    media_type: MediaType::Video,
                    frames: vec![FrameEmbedding::new(0, embedding)],
                })
            }
            Ok(None) => Err(cause),
            Err(e) => {
                warn!(
                    subsystem = "media",
                    component = "encoder",
                    error = %e,
                    "Video thumbnail unavailable"
                );
                Err(cause)
            }
        }
    }

    async fn embed_keyframes(&self, video: &[u8]) -> Result<Vec<FrameEmbedding>> {
        let keyframes = self.extractor.extract_keyframes(video).await?;
        let mut frames = Vec::with_capacity(keyframes.len());
        for keyframe in keyframes {
            match self.embedder.embed_image(&keyframe.bytes).await {
                Ok(embedding) => frames.push(FrameEmbedding::new(keyframe.frame_index, embedding)),
                Err(e) => warn!(
                    subsystem = "media",
                    component = "encoder",
                    frame_index = keyframe.frame_index,
                    error = %e,
                    "Keyframe embedding failed, skipping frame"
                ),
            }
        }
        Ok(frames)
    }
}

/// Downloads live attachments through the chat platform.
#[derive(Clone)]
pub struct LiveMediaFetcher {
    transport: Arc<dyn ChatTransport>,
    downloader: Arc<dyn MediaDownloader>,
}

impl LiveMediaFetcher {
    pub fn new(transport: Arc<dyn ChatTransport>, downloader: Arc<dyn MediaDownloader>) -> Self {
        Self {
            transport,
            downloader,
        }
    }

    pub async fn fetch(&self, file_id: &str) -> Result<Vec<u8>> {
        let url = self.transport.file_url(file_id).await?;
        self.downloader.download(&url).await
    }

    /// Fetch and encode a live attachment.
    pub async fn encode(
        &self,
        encoder: &MediaEncoder,
        attachment: &MediaAttachment,
    ) -> Result<EncodedMedia> {
        match attachment {
            MediaAttachment::Photo { file_id } => {
                let image = self.fetch(file_id).await?;
                encoder.encode_photo(&image).await
            }
            MediaAttachment::Video {
                file_id,
                thumbnail_file_id,
            } => {
                let video = self.fetch(file_id).await;
                let thumbnail_file_id = thumbnail_file_id.as_deref();
                encoder
                    .encode_video(video, move || async move {
                        match thumbnail_file_id {
                            Some(id) => self.fetch(id).await.map(Some),
                            None => Ok(None),
                        }
                    })
                    .await
            }
        }
    }
}

/// Fetches media over HTTP.
pub struct HttpMediaDownloader {
    client: reqwest::Client,
}

impl Default for HttpMediaDownloader {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl HttpMediaDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl MediaDownloader for HttpMediaDownloader {
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Request(format!("GET {} returned {}", url, status)));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
