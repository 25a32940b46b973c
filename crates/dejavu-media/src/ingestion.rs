//! Live media ingestion: ignore check, duplicate detection, persistence and
//! duplicate alerts.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use dejavu_core::{
    Collection, FrameEmbedding, IncomingMedia, MediaEmbeddingRepository, OutgoingReply, RecordKey,
    Result, SimilarityQuery,
};
use dejavu_search::TenantSearch;

use crate::coordinator::SweepCoordinator;
use crate::encoder::{LiveMediaFetcher, MediaEncoder};
use crate::ignore::IgnoreList;
use crate::replies;
use crate::sender::ReplySender;

/// An earlier message whose media matched new media.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub message_id: i64,
    pub similarity: f32,
}

/// What happened to one incoming media message.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// A sweep was running; the message was dropped.
    Suspended,
    /// The media matched the ignore list; it was stored without alerts.
    Ignored { frames: usize },
    Checked {
        matches: Vec<DuplicateMatch>,
        frames: usize,
        alerts_sent: usize,
    },
}

#[derive(Clone)]
pub struct IngestionPipeline {
    media: Arc<dyn MediaEmbeddingRepository>,
    search: Arc<TenantSearch>,
    ignore: IgnoreList,
    encoder: MediaEncoder,
    fetcher: LiveMediaFetcher,
    sender: ReplySender,
    coordinator: SweepCoordinator,
    image_threshold: f32,
    match_count: i64,
}

impl IngestionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        media: Arc<dyn MediaEmbeddingRepository>,
        search: Arc<TenantSearch>,
        ignore: IgnoreList,
        encoder: MediaEncoder,
        fetcher: LiveMediaFetcher,
        sender: ReplySender,
        coordinator: SweepCoordinator,
        image_threshold: f32,
        match_count: i64,
    ) -> Self {
        Self {
            media,
            search,
            ignore,
            encoder,
            fetcher,
            sender,
            coordinator,
            image_threshold,
            match_count,
        }
    }

    /// Process one live photo or video message.
    ///
    /// Alerts are sent after the embeddings are stored, so a failed send never
    /// loses the record. A failure before storing leaves nothing behind.
    pub async fn ingest(&self, media: &IncomingMedia) -> Result<IngestOutcome> {
        if self.coordinator.is_sweeping() {
            debug!(
                subsystem = "media",
                component = "ingestion",
                chat_id = media.chat_id,
                message_id = media.message_id,
                "Sweep running, live media dropped"
            );
            return Ok(IngestOutcome::Suspended);
        }

        let encoded = self.fetcher.encode(&self.encoder, &media.attachment).await?;
        let frames = encoded.frames.len();

        let ignored = self.ignore.is_ignored(media.chat_id, &encoded.frames).await?;
        let matches = if ignored {
            Vec::new()
        } else {
            self.find_duplicates(media, &encoded.frames).await?
        };

        self.media
            .insert_frames(
                media.chat_id,
                media.message_id,
                encoded.media_type,
                &encoded.frames,
            )
            .await?;

        if ignored {
            info!(
                subsystem = "media",
                component = "ingestion",
                chat_id = media.chat_id,
                message_id = media.message_id,
                frames,
                "Media matched ignore list"
            );
            return Ok(IngestOutcome::Ignored { frames });
        }

        let alerts_sent = self.send_alerts(media, &matches).await;
        info!(
            subsystem = "media",
            component = "ingestion",
            chat_id = media.chat_id,
            message_id = media.message_id,
            media_type = %encoded.media_type,
            frames,
            matches = matches.len(),
            alerts_sent,
            "Media ingested"
        );
        Ok(IngestOutcome::Checked {
            matches,
            frames,
            alerts_sent,
        })
    }

    /// Best earlier messages across all frames, strongest first.
    async fn find_duplicates(
        &self,
        media: &IncomingMedia,
        frames: &[FrameEmbedding],
    ) -> Result<Vec<DuplicateMatch>> {
        let mut best: HashMap<i64, f32> = HashMap::new();
        for frame in frames {
            let page = self
                .search
                .search(
                    &SimilarityQuery::new(
                        Collection::MediaEmbeddings,
                        frame.embedding.clone(),
                        media.chat_id,
                    )
                    .with_min_similarity(self.image_threshold)
                    .with_limit(self.match_count),
                )
                .await?;
            for hit in page.hits {
                let RecordKey::Message(message_id) = hit.record else {
                    continue;
                };
                if message_id == media.message_id {
                    continue;
                }
                let entry = best.entry(message_id).or_insert(hit.similarity);
                if hit.similarity > *entry {
                    *entry = hit.similarity;
                }
            }
        }

        let mut matches: Vec<DuplicateMatch> = best
            .into_iter()
            .map(|(message_id, similarity)| DuplicateMatch {
                message_id,
                similarity,
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(a.message_id.cmp(&b.message_id))
        });
        matches.truncate(self.match_count.max(0) as usize);
        Ok(matches)
    }

    async fn send_alerts(&self, media: &IncomingMedia, matches: &[DuplicateMatch]) -> usize {
        if matches.is_empty() {
            return 0;
        }
        let mut alerts = Vec::with_capacity(matches.len() + 1);
        alerts.push(
            OutgoingReply::new(media.chat_id, replies::DUPLICATE_HEADER)
                .reply_to(media.message_id),
        );
        for (position, found) in matches.iter().enumerate() {
            alerts.push(
                OutgoingReply::new(
                    media.chat_id,
                    replies::duplicate_alert(
                        position,
                        media.chat_id,
                        found.message_id,
                        found.similarity,
                    ),
                )
                .reply_to(found.message_id)
                .silent(),
            );
        }
        self.sender.send_paced(alerts).await
    }
}
