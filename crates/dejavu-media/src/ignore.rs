//! Per-chat ignore list.
//!
//! Fingerprints are matched against every frame of incoming media within the
//! ignore radius. The list is append-only.

use std::sync::Arc;

use tracing::{error, info};

use dejavu_core::{
    Collection, FrameEmbedding, IgnoreListRepository, IncomingMedia, OutgoingReply, Result,
    SimilarityQuery,
};
use dejavu_search::TenantSearch;

use crate::encoder::{LiveMediaFetcher, MediaEncoder};
use crate::replies;
use crate::sender::ReplySender;

/// The message a command was sent in reply to.
#[derive(Debug, Clone)]
pub enum ReplyTarget {
    /// The command was not sent as a reply.
    Missing,
    /// The replied-to message carries no photo or video.
    NotMedia,
    Media(IncomingMedia),
}

/// Result of an ignore command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreOutcome {
    Rejected,
    AlreadyIgnored,
    Added { fingerprints: usize },
    Failed,
}

#[derive(Clone)]
pub struct IgnoreList {
    repo: Arc<dyn IgnoreListRepository>,
    search: Arc<TenantSearch>,
    encoder: MediaEncoder,
    fetcher: LiveMediaFetcher,
    sender: ReplySender,
    threshold: f32,
}

impl IgnoreList {
    pub fn new(
        repo: Arc<dyn IgnoreListRepository>,
        search: Arc<TenantSearch>,
        encoder: MediaEncoder,
        fetcher: LiveMediaFetcher,
        sender: ReplySender,
        threshold: f32,
    ) -> Self {
        Self {
            repo,
            search,
            encoder,
            fetcher,
            sender,
            threshold,
        }
    }

    /// Whether any frame lies within the ignore radius of a fingerprint.
    pub async fn is_ignored(&self, chat_id: i64, frames: &[FrameEmbedding]) -> Result<bool> {
        for frame in frames {
            let page = self
                .search
                .search(
                    &SimilarityQuery::new(
                        Collection::IgnoredMedia,
                        frame.embedding.clone(),
                        chat_id,
                    )
                    .with_min_similarity(self.threshold)
                    .with_limit(1),
                )
                .await?;
            if !page.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Handle the moderator command that adds replied-to media to the list.
    pub async fn ignore_command(
        &self,
        chat_id: i64,
        command_message_id: i64,
        target: ReplyTarget,
    ) -> IgnoreOutcome {
        let reply = |text: &str| OutgoingReply::new(chat_id, text).reply_to(command_message_id);
        let media = match target {
            ReplyTarget::Missing => {
                self.sender.send(reply(replies::IGNORE_NOT_A_REPLY)).await;
                return IgnoreOutcome::Rejected;
            }
            ReplyTarget::NotMedia => {
                self.sender.send(reply(replies::IGNORE_NOT_MEDIA)).await;
                return IgnoreOutcome::Rejected;
            }
            ReplyTarget::Media(media) => media,
        };

        let outcome = match self.add(&media).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    subsystem = "media",
                    component = "ignore",
                    chat_id,
                    message_id = media.message_id,
                    error = %e,
                    "Failed to add media to ignore list"
                );
                IgnoreOutcome::Failed
            }
        };
        let text = match outcome {
            IgnoreOutcome::AlreadyIgnored => replies::IGNORE_ALREADY,
            IgnoreOutcome::Added { .. } => replies::IGNORE_ADDED,
            _ => replies::IGNORE_FAILED,
        };
        self.sender.send(reply(text)).await;
        outcome
    }

    async fn add(&self, media: &IncomingMedia) -> Result<IgnoreOutcome> {
        let encoded = self.fetcher.encode(&self.encoder, &media.attachment).await?;
        if self.is_ignored(media.chat_id, &encoded.frames).await? {
            return Ok(IgnoreOutcome::AlreadyIgnored);
        }
        for frame in &encoded.frames {
            self.repo
                .insert(media.chat_id, Some(media.message_id), &frame.embedding)
                .await?;
        }
        info!(
            subsystem = "media",
            component = "ignore",
            op = "add",
            chat_id = media.chat_id,
            message_id = media.message_id,
            fingerprints = encoded.frames.len(),
            "Media added to ignore list"
        );
        Ok(IgnoreOutcome::Added {
            fingerprints: encoded.frames.len(),
        })
    }
}
