//! Full-history backfill and video reindex.
//!
//! The durable phase of a chat decides which sweep runs:
//!
//! | Phase | Sweep |
//! |-------|-------|
//! | `NotImported` | photos and videos from the watermark, insert |
//! | `VideoLegacy` | videos from the beginning, replace |
//! | `VideoFramed` | none |
//!
//! Flags are written only after a sweep completes. An interrupted import
//! resumes from the highest stored message id on the next invocation.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use dejavu_core::{
    ChatImportState, ChatStateRepository, HistoryFilter, HistoryMessage, HistorySession,
    HistorySource, ImportPhase, MediaEmbeddingRepository, MediaType, OutgoingReply, Result,
};

use crate::coordinator::{SweepCoordinator, SweepGuard};
use crate::encoder::{EncodedMedia, MediaEncoder};
use crate::replies;
use crate::sender::ReplySender;

/// Counters of one completed sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Phase the chat was in when the sweep started.
    pub phase: ImportPhase,
    /// Messages whose embeddings were written.
    pub processed: u64,
    /// Messages skipped after a download or decode failure.
    pub skipped: u64,
    /// Rows written.
    pub frames: u64,
}

impl SweepReport {
    fn new(phase: ImportPhase) -> Self {
        Self {
            phase,
            processed: 0,
            skipped: 0,
            frames: 0,
        }
    }
}

/// Result of the history import command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Busy,
    NothingToDo,
    Completed(SweepReport),
    Failed,
}

#[derive(Clone)]
pub struct BackfillService {
    media: Arc<dyn MediaEmbeddingRepository>,
    chat_state: Arc<dyn ChatStateRepository>,
    history: Arc<dyn HistorySource>,
    encoder: MediaEncoder,
    sender: ReplySender,
    coordinator: SweepCoordinator,
}

impl BackfillService {
    pub fn new(
        media: Arc<dyn MediaEmbeddingRepository>,
        chat_state: Arc<dyn ChatStateRepository>,
        history: Arc<dyn HistorySource>,
        encoder: MediaEncoder,
        sender: ReplySender,
        coordinator: SweepCoordinator,
    ) -> Self {
        Self {
            media,
            chat_state,
            history,
            encoder,
            sender,
            coordinator,
        }
    }

    /// Stored state of a chat, or the never-swept state.
    pub async fn state(&self, chat_id: i64) -> Result<ChatImportState> {
        Ok(self
            .chat_state
            .get(chat_id)
            .await?
            .unwrap_or_else(|| ChatImportState::new(chat_id)))
    }

    /// Handle the history import command sent as `command_message_id`.
    pub async fn history_import_command(
        &self,
        chat_id: i64,
        command_message_id: i64,
    ) -> ImportOutcome {
        let reply = |text: &str| OutgoingReply::new(chat_id, text).reply_to(command_message_id);

        let Some(guard) = self.coordinator.try_begin() else {
            self.sender.send(reply(replies::IMPORT_BUSY)).await;
            return ImportOutcome::Busy;
        };

        let state = match self.state(chat_id).await {
            Ok(state) => state,
            Err(e) => {
                error!(
                    subsystem = "media",
                    component = "backfill",
                    chat_id,
                    error = %e,
                    "Failed to load import state"
                );
                drop(guard);
                self.sender.send(reply(replies::IMPORT_FAILED)).await;
                return ImportOutcome::Failed;
            }
        };
        if state.phase() == ImportPhase::VideoFramed {
            drop(guard);
            self.sender.send(reply(replies::IMPORT_NOTHING_TO_DO)).await;
            return ImportOutcome::NothingToDo;
        }

        self.sender.send(reply(replies::IMPORT_STARTED)).await;
        let result = self.sweep(&guard, state, command_message_id).await;
        drop(guard);

        match result {
            Ok(report) => {
                self.sender.send(reply(replies::IMPORT_DONE)).await;
                ImportOutcome::Completed(report)
            }
            Err(e) => {
                error!(
                    subsystem = "media",
                    component = "backfill",
                    chat_id,
                    error = %e,
                    "History import failed"
                );
                self.sender.send(reply(replies::IMPORT_FAILED)).await;
                ImportOutcome::Failed
            }
        }
    }

    /// Run the sweep the chat's phase calls for.
    ///
    /// `newest_message_id` only scales the progress log.
    pub async fn sweep(
        &self,
        _guard: &SweepGuard,
        state: ChatImportState,
        newest_message_id: i64,
    ) -> Result<SweepReport> {
        let phase = state.phase();
        let start = Instant::now();
        let report = match phase {
            ImportPhase::NotImported => self.import_all(state.chat_id, newest_message_id).await?,
            ImportPhase::VideoLegacy => self.reindex_videos(state.chat_id, newest_message_id).await?,
            ImportPhase::VideoFramed => return Ok(SweepReport::new(phase)),
        };
        info!(
            subsystem = "media",
            component = "backfill",
            op = "sweep",
            chat_id = state.chat_id,
            phase = %phase,
            processed = report.processed,
            skipped = report.skipped,
            frames = report.frames,
            duration_ms = start.elapsed().as_millis() as u64,
            "Sweep completed"
        );
        Ok(report)
    }

    async fn import_all(&self, chat_id: i64, newest_message_id: i64) -> Result<SweepReport> {
        let watermark = self.media.max_message_id(chat_id).await?.unwrap_or(0);
        info!(
            subsystem = "media",
            component = "backfill",
            op = "import",
            chat_id,
            watermark,
            "Importing chat history"
        );

        let session = self.history.open().await?;
        let mut report = SweepReport::new(ImportPhase::NotImported);
        let result = self
            .run(
                session.as_ref(),
                chat_id,
                watermark,
                HistoryFilter::PhotoVideo,
                newest_message_id,
                &mut report,
            )
            .await;
        close(session.as_ref(), chat_id).await;
        result?;

        self.chat_state
            .upsert(&ChatImportState::fully_imported(chat_id))
            .await?;
        Ok(report)
    }

    async fn reindex_videos(&self, chat_id: i64, newest_message_id: i64) -> Result<SweepReport> {
        info!(
            subsystem = "media",
            component = "backfill",
            op = "reindex",
            chat_id,
            "Reindexing videos by frames"
        );

        let session = self.history.open().await?;
        let mut report = SweepReport::new(ImportPhase::VideoLegacy);
        let result = self
            .run(
                session.as_ref(),
                chat_id,
                0,
                HistoryFilter::Video,
                newest_message_id,
                &mut report,
            )
            .await;
        close(session.as_ref(), chat_id).await;
        result?;

        let mut state = self.state(chat_id).await?;
        state.is_media_imported = true;
        state.is_video_imported_by_frames = true;
        self.chat_state.upsert(&state).await?;
        Ok(report)
    }

    async fn run(
        &self,
        session: &dyn HistorySession,
        chat_id: i64,
        resume_after: i64,
        filter: HistoryFilter,
        newest_message_id: i64,
        report: &mut SweepReport,
    ) -> Result<()> {
        let replace = filter == HistoryFilter::Video;
        let mut messages = session.messages(chat_id, resume_after, filter);
        while let Some(message) = messages.next().await {
            let message = message?;
            let encoded = match self.encode(session, &message).await {
                Ok(encoded) => encoded,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        subsystem = "media",
                        component = "backfill",
                        chat_id,
                        message_id = message.id,
                        media_type = %message.media.media_type,
                        error = %e,
                        "Skipping historical message"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            let written = if replace {
                self.media
                    .replace_frames(chat_id, message.id, MediaType::Video, &encoded.frames)
                    .await?
            } else {
                self.media
                    .insert_frames(chat_id, message.id, encoded.media_type, &encoded.frames)
                    .await?
            };
            report.processed += 1;
            report.frames += written;
            debug!(
                subsystem = "media",
                component = "backfill",
                chat_id,
                message_id = message.id,
                frames = written,
                progress = %progress(message.id, newest_message_id),
                "Historical message stored"
            );
        }
        Ok(())
    }

    async fn encode(
        &self,
        session: &dyn HistorySession,
        message: &HistoryMessage,
    ) -> Result<EncodedMedia> {
        match message.media.media_type {
            MediaType::Photo => {
                let image = session.download(&message.media).await?;
                self.encoder.encode_photo(&image).await
            }
            MediaType::Video => {
                let video = session.download(&message.media).await;
                let thumbnail = message.media.thumbnail();
                self.encoder
                    .encode_video(video, move || async move {
                        match thumbnail {
                            Some(thumbnail) => session.download(&thumbnail).await.map(Some),
                            None => Ok(None),
                        }
                    })
                    .await
            }
        }
    }
}

async fn close(session: &dyn HistorySession, chat_id: i64) {
    if let Err(e) = session.close().await {
        warn!(
            subsystem = "media",
            component = "backfill",
            chat_id,
            error = %e,
            "History session close failed"
        );
    }
}

/// Percentage of the way from message 0 to the newest message.
fn progress(message_id: i64, newest_message_id: i64) -> String {
    if newest_message_id <= 0 {
        return "?".to_string();
    }
    let percent = (message_id as f64 / newest_message_id as f64 * 100.0).min(100.0);
    format!("{:.1}%", percent)
}
