//! The media engine: one owning instance wiring every service together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use dejavu_core::{
    ChatStateRepository, ChatTransport, HistorySource, IgnoreListRepository, IncomingMedia,
    KeyframeExtractor, MediaDownloader, MediaEmbedder, MediaEmbeddingRepository, QueryTranslator,
    Result, VectorIndex,
};
use dejavu_db::{Database, InMemoryStore};
use dejavu_search::TenantSearch;

use crate::backfill::{BackfillService, ImportOutcome};
use crate::config::MediaConfig;
use crate::continuation::Continuation;
use crate::coordinator::SweepCoordinator;
use crate::encoder::{LiveMediaFetcher, MediaEncoder};
use crate::features::{IGNORE_COMMAND, IMPORT_COMMAND, SEARCH_COMMAND};
use crate::ignore::{IgnoreList, IgnoreOutcome, ReplyTarget};
use crate::ingestion::{IngestOutcome, IngestionPipeline};
use crate::retrieval::{RetrievalOutcome, RetrievalService};
use crate::sender::ReplySender;

/// Store seams used by the engine.
#[derive(Clone)]
pub struct MediaStore {
    pub media: Arc<dyn MediaEmbeddingRepository>,
    pub ignored: Arc<dyn IgnoreListRepository>,
    pub chat_state: Arc<dyn ChatStateRepository>,
    pub index: Arc<dyn VectorIndex>,
}

impl MediaStore {
    pub fn from_database(db: &Database) -> Self {
        Self {
            media: Arc::new(db.media.clone()),
            ignored: Arc::new(db.ignored.clone()),
            chat_state: Arc::new(db.chat_state.clone()),
            index: Arc::new(db.index.clone()),
        }
    }

    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            media: store.clone(),
            ignored: store.clone(),
            chat_state: store.clone(),
            index: store,
        }
    }
}

/// External collaborators of the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub embedder: Arc<dyn MediaEmbedder>,
    pub extractor: Arc<dyn KeyframeExtractor>,
    pub translator: Arc<dyn QueryTranslator>,
    pub transport: Arc<dyn ChatTransport>,
    pub downloader: Arc<dyn MediaDownloader>,
    pub history: Arc<dyn HistorySource>,
}

/// An event routed to the engine by the command layer.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A photo or video posted in a chat.
    Media(IncomingMedia),
    Command {
        chat_id: i64,
        message_id: i64,
        name: String,
        args: Option<String>,
        reply_target: ReplyTarget,
    },
    /// An inline control was pressed on `message_id`.
    Callback {
        chat_id: i64,
        message_id: i64,
        payload: String,
    },
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Ingested(IngestOutcome),
    Ignore(IgnoreOutcome),
    Import(ImportOutcome),
    Retrieval(RetrievalOutcome),
    /// The event does not belong to the engine.
    Unhandled,
    /// The engine was disposed.
    Disposed,
}

pub struct MediaEngine {
    config: MediaConfig,
    coordinator: SweepCoordinator,
    search: Arc<TenantSearch>,
    ingestion: IngestionPipeline,
    ignore: IgnoreList,
    backfill: BackfillService,
    retrieval: RetrievalService,
    disposed: AtomicBool,
}

impl MediaEngine {
    pub fn new(store: MediaStore, deps: Collaborators, config: MediaConfig) -> Self {
        let coordinator = SweepCoordinator::new();
        let search = Arc::new(TenantSearch::new(store.index.clone(), config.search.clone()));
        let sender = ReplySender::new(deps.transport.clone(), config.reply_delay);
        let encoder = MediaEncoder::new(deps.embedder.clone(), deps.extractor.clone());
        let fetcher = LiveMediaFetcher::new(deps.transport.clone(), deps.downloader.clone());

        let ignore = IgnoreList::new(
            store.ignored.clone(),
            search.clone(),
            encoder.clone(),
            fetcher.clone(),
            sender.clone(),
            config.ignore_threshold(),
        );
        let ingestion = IngestionPipeline::new(
            store.media.clone(),
            search.clone(),
            ignore.clone(),
            encoder.clone(),
            fetcher,
            sender.clone(),
            coordinator.clone(),
            config.image_threshold,
            config.match_count,
        );
        let backfill = BackfillService::new(
            store.media.clone(),
            store.chat_state.clone(),
            deps.history.clone(),
            encoder,
            sender.clone(),
            coordinator.clone(),
        );
        let retrieval = RetrievalService::new(
            search.clone(),
            deps.embedder.clone(),
            deps.translator.clone(),
            sender,
            config.text_threshold,
            config.match_count,
        );

        info!(
            subsystem = "media",
            component = "engine",
            image_threshold = config.image_threshold,
            text_threshold = config.text_threshold,
            match_count = config.match_count,
            model = deps.embedder.model_name(),
            "Media engine initialized"
        );

        Self {
            config,
            coordinator,
            search,
            ingestion,
            ignore,
            backfill,
            retrieval,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &SweepCoordinator {
        &self.coordinator
    }

    pub fn search(&self) -> &TenantSearch {
        &self.search
    }

    pub fn ingestion(&self) -> &IngestionPipeline {
        &self.ingestion
    }

    pub fn ignore_list(&self) -> &IgnoreList {
        &self.ignore
    }

    pub fn backfill(&self) -> &BackfillService {
        &self.backfill
    }

    pub fn retrieval(&self) -> &RetrievalService {
        &self.retrieval
    }

    /// Route one event to the service that owns it.
    pub async fn handle(&self, event: ChatEvent) -> Result<EventOutcome> {
        if self.is_disposed() {
            debug!(
                subsystem = "media",
                component = "engine",
                "Engine disposed, event dropped"
            );
            return Ok(EventOutcome::Disposed);
        }

        let result = match event {
            ChatEvent::Media(media) => self
                .ingestion
                .ingest(&media)
                .await
                .map(EventOutcome::Ingested),
            ChatEvent::Command {
                chat_id,
                message_id,
                name,
                args,
                reply_target,
            } => match name.as_str() {
                SEARCH_COMMAND => self
                    .retrieval
                    .search_command(chat_id, message_id, SEARCH_COMMAND, args.as_deref())
                    .await
                    .map(EventOutcome::Retrieval),
                IGNORE_COMMAND => Ok(EventOutcome::Ignore(
                    self.ignore
                        .ignore_command(chat_id, message_id, reply_target)
                        .await,
                )),
                IMPORT_COMMAND => Ok(EventOutcome::Import(
                    self.backfill
                        .history_import_command(chat_id, message_id)
                        .await,
                )),
                _ => Ok(EventOutcome::Unhandled),
            },
            ChatEvent::Callback {
                chat_id,
                message_id,
                payload,
            } => {
                if Continuation::matches(&payload) {
                    self.retrieval
                        .continue_from(chat_id, message_id, &payload)
                        .await
                        .map(EventOutcome::Retrieval)
                } else {
                    Ok(EventOutcome::Unhandled)
                }
            }
        };

        if let Err(e) = &result {
            error!(
                subsystem = "media",
                component = "engine",
                error = %e,
                fatal = e.is_fatal(),
                "Event handling failed"
            );
        }
        result
    }

    /// Stop accepting events. Sweeps already running finish on their own.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            info!(
                subsystem = "media",
                component = "engine",
                op = "dispose",
                sweeping = self.coordinator.is_sweeping(),
                "Media engine disposed"
            );
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}
