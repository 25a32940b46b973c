//! Text-to-media retrieval with continuation-based paging.

use std::sync::Arc;

use tracing::{error, info, warn};

use dejavu_core::defaults::{CONTINUATION_CAPACITY, MAX_CONTINUATION_OFFSET};
use dejavu_core::{
    Collection, InlineControl, MediaEmbedder, OutgoingReply, QueryTranslator, RecordKey, Result,
    SimilarityQuery,
};
use dejavu_inference::prepare_query;
use dejavu_search::TenantSearch;

use crate::continuation::{Continuation, ContinuationStore};
use crate::replies;
use crate::sender::ReplySender;

/// What one retrieval request rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// The command had no query; a usage hint was sent.
    Usage,
    Page {
        offset: i64,
        matches: usize,
        has_more: bool,
        delivered: usize,
    },
    /// The control pointed at a query that is no longer remembered.
    Expired,
    /// Translation, embedding or search failed; the requester was told.
    Failed,
}

#[derive(Clone)]
pub struct RetrievalService {
    search: Arc<TenantSearch>,
    embedder: Arc<dyn MediaEmbedder>,
    translator: Arc<dyn QueryTranslator>,
    sender: ReplySender,
    continuations: Arc<ContinuationStore>,
    threshold: f32,
    page_size: i64,
}

impl RetrievalService {
    pub fn new(
        search: Arc<TenantSearch>,
        embedder: Arc<dyn MediaEmbedder>,
        translator: Arc<dyn QueryTranslator>,
        sender: ReplySender,
        threshold: f32,
        page_size: i64,
    ) -> Self {
        Self {
            search,
            embedder,
            translator,
            sender,
            continuations: Arc::new(ContinuationStore::new(CONTINUATION_CAPACITY)),
            threshold,
            page_size,
        }
    }

    /// Queries remembered for controls that could not carry them inline.
    pub fn continuations(&self) -> &ContinuationStore {
        &self.continuations
    }

    /// Handle the search command; `command` is the name used in the usage hint.
    pub async fn search_command(
        &self,
        chat_id: i64,
        command_message_id: i64,
        command: &str,
        query: Option<&str>,
    ) -> Result<RetrievalOutcome> {
        let query = query.map(str::trim).unwrap_or_default();
        if query.is_empty() {
            self.sender
                .send(
                    OutgoingReply::new(chat_id, replies::search_usage(command))
                        .reply_to(command_message_id),
                )
                .await;
            return Ok(RetrievalOutcome::Usage);
        }
        Ok(self
            .serve_or_report(chat_id, command_message_id, Some(command_message_id), query, 0)
            .await)
    }

    /// Serve the page a pressed "more" control points at, then remove the
    /// control from `control_message_id`. A failed page keeps the control.
    pub async fn continue_from(
        &self,
        chat_id: i64,
        control_message_id: i64,
        payload: &str,
    ) -> Result<RetrievalOutcome> {
        let outcome = match self.continuations.decode(payload)? {
            Some(continuation) => {
                self.serve_or_report(
                    chat_id,
                    control_message_id,
                    None,
                    &continuation.query,
                    continuation.offset,
                )
                .await
            }
            None => {
                info!(
                    subsystem = "media",
                    component = "retrieval",
                    chat_id,
                    message_id = control_message_id,
                    "Continuation refers to a forgotten query"
                );
                self.sender
                    .send(
                        OutgoingReply::new(chat_id, replies::RETRIEVAL_EXPIRED)
                            .reply_to(control_message_id),
                    )
                    .await;
                RetrievalOutcome::Expired
            }
        };
        if outcome == RetrievalOutcome::Failed {
            return Ok(outcome);
        }
        if let Err(e) = self
            .sender
            .transport()
            .clear_controls(chat_id, control_message_id)
            .await
        {
            warn!(
                subsystem = "media",
                component = "retrieval",
                chat_id,
                message_id = control_message_id,
                error = %e,
                "Failed to remove continuation control"
            );
        }
        Ok(outcome)
    }

    /// Serve a page; on failure reply to `failure_reply_to` with a generic error.
    async fn serve_or_report(
        &self,
        chat_id: i64,
        failure_reply_to: i64,
        command_message_id: Option<i64>,
        query: &str,
        offset: i64,
    ) -> RetrievalOutcome {
        match self.serve_page(chat_id, command_message_id, query, offset).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    subsystem = "media",
                    component = "retrieval",
                    chat_id,
                    offset,
                    error = %e,
                    fatal = e.is_fatal(),
                    "Retrieval failed"
                );
                self.sender
                    .send(
                        OutgoingReply::new(chat_id, replies::RETRIEVAL_FAILED)
                            .reply_to(failure_reply_to),
                    )
                    .await;
                RetrievalOutcome::Failed
            }
        }
    }

    /// Render one page. `command_message_id` is set only for the first page.
    async fn serve_page(
        &self,
        chat_id: i64,
        command_message_id: Option<i64>,
        query: &str,
        offset: i64,
    ) -> Result<RetrievalOutcome> {
        let prepared = prepare_query(self.translator.as_ref(), query).await?;
        let vector = self.embedder.embed_text(&prepared).await?;
        let page = self
            .search
            .search(
                &SimilarityQuery::new(Collection::MediaEmbeddings, vector, chat_id)
                    .with_min_similarity(self.threshold)
                    .with_limit(self.page_size)
                    .with_offset(offset),
            )
            .await?;

        // Pages past the offset bound are never offered.
        let more_control = match offset.checked_add(self.page_size) {
            Some(next) if page.has_more && next <= MAX_CONTINUATION_OFFSET => Some(InlineControl {
                label: replies::RETRIEVAL_MORE_LABEL.to_string(),
                payload: self.continuations.encode(&Continuation::new(query, next))?,
            }),
            _ => None,
        };
        let has_more = more_control.is_some();

        let mut replies_out = Vec::with_capacity(page.hits.len() + 2);
        if page.is_empty() {
            let text = if command_message_id.is_some() {
                replies::RETRIEVAL_NOTHING_FOUND
            } else {
                replies::RETRIEVAL_END
            };
            replies_out.push(addressed(chat_id, text, command_message_id));
        } else {
            if command_message_id.is_some() {
                replies_out.push(addressed(chat_id, replies::RETRIEVAL_HEADER, command_message_id));
            }
            let last = page.hits.len() - 1;
            for (i, hit) in page.hits.iter().enumerate() {
                let RecordKey::Message(message_id) = hit.record else {
                    continue;
                };
                let mut reply =
                    OutgoingReply::new(chat_id, replies::retrieval_match(query, hit.similarity))
                        .reply_to(message_id)
                        .silent();
                if i == last {
                    if let Some(control) = more_control.clone() {
                        reply = reply.with_control(control);
                    }
                }
                replies_out.push(reply);
            }
            if !has_more {
                replies_out.push(OutgoingReply::new(chat_id, replies::RETRIEVAL_END));
            }
        }

        let delivered = self.sender.send_paced(replies_out).await;
        info!(
            subsystem = "media",
            component = "retrieval",
            op = "page",
            chat_id,
            offset,
            result_count = page.hits.len(),
            has_more,
            delivered,
            "Retrieval page served"
        );
        Ok(RetrievalOutcome::Page {
            offset,
            matches: page.hits.len(),
            has_more,
            delivered,
        })
    }
}

fn addressed(chat_id: i64, text: &str, reply_to: Option<i64>) -> OutgoingReply {
    let reply = OutgoingReply::new(chat_id, text);
    match reply_to {
        Some(message_id) => reply.reply_to(message_id),
        None => reply,
    }
}
