//! In-process chat platform collaborators for tests.
//!
//! Always compiled so integration tests (in tests/) and downstream crates can
//! drive the engine without a live chat platform.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use dejavu_core::{
    ChatTransport, Error, HistoryFilter, HistoryMedia, HistoryMessage, HistorySession,
    HistorySource, MediaDownloader, OutgoingReply, Result,
};

/// Records every reply and control removal; can be told to fail sends.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<OutgoingReply>>>,
    cleared: Arc<Mutex<Vec<(i64, i64)>>>,
    failing_targets: Arc<Mutex<HashSet<i64>>>,
    next_id: Arc<Mutex<i64>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every reply addressed to this message.
    pub fn fail_replies_to(&self, message_id: i64) {
        self.failing_targets.lock().unwrap().insert(message_id);
    }

    pub fn sent(&self) -> Vec<OutgoingReply> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|r| r.text).collect()
    }

    pub fn cleared(&self) -> Vec<(i64, i64)> {
        self.cleared.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_reply(&self, reply: OutgoingReply) -> Result<i64> {
        if let Some(target) = reply.reply_to {
            if self.failing_targets.lock().unwrap().contains(&target) {
                return Err(Error::Transport(format!("cannot reply to {}", target)));
            }
        }
        self.sent.lock().unwrap().push(reply);
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        Ok(100_000 + *next)
    }

    async fn clear_controls(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.cleared.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }

    async fn file_url(&self, file_id: &str) -> Result<String> {
        Ok(format!("mem://{}", file_id))
    }
}

/// Serves bytes registered per file id, resolved through `mem://` URLs.
#[derive(Clone, Default)]
pub struct MemoryDownloader {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, file_id: &str, bytes: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(format!("mem://{}", file_id), bytes.to_vec());
        self
    }
}

#[async_trait]
impl MediaDownloader for MemoryDownloader {
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Request(format!("404 for {}", url)))
    }
}

#[derive(Default)]
struct HistoryState {
    messages: Vec<HistoryMessage>,
    files: HashMap<String, Vec<u8>>,
    fail_open: bool,
    break_after: Option<usize>,
    opened: usize,
    closed: usize,
    requested: Vec<(i64, HistoryFilter)>,
}

/// Scripted full-history source.
#[derive(Clone, Default)]
pub struct ScriptedHistory {
    state: Arc<Mutex<HistoryState>>,
}

impl ScriptedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a historical message; `bytes` is what downloading it returns.
    pub fn with_message(self, id: i64, media: HistoryMedia, bytes: &[u8]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.files.insert(media.location.clone(), bytes.to_vec());
            state.messages.push(HistoryMessage { id, media });
            state.messages.sort_by_key(|m| m.id);
        }
        self
    }

    /// Register a downloadable file without a message (e.g. a thumbnail).
    pub fn with_file(self, location: &str, bytes: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(location.to_string(), bytes.to_vec());
        self
    }

    /// Make `open` fail.
    pub fn fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    /// Break the session after yielding `n` messages; `None` heals it.
    pub fn break_after(&self, n: Option<usize>) {
        self.state.lock().unwrap().break_after = n;
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    /// `(resume_after, filter)` of every iteration requested so far.
    pub fn requested(&self) -> Vec<(i64, HistoryFilter)> {
        self.state.lock().unwrap().requested.clone()
    }
}

#[async_trait]
impl HistorySource for ScriptedHistory {
    async fn open(&self) -> Result<Box<dyn HistorySession>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(Error::History("session authorization failed".to_string()));
        }
        state.opened += 1;
        Ok(Box::new(ScriptedSession {
            state: self.state.clone(),
        }))
    }
}

struct ScriptedSession {
    state: Arc<Mutex<HistoryState>>,
}

#[async_trait]
impl HistorySession for ScriptedSession {
    fn messages(
        &self,
        _chat_id: i64,
        resume_after: i64,
        filter: HistoryFilter,
    ) -> BoxStream<'_, Result<HistoryMessage>> {
        let mut state = self.state.lock().unwrap();
        state.requested.push((resume_after, filter));
        let mut items: Vec<Result<HistoryMessage>> = state
            .messages
            .iter()
            .filter(|m| m.id > resume_after && filter.accepts(m.media.media_type))
            .cloned()
            .map(Ok)
            .collect();
        if let Some(n) = state.break_after {
            if n < items.len() {
                items.truncate(n);
                items.push(Err(Error::History("connection reset".to_string())));
            }
        }
        stream::iter(items).boxed()
    }

    async fn download(&self, media: &HistoryMedia) -> Result<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&media.location)
            .cloned()
            .ok_or_else(|| Error::Request(format!("file {} unavailable", media.location)))
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}
