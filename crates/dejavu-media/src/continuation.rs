//! Continuation payloads for retrieval pagination.
//!
//! The "more" control carries `islm-{"t":query,"o":offset}`. The platform caps
//! callback data at 64 bytes, so a query that does not fit is remembered by
//! [`ContinuationStore`] and the payload carries its key instead:
//! `islm-{"k":key,"o":offset}`. The query a later page searches for is always
//! the one the first page was served for.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use dejavu_core::defaults::{CALLBACK_DATA_MAX_BYTES, MAX_CONTINUATION_OFFSET};
use dejavu_core::{Error, Result};

/// Prefix identifying retrieval continuation payloads.
pub const CONTINUATION_PREFIX: &str = "islm-";

/// Hex characters of the query digest used as a stored-query key.
const KEY_LEN: usize = 16;

/// Query and offset of the next retrieval page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub query: String,
    pub offset: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Wire {
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(rename = "o")]
    offset: i64,
}

impl Wire {
    fn encode(&self) -> Result<String> {
        Ok(format!("{}{}", CONTINUATION_PREFIX, serde_json::to_string(self)?))
    }

    fn decode(payload: &str) -> Result<Self> {
        let json = payload.strip_prefix(CONTINUATION_PREFIX).ok_or_else(|| {
            Error::InvalidInput(format!("not a continuation payload: {:?}", payload))
        })?;
        let wire: Wire = serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("malformed continuation payload: {}", e)))?;
        check_offset(wire.offset)?;
        if wire.query.is_some() == wire.key.is_some() {
            return Err(Error::InvalidInput(
                "continuation payload needs exactly one of query or key".to_string(),
            ));
        }
        Ok(wire)
    }
}

fn check_offset(offset: i64) -> Result<()> {
    if !(0..=MAX_CONTINUATION_OFFSET).contains(&offset) {
        return Err(Error::InvalidInput(format!(
            "continuation offset {} outside 0..={}",
            offset, MAX_CONTINUATION_OFFSET
        )));
    }
    Ok(())
}

impl Continuation {
    pub fn new(query: impl Into<String>, offset: i64) -> Self {
        Self {
            query: query.into(),
            offset,
        }
    }

    /// Whether a callback payload belongs to retrieval.
    pub fn matches(payload: &str) -> bool {
        payload.starts_with(CONTINUATION_PREFIX)
    }

    /// Inline encoding. Fails when the query does not fit the callback limit.
    pub fn encode(&self) -> Result<String> {
        check_offset(self.offset)?;
        let payload = Wire {
            query: Some(self.query.clone()),
            key: None,
            offset: self.offset,
        }
        .encode()?;
        if payload.len() > CALLBACK_DATA_MAX_BYTES {
            return Err(Error::InvalidInput(format!(
                "continuation for a {}-byte query does not fit in callback data",
                self.query.len()
            )));
        }
        Ok(payload)
    }

    /// Decode an inline payload. Keyed payloads need [`ContinuationStore::decode`].
    pub fn decode(payload: &str) -> Result<Self> {
        match Wire::decode(payload)? {
            Wire {
                query: Some(query),
                offset,
                ..
            } => Ok(Self { query, offset }),
            _ => Err(Error::InvalidInput(
                "continuation refers to a stored query".to_string(),
            )),
        }
    }
}

#[derive(Default)]
struct StoredQueries {
    by_key: HashMap<String, String>,
    order: VecDeque<String>,
}

/// Bounded memory of queries too long to travel inline.
///
/// The oldest query is forgotten first. Controls pointing at a forgotten
/// query decode to `None`.
pub struct ContinuationStore {
    capacity: usize,
    queries: Mutex<StoredQueries>,
}

impl ContinuationStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queries: Mutex::new(StoredQueries::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoredQueries>> {
        self.queries
            .lock()
            .map_err(|_| Error::Internal("continuation store lock poisoned".to_string()))
    }

    /// Encode inline when possible, otherwise remember the query and encode its key.
    pub fn encode(&self, continuation: &Continuation) -> Result<String> {
        match continuation.encode() {
            Ok(payload) => return Ok(payload),
            Err(e) => check_offset(continuation.offset).map_err(|_| e)?,
        }

        let key = query_key(&continuation.query);
        {
            let mut stored = self.lock()?;
            if !stored.by_key.contains_key(&key) {
                while stored.order.len() >= self.capacity {
                    if let Some(oldest) = stored.order.pop_front() {
                        stored.by_key.remove(&oldest);
                    }
                }
                stored.order.push_back(key.clone());
                stored
                    .by_key
                    .insert(key.clone(), continuation.query.clone());
            }
        }
        Wire {
            query: None,
            key: Some(key),
            offset: continuation.offset,
        }
        .encode()
    }

    /// Decode either payload form. `None` when the stored query was forgotten.
    pub fn decode(&self, payload: &str) -> Result<Option<Continuation>> {
        let wire = Wire::decode(payload)?;
        if let Some(query) = wire.query {
            return Ok(Some(Continuation::new(query, wire.offset)));
        }
        let key = wire.key.unwrap_or_default();
        Ok(self
            .lock()?
            .by_key
            .get(&key)
            .map(|query| Continuation::new(query.clone(), wire.offset)))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|stored| stored.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn query_key(query: &str) -> String {
    Sha256::digest(query.as_bytes())
        .iter()
        .take(KEY_LEN / 2)
        .map(|b| format!("{:02x}", b))
        .collect()
}
