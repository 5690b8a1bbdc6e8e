//! Bounded in-memory log of proxied transactions
//!
//! The store keeps entries in insertion order plus an id index, both behind
//! one short-held mutex; eviction of the oldest entry updates both in the same
//! critical section. Each entry guards its mutable fields with its own mutex.
//! Readers only ever receive [`LogEntryView`] copies taken under that lock.
//!
//! Lock order is store, then entry. Entry mutations never touch the store
//! lock, and no lock is held across I/O: bodies are normalized before the
//! entry lock is taken.

use crate::proxy::body::{self, BodyEncoding, NormalizedBody};
use crate::proxy::headers::{flatten_headers, CONTENT_TYPE};
use crate::proxy::sniff::detect_content_type;
use crate::proxy::types::*;
use chrono::{DateTime, Utc};
use hyper::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// Error recorded when the handler is dropped before it finishes
pub const CLIENT_DISCONNECTED: &str = "client disconnected before upstream responded";

/// Request facts captured when an entry is created
#[derive(Clone, Debug)]
pub struct RequestMetadata {
    pub client_ip: String,
    pub method: String,
    /// Path and query exactly as received
    pub url: String,
    pub headers: HeaderMap,
}

/// Fields that change while the request is in flight
#[derive(Debug, Default)]
struct EntryState {
    target: String,
    status: u16,
    response_headers: Option<BTreeMap<String, String>>,
    request_body: Option<NormalizedBody>,
    request_content_type: String,
    request_content_length: u64,
    response_body: Option<NormalizedBody>,
    response_content_type: String,
    response_content_length: u64,
    error: Option<String>,
    duration_millis: u64,
    finished: bool,
}

#[derive(Debug)]
struct LogEntry {
    id: LogEntryId,
    started_at: DateTime<Utc>,
    started: Instant,
    client_ip: String,
    method: String,
    url: String,
    request_headers: BTreeMap<String, String>,
    state: Mutex<EntryState>,
}

impl LogEntry {
    fn snapshot(&self) -> LogEntryView {
        let state = self.state.lock();
        let (request_body, request_body_encoding, request_body_truncated) =
            body_fields(state.request_body.as_ref());
        let (response_body, response_body_encoding, response_body_truncated) =
            body_fields(state.response_body.as_ref());

        LogEntryView {
            id: self.id,
            started_at: self.started_at,
            duration_millis: state.duration_millis,
            client_ip: self.client_ip.clone(),
            method: self.method.clone(),
            url: self.url.clone(),
            target: state.target.clone(),
            status: state.status,
            request_headers: Some(self.request_headers.clone()),
            response_headers: state.response_headers.clone(),
            request_body,
            request_body_encoding,
            request_body_truncated,
            response_body,
            response_body_encoding,
            response_body_truncated,
            error: state.error.clone(),
            request_content_type: state.request_content_type.clone(),
            response_content_type: state.response_content_type.clone(),
            request_content_length: state.request_content_length,
            response_content_length: state.response_content_length,
        }
    }
}

fn body_fields(body: Option<&NormalizedBody>) -> (String, Option<BodyEncoding>, bool) {
    match body {
        Some(body) => (body.text.clone(), Some(body.encoding), body.truncated),
        None => (String::new(), None, false),
    }
}

/// Immutable point-in-time copy of one transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryView {
    pub id: LogEntryId,
    pub started_at: DateTime<Utc>,
    pub duration_millis: u64,
    pub client_ip: String,
    pub method: String,
    pub url: String,
    pub target: String,
    pub status: u16,
    pub request_headers: Option<BTreeMap<String, String>>,
    pub response_headers: Option<BTreeMap<String, String>>,
    pub request_body: String,
    #[serde(serialize_with = "encoding_label")]
    pub request_body_encoding: Option<BodyEncoding>,
    pub request_body_truncated: bool,
    pub response_body: String,
    #[serde(serialize_with = "encoding_label")]
    pub response_body_encoding: Option<BodyEncoding>,
    pub response_body_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_content_type: String,
    pub response_content_type: String,
    pub request_content_length: u64,
    pub response_content_length: u64,
}

/// Unset encodings serialize as an empty string
fn encoding_label<S: Serializer>(
    encoding: &Option<BodyEncoding>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(encoding.map(|e| e.as_str()).unwrap_or_default())
}

/// Write access to one live entry for the duration of its request.
///
/// Dropping the handle without calling [`EntryHandle::finish`] finalizes the
/// entry anyway, recording [`CLIENT_DISCONNECTED`] if no other error was set.
#[derive(Debug)]
pub struct EntryHandle {
    entry: Arc<LogEntry>,
    finished: bool,
}

impl EntryHandle {
    pub fn id(&self) -> LogEntryId {
        self.entry.id
    }

    pub fn set_target(&self, target: &str) {
        self.entry.state.lock().target = target.to_string();
    }

    /// Record the request body with its sniffed content type and raw length
    pub fn record_request_body(&self, bytes: &[u8]) {
        let normalized = body::normalize(bytes);
        let content_type = detect_content_type(bytes);

        let mut state = self.entry.state.lock();
        state.request_content_length = bytes.len() as u64;
        state.request_content_type = content_type.to_string();
        state.request_body = Some(normalized);
    }

    /// Record the upstream response. `bytes` is the body as relayed; the
    /// logged text is decompressed when it looks gzipped.
    pub fn record_response(&self, status: StatusCode, headers: &HeaderMap, bytes: &[u8]) {
        let normalized = body::normalize(&body::decode_for_display(headers, bytes));
        let flattened = flatten_headers(headers);
        let content_type = headers
            .get(CONTENT_TYPE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .unwrap_or_default();

        let mut state = self.entry.state.lock();
        state.status = status.as_u16();
        state.response_content_length = bytes.len() as u64;
        state.response_content_type = content_type;
        state.response_headers = Some(flattened);
        state.response_body = Some(normalized);
    }

    pub fn set_error(&self, error: impl Into<String>) {
        self.entry.state.lock().error = Some(error.into());
    }

    /// Set the duration and release the entry
    pub fn finish(mut self) {
        self.finalize(None);
    }

    fn finalize(&mut self, fallback_error: Option<&str>) {
        let elapsed = self.entry.started.elapsed().as_millis();
        let mut state = self.entry.state.lock();
        if state.finished {
            return;
        }
        if let Some(error) = fallback_error {
            state.error.get_or_insert_with(|| error.to_string());
        }
        state.duration_millis = u64::try_from(elapsed).unwrap_or(u64::MAX);
        state.finished = true;
        self.finished = true;
    }
}

impl Drop for EntryHandle {
    fn drop(&mut self) {
        if !self.finished {
            self.finalize(Some(CLIENT_DISCONNECTED));
        }
    }
}

struct StoreInner {
    next_id: u64,
    entries: VecDeque<Arc<LogEntry>>,
    index: HashMap<LogEntryId, Arc<LogEntry>>,
}

/// Fixed-capacity, thread-safe ring of transaction records
pub struct LogStore {
    limit: LogLimit,
    inner: Mutex<StoreInner>,
}

impl LogStore {
    pub fn new(limit: LogLimit) -> Self {
        Self {
            limit,
            inner: Mutex::new(StoreInner {
                next_id: 0,
                entries: VecDeque::with_capacity(*limit.as_ref()),
                index: HashMap::with_capacity(*limit.as_ref()),
            }),
        }
    }

    pub fn limit(&self) -> LogLimit {
        self.limit
    }

    /// Register a new entry, evicting the oldest one when over capacity
    pub fn create(&self, request: RequestMetadata) -> EntryHandle {
        let started_at = Utc::now();
        let started = Instant::now();
        let request_headers = flatten_headers(&request.headers);

        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let entry = Arc::new(LogEntry {
            id: LogEntryId::from(inner.next_id),
            started_at,
            started,
            client_ip: request.client_ip,
            method: request.method,
            url: request.url,
            request_headers,
            state: Mutex::new(EntryState::default()),
        });

        inner.entries.push_back(Arc::clone(&entry));
        inner.index.insert(entry.id, Arc::clone(&entry));
        while inner.entries.len() > *self.limit.as_ref() {
            if let Some(oldest) = inner.entries.pop_front() {
                inner.index.remove(&oldest.id);
            }
        }
        drop(inner);

        EntryHandle {
            entry,
            finished: false,
        }
    }

    /// Snapshot every retained entry, newest first
    pub fn list(&self) -> Vec<LogEntryView> {
        let inner = self.inner.lock();
        inner.entries.iter().rev().map(|entry| entry.snapshot()).collect()
    }

    /// Snapshot a single entry, if it is still retained
    pub fn get(&self, id: LogEntryId) -> Option<LogEntryView> {
        let entry = self.inner.lock().index.get(&id).cloned()?;
        Some(entry.snapshot())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(LogLimit::default())
    }
}
