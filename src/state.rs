//! Per-connector runtime state.
//!
//! Each connector owns one [`ConnectorState`], handed in at construction.
//! Nothing here is global, so tests get isolated instances for free.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What kind of request was logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Tool call.
    Tool,
    /// Resource read.
    Resource,
    /// Prompt request.
    Prompt,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Tool => f.write_str("tool"),
            RequestKind::Resource => f.write_str("resource"),
            RequestKind::Prompt => f.write_str("prompt"),
        }
    }
}

/// One logged request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEntry {
    /// Unique id.
    pub id: Uuid,
    /// When it arrived.
    pub timestamp: DateTime<Utc>,
    /// Tool or resource.
    pub kind: RequestKind,
    /// Tool name or resource URI.
    pub name: String,
    /// Arguments as received.
    pub arguments: serde_json::Value,
}

/// Bounded ring buffer of recent requests.
///
/// Appends and reads take the same lock, so concurrent callers never lose
/// entries; ordering among concurrent appends is arrival order at the lock.
#[derive(Debug)]
pub struct RequestLog {
    entries: Mutex<VecDeque<RequestLogEntry>>,
    capacity: usize,
}

impl RequestLog {
    /// Create a log keeping the last `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Maximum number of entries kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, dropping the oldest past capacity.
    pub fn push(&self, entry: RequestLogEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<RequestLogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Start time, request counter and request log for one connector instance.
#[derive(Debug)]
pub struct ConnectorState {
    started_at: DateTime<Utc>,
    request_count: AtomicU64,
    log: RequestLog,
}

impl ConnectorState {
    /// Fresh state with the given log capacity.
    pub fn new(log_capacity: usize) -> Self {
        Self {
            started_at: Utc::now(),
            request_count: AtomicU64::new(0),
            log: RequestLog::new(log_capacity),
        }
    }

    /// Count and log a request.
    pub fn record(&self, kind: RequestKind, name: &str, arguments: &serde_json::Value) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.log.push(RequestLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            name: name.to_string(),
            arguments: arguments.clone(),
        });
        tracing::debug!(kind = %kind, name = %name, "request recorded");
    }

    /// When this connector was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Requests seen so far.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// The request log.
    pub fn log(&self) -> &RequestLog {
        &self.log
    }

    /// Uptime as `"{h}h {m}m {s}s"`.
    pub fn uptime(&self) -> String {
        let secs = (Utc::now() - self.started_at).num_seconds().max(0);
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

impl Default for ConnectorState {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_REQUEST_LOG_CAPACITY)
    }
}
