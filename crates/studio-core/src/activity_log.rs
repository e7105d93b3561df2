//! ============================================================================
//! Activity Log - Transparency log of outbound API calls
//! ============================================================================
//! Session-scoped record of every request, response and error so the
//! operator can audit what the studio sent. Nothing is persisted.
//!
//! - Bounded ring buffer (oldest entries evicted first)
//! - Observer registry for live views; no replay on subscribe
//! - `clear()` broadcasts a CLEAR entry so observers reset
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};

/// Maximum number of retained entries
pub const LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    Request,
    Response,
    Error,
    Clear,
}

/// HTTP status column: "pending" until the response arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Code(u16),
}

impl Serialize for EntryStatus {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Pending => s.serialize_str("pending"),
            Self::Code(code) => s.serialize_u16(*code),
        }
    }
}

impl<'de> Deserialize<'de> for EntryStatus {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(d)? {
            serde_json::Value::String(s) if s == "pending" => Ok(Self::Pending),
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|v| u16::try_from(v).ok())
                .map(Self::Code)
                .ok_or_else(|| serde::de::Error::custom("status out of range")),
            other => Err(serde::de::Error::custom(format!("invalid status: {}", other))),
        }
    }
}

/// One immutable log line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
    pub method: Option<String>,
    pub url: Option<String>,
    pub status: Option<EntryStatus>,
    pub ok: bool,
    pub source: Option<String>,
    pub message: Option<String>,
}

impl ActivityLogEntry {
    fn new(kind: EntryKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            method: None,
            url: None,
            status: None,
            ok: false,
            source: None,
            message: None,
        }
    }

    /// Single-line rendering for terminals
    pub fn summary(&self) -> String {
        let time = self.timestamp.format("%H:%M:%S");
        match self.kind {
            EntryKind::Request => format!(
                "{} -> {} {} (pending)",
                time,
                self.method.as_deref().unwrap_or("?"),
                self.url.as_deref().unwrap_or("?")
            ),
            EntryKind::Response => {
                let status = match self.status {
                    Some(EntryStatus::Code(code)) => code.to_string(),
                    _ => "?".to_string(),
                };
                format!(
                    "{} <- {} {} [{}{}]",
                    time,
                    self.method.as_deref().unwrap_or("?"),
                    self.url.as_deref().unwrap_or("?"),
                    status,
                    if self.ok { "" } else { " FAIL" }
                )
            }
            EntryKind::Error => format!(
                "{} !! {}: {}",
                time,
                self.source.as_deref().unwrap_or("?"),
                self.message.as_deref().unwrap_or("")
            ),
            EntryKind::Clear => format!("{} -- log cleared", time),
        }
    }
}

type Observer = Arc<dyn Fn(&ActivityLogEntry) + Send + Sync>;

struct LogInner {
    entries: VecDeque<ActivityLogEntry>,
    observers: BTreeMap<u64, Observer>,
    next_observer_id: u64,
}

/// Cloneable handle to the session's transparency log
#[derive(Clone)]
pub struct ActivityLog {
    inner: Arc<Mutex<LogInner>>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogInner {
                entries: VecDeque::with_capacity(LOG_CAPACITY),
                observers: BTreeMap::new(),
                next_observer_id: 0,
            })),
        }
    }

    /// Register an observer for entries emitted from now on. Observers run in
    /// subscription order.
    ///
    /// Existing entries are not replayed; pull them with [`snapshot`](Self::snapshot).
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&ActivityLogEntry) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_observer_id;
        inner.next_observer_id += 1;
        inner.observers.insert(id, Arc::new(observer));
        Subscription {
            id,
            log: Arc::downgrade(&self.inner),
        }
    }

    pub fn record_request_start(&self, method: &str, url: &str) {
        let mut entry = ActivityLogEntry::new(EntryKind::Request);
        entry.method = Some(method.to_string());
        entry.url = Some(url.to_string());
        entry.status = Some(EntryStatus::Pending);
        self.emit(entry, true);
    }

    pub fn record_request_end(&self, method: &str, url: &str, status: u16, ok: bool) {
        let mut entry = ActivityLogEntry::new(EntryKind::Response);
        entry.method = Some(method.to_string());
        entry.url = Some(url.to_string());
        entry.status = Some(EntryStatus::Code(status));
        entry.ok = ok;
        self.emit(entry, true);
    }

    pub fn record_error(&self, source: &str, message: &str) {
        let mut entry = ActivityLogEntry::new(EntryKind::Error);
        entry.source = Some(source.to_string());
        entry.message = Some(message.to_string());
        self.emit(entry, true);
    }

    /// Empty the buffer and tell observers to reset
    pub fn clear(&self) {
        self.lock().entries.clear();
        self.emit(ActivityLogEntry::new(EntryKind::Clear), false);
    }

    /// Current entries, oldest first
    pub fn snapshot(&self) -> Vec<ActivityLogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit(&self, entry: ActivityLogEntry, retain: bool) {
        let observers: Vec<Observer> = {
            let mut inner = self.lock();
            if retain {
                while inner.entries.len() >= LOG_CAPACITY {
                    inner.entries.pop_front();
                }
                inner.entries.push_back(entry.clone());
            }
            inner.observers.values().cloned().collect()
        };

        // Outside the lock so observers may call back into the log
        for observer in observers {
            observer(&entry);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle returned by [`ActivityLog::subscribe`]
pub struct Subscription {
    id: u64,
    log: Weak<Mutex<LogInner>>,
}

impl Subscription {
    /// Detach the observer. No-op if the log is gone.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.log.upgrade() {
            inner
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .observers
                .remove(&self.id);
        }
    }
}
