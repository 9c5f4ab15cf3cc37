use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Category tag of a [`RequestEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Connect,
    Echo,
    Disconnect,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Echo => "echo",
            EventKind::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single session operation.
///
/// Produced once by the session that ran the operation and consumed once by
/// the [`EventSink`](super::EventSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    pub kind: EventKind,
    pub name: String,
    pub session_id: u64,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub payload_size: u64,
    pub error: Option<String>,
    pub context: BTreeMap<String, String>,
}

impl RequestEvent {
    #[must_use]
    pub fn success(
        kind: EventKind,
        name: &str,
        session_id: u64,
        started_at: DateTime<Utc>,
        duration: Duration,
        payload_size: u64,
    ) -> Self {
        Self {
            kind,
            name: name.to_owned(),
            session_id,
            started_at,
            duration,
            payload_size,
            error: None,
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn failure(
        kind: EventKind,
        name: &str,
        session_id: u64,
        started_at: DateTime<Utc>,
        duration: Duration,
        error: String,
    ) -> Self {
        Self {
            kind,
            name: name.to_owned(),
            session_id,
            started_at,
            duration,
            payload_size: 0,
            error: Some(error),
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: &str, value: String) -> Self {
        self.context.insert(key.to_owned(), value);
        self
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
