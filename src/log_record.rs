//! Serialised log records and the request batch that carries them.
//!
//! A [`LogRecord`] is built once, when a capture point fires, and is never
//! mutated afterwards: its fields are private and only exposed by reference.
//! On the wire each record is `{ level, args, timestamp, url }` with an
//! ISO-8601 UTC timestamp, and a request body is `{ "logs": [...] }`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::level::ConsoleLevel;

/// One captured, serialised log entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    level: ConsoleLevel,
    args: Vec<Value>,
    #[serde(serialize_with = "serialise_timestamp")]
    timestamp: DateTime<Utc>,
    url: String,
}

impl LogRecord {
    pub fn new(
        level: ConsoleLevel,
        args: Vec<Value>,
        timestamp: DateTime<Utc>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            level,
            args,
            timestamp,
            url: url.into(),
        }
    }

    pub fn level(&self) -> ConsoleLevel {
        self.level
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp exactly as it appears on the wire.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Location identifier of the capturing context.
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn serialise_timestamp<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Request body delivered to the sink.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LogBatch {
    pub logs: Vec<LogRecord>,
}

impl LogBatch {
    pub fn new(logs: Vec<LogRecord>) -> Self {
        Self { logs }
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}
