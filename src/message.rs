//! Wire data model shared with emitters (ingress) and sinks (egress).
//!
//! This module defines the JSON shapes the distributor accepts on `POST /logs`
//! and the single-message shape it re-serializes when dispatching to a sink.
//! The packet envelope itself is discarded once its messages have been
//! extracted; sinks only ever see individual [`LogMessage`]s.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log severity level, matching the emitter's wire vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Fatal => write!(f, "FATAL"),
        }
    }
}

/// A single log entry, as produced by an emitter and forwarded to a sink.
///
/// The distributor treats everything but `id` as opaque payload; `id` is
/// echoed in the `X-Log-ID` header on every egress attempt so sink operators
/// can correlate retries across sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The ingress envelope for `POST /logs`.
///
/// Discarded after its `messages` are handed to the fan-out scheduler — no
/// downstream component tracks which packet a message originated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPacket {
    pub packet_id: String,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<LogMessage>,
}
