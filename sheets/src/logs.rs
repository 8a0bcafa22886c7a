//! Pipeline log channel.
//!
//! Every stage reports progress and silently-skipped input (unknown rule
//! kinds, orphan child rows, empty projections) here. Entries are echoed to
//! stderr and published so a hosting service can stream them to clients.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Entries kept for slow subscribers before they start lagging.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn marker(self) -> &'static str {
        match self {
            LogLevel::Info => "",
            LogLevel::Success => "✓ ",
            LogLevel::Warning => "⚠️ ",
            LogLevel::Error => "❌ ",
        }
    }
}

/// One published log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Depth below the stage that logged it.
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, indent: u8) -> Self {
        Self {
            level,
            message: message.into(),
            indent,
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pad = "   ".repeat(usize::from(self.indent) + 1);
        write!(f, "{pad}{}{}", self.level.marker(), self.message)
    }
}

/// Fan-out of pipeline log entries.
pub struct PipelineLog {
    sender: broadcast::Sender<LogEntry>,
}

impl PipelineLog {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Echo to stderr, then publish. Stdout is left to command output.
    pub fn publish(&self, entry: LogEntry) {
        eprintln!("{entry}");
        // Err only means nobody is subscribed
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for PipelineLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide log used by every pipeline stage.
pub static PIPELINE_LOG: Lazy<PipelineLog> = Lazy::new(PipelineLog::new);

fn emit(level: LogLevel, msg: impl Into<String>, indent: u8) {
    PIPELINE_LOG.publish(LogEntry::new(level, msg, indent));
}

pub fn log_info(msg: impl Into<String>) {
    emit(LogLevel::Info, msg, 0);
}

pub fn log_success(msg: impl Into<String>) {
    emit(LogLevel::Success, msg, 0);
}

pub fn log_warning(msg: impl Into<String>) {
    emit(LogLevel::Warning, msg, 0);
}

pub fn log_error(msg: impl Into<String>) {
    emit(LogLevel::Error, msg, 0);
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    emit(LogLevel::Info, msg, indent);
}

pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    emit(LogLevel::Warning, msg, indent);
}
