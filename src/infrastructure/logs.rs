//! Run log broadcasting
//!
//! Execution events fan out to API subscribers through a process-wide
//! broadcast channel. Entries carry the run id and tenant so a run's
//! entries are totally ordered per run; ordering across runs is not
//! defined. Slow subscribers may miss entries (bounded channel), which is
//! acceptable for a live log feed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One entry in a run's log stream
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,

    pub level: LogLevel,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            level,
            message: message.into(),
            run_id: None,
            tenant_id: None,
            step_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_run(mut self, run_id: impl Into<String>, tenant: Option<&str>) -> Self {
        self.run_id = Some(run_id.into());
        self.tenant_id = tenant.map(|t| t.to_string());
        self
    }

    pub fn with_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }
}

/// Process-wide channel of execution log entries
#[derive(Debug)]
pub struct RunLogStream {
    sender: broadcast::Sender<LogEntry>,
}

impl Default for RunLogStream {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RunLogStream {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to entries emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Emit an entry to subscribers and mirror it to tracing
    pub fn emit(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Debug => tracing::debug!(
                run_id = entry.run_id.as_deref(),
                step_id = entry.step_id.as_deref(),
                "{}",
                entry.message
            ),
            LogLevel::Info => tracing::info!(
                run_id = entry.run_id.as_deref(),
                step_id = entry.step_id.as_deref(),
                "{}",
                entry.message
            ),
            LogLevel::Warn => tracing::warn!(
                run_id = entry.run_id.as_deref(),
                step_id = entry.step_id.as_deref(),
                "{}",
                entry.message
            ),
            LogLevel::Error => tracing::error!(
                run_id = entry.run_id.as_deref(),
                step_id = entry.step_id.as_deref(),
                "{}",
                entry.message
            ),
        }

        // Send fails only when no subscriber is listening
        let _ = self.sender.send(entry);
    }
}
