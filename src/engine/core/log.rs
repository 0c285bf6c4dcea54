use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    /// The fully composed command line of a launched process
    Command,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Command => "Command",
        };
        f.write_str(s)
    }
}

/// One line of the user-facing run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Command, message)
    }

    /// `[HH:MM:SS] Level: message`
    pub fn format_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Destination for [`LogEntry`] records.
///
/// Sinks are shared between the orchestrator thread and the output reader
/// threads of the running process, so they must be `Send + Sync`.
pub trait LogSink: Send + Sync {
    fn push(&self, entry: LogEntry);
}

/// Convenience methods available on every sink
pub trait LogSinkExt: LogSink {
    fn info(&self, message: impl Into<String>) {
        self.push(LogEntry::info(message));
    }

    fn warning(&self, message: impl Into<String>) {
        self.push(LogEntry::warning(message));
    }

    fn error(&self, message: impl Into<String>) {
        self.push(LogEntry::error(message));
    }
}

impl<T: LogSink + ?Sized> LogSinkExt for T {}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn push(&self, entry: LogEntry) {
        (**self).push(entry)
    }
}

fn mirror_to_tracing(entry: &LogEntry) {
    match entry.level {
        LogLevel::Info => tracing::info!("{}", entry.message),
        LogLevel::Warning => tracing::warn!("{}", entry.message),
        LogLevel::Error => tracing::error!("{}", entry.message),
        LogLevel::Command => tracing::info!(kind = "command", "{}", entry.message),
    }
}

/// In-memory log kept for diagnostics export
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .map(|e| e.iter().filter(|entry| entry.level == level).count())
            .unwrap_or(0)
    }
}

impl LogSink for MemoryLog {
    fn push(&self, entry: LogEntry) {
        mirror_to_tracing(&entry);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

/// Prints formatted lines to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLog {
    pub filter: LogFilter,
}

impl LogSink for ConsoleLog {
    fn push(&self, entry: LogEntry) {
        if self.filter.allows(&entry) {
            eprintln!("{}", entry.format_line());
        }
    }
}

/// Appends formatted lines to a file, creating it if needed
#[derive(Debug, Clone)]
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &LogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open log file {}", self.path.display()))?;

        writeln!(
            file,
            "[{}] {}: {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.level,
            entry.message
        )?;
        Ok(())
    }
}

impl LogSink for FileLog {
    fn push(&self, entry: LogEntry) {
        if let Err(e) = self.append(&entry) {
            tracing::debug!("log file write failed: {:#}", e);
        }
    }
}

/// Fans one entry out to several sinks
#[derive(Default)]
pub struct Tee {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl Tee {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl LogSink for Tee {
    fn push(&self, entry: LogEntry) {
        for sink in &self.sinks {
            sink.push(entry.clone());
        }
    }
}

/// Level filter used by log views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFilter {
    #[default]
    All,
    Errors,
    Warnings,
    Commands,
}

impl LogFilter {
    pub fn allows(&self, entry: &LogEntry) -> bool {
        match self {
            Self::All => true,
            Self::Errors => entry.level == LogLevel::Error,
            Self::Warnings => entry.level == LogLevel::Warning,
            Self::Commands => entry.level == LogLevel::Command,
        }
    }
}
