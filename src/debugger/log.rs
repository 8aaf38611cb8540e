use crate::util;
use std::{
    fmt, fs, io,
    path::Path,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Time since the session started
    pub at: Duration,
    pub level: Level,
    pub context: String,
    pub message: String,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<8}: {}",
            util::format_minutes(self.at),
            self.context,
            self.message
        )
    }
}

/// Status and trace log of a debugging session, shown to the user and written
/// to disk when quitting. Every entry is mirrored to `tracing`.
#[derive(Debug)]
pub struct Log {
    started: Instant,
    entries: Vec<Entry>,
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

impl Log {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, level: Level, context: &str, message: impl Into<String>) {
        let message = message.into();
        match level {
            Level::Info => tracing::info!(context, "{}", message),
            Level::Warning => tracing::warn!(context, "{}", message),
            Level::Error => tracing::error!(context, "{}", message),
        }

        self.entries.push(Entry {
            at: self.started.elapsed(),
            level,
            context: context.to_string(),
            message,
        });
    }

    pub fn info(&mut self, context: &str, message: impl Into<String>) {
        self.push(Level::Info, context, message);
    }

    pub fn warning(&mut self, context: &str, message: impl Into<String>) {
        self.push(Level::Warning, context, message);
    }

    pub fn error(&mut self, context: &str, message: impl Into<String>) {
        self.push(Level::Error, context, message);
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// The last `count` entries, oldest first.
    pub fn tail(&self, count: usize) -> &[Entry] {
        &self.entries[self.entries.len().saturating_sub(count)..]
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    pub fn render(&self, entries: &[Entry]) -> String {
        entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render(&self.entries))
    }
}
