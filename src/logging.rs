//! Injectable diagnostics.
//!
//! A [`Logger`] belongs to whoever owns the controller. Without a sink it
//! forwards to the `log` facade under the `archgraph` target, so a binary
//! that installs `env_logger` sees engine events with no extra wiring. With a
//! sink, events go only to the sink.

use std::fmt;
use std::sync::{Arc, Mutex};

use log::{Level, LevelFilter};

const TARGET: &str = "archgraph";

/// Receives engine events that pass the logger's level filter.
pub trait EventSink: Send + Sync {
    fn event(&self, level: Level, message: &str);
}

#[derive(Clone)]
pub struct Logger {
    sink: Option<Arc<dyn EventSink>>,
    level: LevelFilter,
}

impl Logger {
    /// Forwards to the `log` facade at every level.
    pub fn new() -> Self {
        Self {
            sink: None,
            level: LevelFilter::Trace,
        }
    }

    pub fn with_sink(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink: Some(sink),
            level: LevelFilter::Debug,
        }
    }

    pub fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Drops everything.
    pub fn silent() -> Self {
        Self::new().level(LevelFilter::Off)
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        match &self.sink {
            Some(sink) => sink.event(level, &args.to_string()),
            None => log::log!(target: TARGET, level, "{args}"),
        }
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("sink", &self.sink.is_some())
            .field("level", &self.level)
            .finish()
    }
}

/// Keeps events in memory; handy for shells that show a log panel.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(Level, String)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.events()
            .iter()
            .any(|(lvl, message)| *lvl == level && message.contains(needle))
    }
}

impl EventSink for MemorySink {
    fn event(&self, level: Level, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push((level, message.to_string()));
        }
    }
}
