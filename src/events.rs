//! Structured diagnostic events.
//!
//! Core functions never log through a global. They take a caller-owned
//! [`EventSink`]; the binary passes a [`LogSink`] that forwards to `log`, and
//! tests pass a [`CaptureSink`] and inspect what was emitted.

use std::fmt;

use log::Level;
use serde_json::{Map, Value};

pub const FIXING_INDEX: &str = "Fixing table index";
pub const WRITING_TABLE: &str = "Writing table";
pub const UNEXPECTED_COLUMNS: &str = "Table columns do not match expected fields";
pub const DROPPING_INDEX_COLUMN: &str = "Dropping stray index column";
pub const DROPPING_EXTRA_COLUMNS: &str = "Dropping columns not in the field registry";
pub const REMOVING_DUPLICATES: &str = "Removing duplicate timeseries points";
pub const KEEPING_LAST_DUPLICATE: &str = "Keeping last duplicate timeseries point";
pub const UNMATCHED_COUNTIES: &str = "Some counties did not match by fips";
pub const DROPPING_NULL_ROWS: &str = "Dropping rows with null in important columns";
pub const DROPPING_BAD_DATES: &str = "Dropping rows with unparseable date";

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub level: Level,
    pub message: &'static str,
    pub fields: Map<String, Value>,
}

impl Event {
    pub fn new(level: Level, message: &'static str) -> Self {
        Self {
            level,
            message,
            fields: Map::new(),
        }
    }

    pub fn warn(message: &'static str) -> Self {
        Self::new(Level::Warn, message)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)?;
        for (key, value) in &self.fields {
            match value {
                Value::String(s) => write!(f, " {key}={s:?}")?,
                other => write!(f, " {key}={other}")?,
            }
        }
        Ok(())
    }
}

pub trait EventSink {
    fn emit(&mut self, event: Event);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: Event) {
        log::log!(event.level, "{event}");
    }
}

#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    pub events: Vec<Event>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.message).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for CaptureSink {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}
