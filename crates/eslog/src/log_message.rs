//! 📦 The log message: one event, one document, one line in someone's 3am search results.
//!
//! This is what the surrounding pipeline hands us and what ends up in the index.
//! The timestamp drives the index name. Everything else is cargo.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 🚦 Severity, in the vocabulary most log frameworks agree on. Mostly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    #[serde(alias = "Info")]
    Information,
    #[serde(alias = "Warn")]
    Warning,
    Error,
    Critical,
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" | "information" => Ok(Self::Information),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" | "fatal" => Ok(Self::Critical),
            other => anyhow::bail!("💀 '{other}' is not a log level we recognize. Try info, warn, error..."),
        }
    }
}

/// 📄 One log event, shaped the way it lands in the index.
///
/// `@timestamp` is the field name every dashboard on earth expects, so that's what we emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<FixedOffset>,
    pub level: LogLevel,
    /// The logger name. `"MyApp.Controllers.Home"`, `"sqlx::query"`, that sort of thing.
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub event_id: Option<i32>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exception: Option<String>,
    /// Structured extras. Omitted entirely when empty.
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub properties: Map<String, Value>,
}

impl LogMessage {
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        level: LogLevel,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            category: category.into(),
            event_id: None,
            message: message.into(),
            exception: None,
            properties: Map::new(),
        }
    }

    pub fn with_event_id(mut self, event_id: i32) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
