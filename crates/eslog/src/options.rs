//! 🔧 Logger options: every knob the Elasticsearch logger has, in one struct.
//!
//! Most of these come out of TOML or `ESLOG_*` env vars via figment (see `app_config`).
//! Two of them are code-only hooks (`index_decider`, `modify_connection_settings`)
//! because you can't write a closure in a config file. We checked. 🦆

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::backends::elasticsearch::ConnectionSettings;
use crate::log_message::LogMessage;

/// 🎯 Caller-supplied "which index does this event go to" function.
pub type IndexDecider = Arc<dyn Fn(&LogMessage) -> String + Send + Sync>;

/// 🔧 Caller-supplied tweak over the HTTP connection settings, applied once at startup.
pub type ModifyConnectionSettings = Arc<dyn Fn(ConnectionSettings) -> ConnectionSettings + Send + Sync>;

/// 🚑 What to do when the index template could not be registered at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum RegisterTemplateRecovery {
    /// Shrug and index into the normal index anyway. Mappings will be whatever ES guesses.
    #[default]
    IndexAnyway,
    /// Route every event to the dead-letter index until further notice (there is no further notice).
    IndexToDeadletterIndex,
    /// Refuse to start the sink at all.
    FailSink,
}

/// 📦 The full option set for the Elasticsearch logger.
///
/// ⚠️ `search_url` has no default on purpose: a blank one is a `ConfigurationError`
/// at construction, not a silent `localhost:9200` that works on exactly one laptop.
#[derive(Clone, Deserialize)]
pub struct EsLoggerOptions {
    /// 📡 One node URL, or several separated by `;`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub search_url: String,
    /// 🗓️ Index name pattern with one `{0:...}` date placeholder.
    #[serde(default = "default_index_format")]
    pub index_format: String,
    #[serde(default = "default_type_name", deserialize_with = "lenient_string")]
    pub type_name: String,
    #[serde(default = "default_template_name", deserialize_with = "lenient_string")]
    pub template_name: String,
    #[serde(default)]
    pub auto_register_template: bool,
    #[serde(default)]
    pub register_template_failure: RegisterTemplateRecovery,
    #[serde(default = "default_dead_letter_index_name")]
    pub dead_letter_index_name: String,
    /// ⏱️ Per-request timeout, in seconds.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    /// 🔒 Basic auth is only used when both of these are non-empty.
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub password: Option<String>,
    /// 🔒 Wins over basic auth when set.
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub number_of_shards: Option<u32>,
    #[serde(default)]
    pub number_of_replicas: Option<u32>,
    #[serde(skip)]
    pub index_decider: Option<IndexDecider>,
    #[serde(skip)]
    pub modify_connection_settings: Option<ModifyConnectionSettings>,
}

/// 🔢 A config scalar that was meant to be a string.
///
/// Figment reads `ESLOG_*` values as typed literals, so `PASSWORD=123456` arrives as an
/// integer. Numbers and booleans are turned back into text. Leading zeros are already gone
/// by then: quote the value (`PASSWORD='"007"'`) to keep them.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Flag(bool),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => text,
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Flag(b) => b.to_string(),
        }
    }
}

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

pub(crate) fn lenient_optional_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

fn default_index_format() -> String {
    "logstash-{0:yyyy.MM.dd}".to_string()
}

fn default_type_name() -> String {
    "logevent".to_string()
}

fn default_template_name() -> String {
    "eslog-events-template".to_string()
}

fn default_dead_letter_index_name() -> String {
    "deadletter-{0:yyyy.MM.dd}".to_string()
}

// ⏱️ 5 seconds. Long enough for a busy cluster, short enough that logging never becomes the outage.
fn default_connection_timeout_secs() -> u64 {
    5
}

impl Default for EsLoggerOptions {
    fn default() -> Self {
        Self {
            search_url: String::new(),
            index_format: default_index_format(),
            type_name: default_type_name(),
            template_name: default_template_name(),
            auto_register_template: false,
            register_template_failure: RegisterTemplateRecovery::default(),
            dead_letter_index_name: default_dead_letter_index_name(),
            connection_timeout_secs: default_connection_timeout_secs(),
            username: None,
            password: None,
            api_key: None,
            number_of_shards: None,
            number_of_replicas: None,
            index_decider: None,
            modify_connection_settings: None,
        }
    }
}

impl EsLoggerOptions {
    /// 🚀 Defaults everywhere, pointed at `search_url`.
    pub fn new(search_url: impl Into<String>) -> Self {
        Self {
            search_url: search_url.into(),
            ..Self::default()
        }
    }

    pub fn with_index_decider<F>(mut self, decider: F) -> Self
    where
        F: Fn(&LogMessage) -> String + Send + Sync + 'static,
    {
        self.index_decider = Some(Arc::new(decider));
        self
    }

    pub fn with_modify_connection_settings<F>(mut self, modify: F) -> Self
    where
        F: Fn(ConnectionSettings) -> ConnectionSettings + Send + Sync + 'static,
    {
        self.modify_connection_settings = Some(Arc::new(modify));
        self
    }
}

// 🎭 manual Debug: closures don't derive Debug, and passwords shouldn't print.
impl fmt::Debug for EsLoggerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EsLoggerOptions")
            .field("search_url", &self.search_url)
            .field("index_format", &self.index_format)
            .field("type_name", &self.type_name)
            .field("template_name", &self.template_name)
            .field("auto_register_template", &self.auto_register_template)
            .field("register_template_failure", &self.register_template_failure)
            .field("dead_letter_index_name", &self.dead_letter_index_name)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("number_of_shards", &self.number_of_shards)
            .field("number_of_replicas", &self.number_of_replicas)
            .field("index_decider", &self.index_decider.as_ref().map(|_| "<fn>"))
            .field(
                "modify_connection_settings",
                &self.modify_connection_settings.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}
