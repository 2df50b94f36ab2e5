//! 💀 Construction-time errors. The only errors in this crate with a name tag.
//!
//! Everything that can go wrong at run time (HTTP, config files, the network being the
//! network) rides an `anyhow::Error` with a context chain. But a resolver that can't be
//! built is a different beast: the caller may want to know *which* option was blank,
//! so this one gets a proper enum. 🦆

use thiserror::Error;

/// 🚫 Options were rejected before anything got built. Fatal to startup, never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required option was empty or whitespace. Carries the option's name.
    #[error("💀 options.{0} is required and was blank. Nothing gets built until it isn't.")]
    MissingField(&'static str),

    #[error(
        "💀 options.{field} = '{value}' is not a usable index format: {reason}. \
         Expected something like 'logstash-{{0:yyyy.MM.dd}}'."
    )]
    InvalidIndexFormat {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("💀 options.search_url entry '{url}' is not a node URL we can talk to: {reason}")]
    InvalidNodeUrl { url: String, reason: String },

    /// reqwest refused to build a client. TLS backends, usually.
    #[error("💀 The HTTP client refused to be born. Probably the TLS stack. Either way: tragic.")]
    HttpClient(#[source] reqwest::Error),
}
