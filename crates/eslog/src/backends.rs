//! 🔌 Backends: where the bytes actually leave the building.
//!
//! 🚰 The log sink decides *what* to send and *where* it's addressed. A backend just
//! sends it. HTTP to a real cluster, or a Vec in memory for tests and dry runs.
//!
//! 🧠 Knowledge graph:
//! - `Transport`: the seam. Serialize, register a template, POST a bulk payload. That's the API.
//! - `TransportBackend`: enum dispatch over the concrete transports, so the sink never
//!   needs a generic parameter or a `dyn`.
//! - Retries, batching, backoff: not here. Not anywhere in this crate, actually.
//!
//! 🦆 The duck is here because every file must have one.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub mod elasticsearch;
pub mod in_mem;

pub use elasticsearch::{ConnectionSettings, ElasticClient, NodePool, is_unreachable};
pub use in_mem::InMemoryTransport;

/// 📡 Something that can talk to a search engine, or convincingly pretend to.
///
/// # Contract
/// - `serialize_to_string` produces compact JSON. No pretty printing, no trailing newline.
/// - `put_template` returns `Err` when the template did not land.
/// - `bulk` takes a fully rendered NDJSON payload and sends it as-is.
#[async_trait]
pub trait Transport: std::fmt::Debug + Send + Sync {
    fn serialize_to_string<T: Serialize + ?Sized>(&self, value: &T) -> Result<String>
    where
        Self: Sized,
    {
        serde_json::to_string(value)
            .context("💀 Could not serialize a value to JSON. Something in there isn't JSON-shaped.")
    }

    /// 📋 Register (or overwrite) the index template called `name`.
    async fn put_template(&self, name: &str, body: &Value) -> Result<()>;

    /// 📦 Send one `_bulk` NDJSON payload.
    async fn bulk(&self, payload: String) -> Result<()>;
}

/// 🎭 The many faces of a transport.
#[derive(Debug)]
pub enum TransportBackend {
    InMemory(InMemoryTransport),
    Elasticsearch(ElasticClient),
}

#[async_trait]
impl Transport for TransportBackend {
    async fn put_template(&self, name: &str, body: &Value) -> Result<()> {
        match self {
            TransportBackend::InMemory(t) => t.put_template(name, body).await,
            TransportBackend::Elasticsearch(t) => t.put_template(name, body).await,
        }
    }

    async fn bulk(&self, payload: String) -> Result<()> {
        match self {
            TransportBackend::InMemory(t) => t.bulk(payload).await,
            TransportBackend::Elasticsearch(t) => t.bulk(payload).await,
        }
    }
}

impl From<InMemoryTransport> for TransportBackend {
    fn from(transport: InMemoryTransport) -> Self {
        TransportBackend::InMemory(transport)
    }
}

impl From<ElasticClient> for TransportBackend {
    fn from(client: ElasticClient) -> Self {
        TransportBackend::Elasticsearch(client)
    }
}
