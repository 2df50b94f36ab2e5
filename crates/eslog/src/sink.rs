//! 🚰 The log sink: options in, index template registered, log events out.
//!
//! 🎬 *[the app logs a line. the line needs a home.]*
//! *[the sink asks the resolver where home is. the resolver checks a flag.]*
//! *[the line gets an address, a type, and a ride to /_bulk.]*
//!
//! 🧠 Knowledge graph:
//! - `connect(options)`: validate options (via `IndexResolver::new`), build settings, build the
//!   HTTP client. No requests yet.
//! - `register_template()`: run once at startup, before any `emit`. `&mut self` makes that
//!   ordering a compile-time fact. Failure is logged and recorded, never fatal, except
//!   under `FailSink`.
//! - `emit(messages)`: render one NDJSON `_bulk` payload and send it. One call, one request.
//!   No buffering, no retries. Whoever calls `emit` owns batching.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::backends::{ConnectionSettings, ElasticClient, Transport, TransportBackend};
use crate::error::ConfigurationError;
use crate::index_resolver::IndexResolver;
use crate::log_message::LogMessage;
use crate::options::{EsLoggerOptions, RegisterTemplateRecovery};
use crate::template::build_template;

/// 📡 Elasticsearch log sink. Owns the resolver and the transport.
#[derive(Debug)]
pub struct ElasticsearchLogSink {
    resolver: IndexResolver,
    transport: TransportBackend,
    auto_register_template: bool,
    number_of_shards: Option<u32>,
    number_of_replicas: Option<u32>,
}

impl ElasticsearchLogSink {
    /// 🚀 Validate `options` and build the HTTP client they describe.
    pub fn connect(options: &EsLoggerOptions) -> Result<Self, ConfigurationError> {
        // resolver first: blank options should be reported before URL parsing complains
        let resolver = IndexResolver::new(options)?;
        let settings = ConnectionSettings::from_options(options)?;
        let client = ElasticClient::new(settings)?;
        Ok(Self::assemble(options, resolver, client.into()))
    }

    /// 🔧 Same validation, but the caller picks the transport.
    pub fn with_transport(
        options: &EsLoggerOptions,
        transport: impl Into<TransportBackend>,
    ) -> Result<Self, ConfigurationError> {
        let resolver = IndexResolver::new(options)?;
        Ok(Self::assemble(options, resolver, transport.into()))
    }

    fn assemble(options: &EsLoggerOptions, resolver: IndexResolver, transport: TransportBackend) -> Self {
        Self {
            resolver,
            transport,
            auto_register_template: options.auto_register_template,
            number_of_shards: options.number_of_shards,
            number_of_replicas: options.number_of_replicas,
        }
    }

    pub fn resolver(&self) -> &IndexResolver {
        &self.resolver
    }

    pub fn transport(&self) -> &TransportBackend {
        &self.transport
    }

    /// 📋 Register the index template, if auto registration is on, and record how it went.
    ///
    /// Returns `Err` only when registration failed and the policy is `FailSink`.
    pub async fn register_template(&mut self) -> Result<()> {
        if !self.auto_register_template {
            debug!("📋 Template auto registration is off. Nothing to register.");
            return Ok(());
        }

        let template_name = self.resolver.template_name().to_string();
        let body = build_template(
            self.resolver.template_match_string(),
            self.resolver.type_name(),
            self.number_of_shards,
            self.number_of_replicas,
        );

        match self.transport.put_template(&template_name, &body).await {
            Ok(()) => {
                info!(
                    "✅ Index template '{}' registered for '{}'",
                    template_name,
                    self.resolver.template_match_string()
                );
                self.resolver.record_template_registration_outcome(true);
                Ok(())
            }
            Err(err) => {
                self.resolver.record_template_registration_outcome(false);
                let recovery = self.resolver.recovery();
                warn!(
                    "⚠️ Index template '{}' failed to register ({:#}). Recovery policy: {:?}",
                    template_name, err, recovery
                );
                if recovery == RegisterTemplateRecovery::FailSink {
                    return Err(err).with_context(|| {
                        format!("💀 Index template '{template_name}' did not register and the recovery policy is FailSink. The sink refuses to start.")
                    });
                }
                Ok(())
            }
        }
    }

    /// 📦 Ship `messages` as one `_bulk` request. An empty slice sends nothing.
    pub async fn emit(&self, messages: &[LogMessage]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let payload = self.render_bulk(messages)?;
        self.transport
            .bulk(payload)
            .await
            .with_context(|| format!("💀 Failed to ship {} log events to Elasticsearch", messages.len()))?;
        debug!("📡 Shipped {} log events", messages.len());
        Ok(())
    }

    /// 📝 Two lines per event: the action line with index and type, then the document.
    fn render_bulk(&self, messages: &[LogMessage]) -> Result<String> {
        let mut body = String::new();
        for message in messages {
            let index = self.resolver.resolve_index_name(message, &message.timestamp);
            let action = serde_json::json!({
                "index": { "_index": index, "_type": self.resolver.type_name() }
            });
            body.push_str(&self.transport.serialize_to_string(&action)?);
            body.push('\n');
            body.push_str(&self.transport.serialize_to_string(message)?);
            body.push('\n');
        }
        Ok(body)
    }
}
