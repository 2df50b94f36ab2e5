//! 📡 eslog: ship log events into date-stamped Elasticsearch indices.
//!
//! The pieces, bottom up:
//! - [`index_format`]: `"logstash-{0:yyyy.MM.dd}"` → `"logstash-2024.01.15"` and `"logstash-*"`.
//! - [`index_resolver`]: per-event index names, with the dead-letter fallback when the
//!   index template never registered.
//! - [`backends`]: the HTTP client (and an in-memory stand-in).
//! - [`sink`]: wires it together. Register the template, then emit.

pub mod app_config;
pub mod backends;
pub mod error;
pub mod index_format;
pub mod index_resolver;
pub mod log_message;
pub mod options;
pub mod sink;
pub mod template;

pub use error::ConfigurationError;
pub use index_resolver::{IndexResolver, TemplateRegistration};
pub use log_message::{LogLevel, LogMessage};
pub use options::{EsLoggerOptions, RegisterTemplateRecovery};
pub use sink::ElasticsearchLogSink;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info};

use crate::app_config::AppConfig;

/// 🚀 Connect, register the template, then ship every non-blank line of `input` as a log event.
///
/// 🚰 Lines are shipped as they arrive, not at EOF: a batch goes out when it reaches
/// `cli.max_events_per_request`, or as soon as the reader has nothing more buffered (the
/// next read would block). `tail -f | eslog` delivers each burst right away.
///
/// Returns how many events were delivered.
pub async fn run<R>(app_config: AppConfig, input: BufReader<R>) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut sink = ElasticsearchLogSink::connect(&app_config.elasticsearch)
        .context("💀 The Elasticsearch options didn't survive validation")?;
    sink.register_template()
        .await
        .context("💀 Startup stopped at template registration")?;

    let cli = &app_config.cli;
    let max_batch = cli.max_events_per_request.max(1);
    let mut batch = Vec::with_capacity(max_batch.min(1024));
    let mut delivered = 0;
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("💀 Failed reading input")? {
        if !line.trim().is_empty() {
            let now = chrono::Local::now().fixed_offset();
            batch.push(LogMessage::new(now, cli.level, cli.category.clone(), line));
        }
        if batch.len() >= max_batch || (!batch.is_empty() && lines.get_ref().buffer().is_empty()) {
            delivered += ship(&sink, &mut batch).await?;
        }
    }
    delivered += ship(&sink, &mut batch).await?;

    info!("✅ Delivered {} log events", delivered);
    Ok(delivered)
}

async fn ship(sink: &ElasticsearchLogSink, batch: &mut Vec<LogMessage>) -> Result<usize> {
    if batch.is_empty() {
        return Ok(0);
    }
    sink.emit(batch).await.context("💀 Log events were not delivered")?;
    debug!("🚰 Flushed a batch of {}", batch.len());
    let shipped = batch.len();
    batch.clear();
    Ok(shipped)
}
