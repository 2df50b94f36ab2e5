use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::backends::Transport;

/// 📦 A transport that never forgets. Templates and payloads go into shared Vecs.
///
/// Clone-able because tests need to peek inside after handing a copy to the sink.
/// The `Arc` means everyone shares the same Vecs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransport {
    templates: Arc<Mutex<Vec<(String, Value)>>>,
    payloads: Arc<Mutex<Vec<String>>>,
    reject_templates: bool,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🚫 Same thing, but every template registration fails. For rehearsing bad days.
    pub fn rejecting_templates() -> Self {
        Self {
            reject_templates: true,
            ..Self::default()
        }
    }

    pub async fn templates(&self) -> Vec<(String, Value)> {
        self.templates.lock().await.clone()
    }

    pub async fn payloads(&self) -> Vec<String> {
        self.payloads.lock().await.clone()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn put_template(&self, name: &str, body: &Value) -> Result<()> {
        if self.reject_templates {
            anyhow::bail!("💀 In-memory transport was told to reject template '{name}'. It did.");
        }
        self.templates.lock().await.push((name.to_string(), body.clone()));
        Ok(())
    }

    async fn bulk(&self, payload: String) -> Result<()> {
        // 🔒 The Mutex is load-bearing. Do not remove. I know it looks optional. It isn't.
        self.payloads.lock().await.push(payload);
        Ok(())
    }
}
