//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! 🎬 COLD OPEN. INT. SERVER ROOM, 3:47 AM
//!
//! The app is on fire. The logs explain why. The logs are stuck in a buffer, waiting
//! for a cluster that is also on fire. Nobody can read anything. This module exists
//! so that on a normal night the logs arrive and the fire is somebody else's.
//!
//! 🧠 Knowledge graph:
//! - `NodePool`: `search_url` split on `;`. One entry → `Single`, several → `Static`.
//! - `ConnectionSettings`: pool + timeout + auth, built from options once. The caller's
//!   `modify_connection_settings` hook gets one pass at it, then `error_on_failure_status`
//!   is switched back on no matter what the hook did.
//! - `ElasticClient`: a `reqwest::Client` plus the settings. Nodes are used round-robin,
//!   one per request. No retries. If a node is down, that request fails. 🦆

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::backends::Transport;
use crate::error::ConfigurationError;
use crate::options::EsLoggerOptions;

/// 🏊 The nodes we're allowed to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePool {
    Single(Url),
    Static(Vec<Url>),
}

impl NodePool {
    /// 🔧 Parse `search_url`. A `;` anywhere means a static pool, empty entries dropped.
    pub fn from_search_url(search_url: &str) -> Result<Self, ConfigurationError> {
        if search_url.contains(';') {
            let nodes = search_url
                .split(';')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(parse_node)
                .collect::<Result<Vec<_>, _>>()?;
            if nodes.is_empty() {
                return Err(ConfigurationError::InvalidNodeUrl {
                    url: search_url.to_string(),
                    reason: "no node URLs between the ';' separators".to_string(),
                });
            }
            Ok(NodePool::Static(nodes))
        } else {
            Ok(NodePool::Single(parse_node(search_url.trim())?))
        }
    }

    pub fn nodes(&self) -> &[Url] {
        match self {
            NodePool::Single(node) => std::slice::from_ref(node),
            NodePool::Static(nodes) => nodes,
        }
    }
}

fn parse_node(raw: &str) -> Result<Url, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidNodeUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("scheme '{other}' is not http or https"))),
    }
}

/// 🔧 How the client connects: which nodes, how long to wait, who we say we are.
#[derive(Clone)]
pub struct ConnectionSettings {
    pub pool: NodePool,
    pub request_timeout: Duration,
    pub basic_auth: Option<(String, String)>,
    pub api_key: Option<String>,
    /// When false, a non-2xx response is logged and swallowed instead of returned as an error.
    pub error_on_failure_status: bool,
}

impl ConnectionSettings {
    pub fn new(pool: NodePool) -> Self {
        Self {
            pool,
            request_timeout: Duration::from_secs(60),
            basic_auth: None,
            api_key: None,
            error_on_failure_status: false,
        }
    }

    /// 🚀 Build the final settings from logger options, hook included.
    pub fn from_options(options: &EsLoggerOptions) -> Result<Self, ConfigurationError> {
        let pool = NodePool::from_search_url(&options.search_url)?;
        let mut settings =
            Self::new(pool).request_timeout(Duration::from_secs(options.connection_timeout_secs));

        // 🔒 both or nothing: a username without a password is just a name
        if let (Some(username), Some(password)) = (&options.username, &options.password) {
            if !username.is_empty() && !password.is_empty() {
                settings = settings.basic_authentication(username, password);
            }
        }
        if let Some(api_key) = options.api_key.as_deref().filter(|k| !k.is_empty()) {
            settings = settings.api_key(api_key);
        }

        if let Some(modify) = &options.modify_connection_settings {
            settings = modify(settings);
        }

        settings.error_on_failure_status = true;
        Ok(settings)
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn basic_authentication(mut self, username: &str, password: &str) -> Self {
        self.basic_auth = Some((username.to_string(), password.to_string()));
        self
    }

    pub fn api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }
}

// 🎭 manual Debug so the password never makes it into a log line
impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("pool", &self.pool)
            .field("request_timeout", &self.request_timeout)
            .field("basic_auth", &self.basic_auth.as_ref().map(|(user, _)| user))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("error_on_failure_status", &self.error_on_failure_status)
            .finish()
    }
}

/// 📡 The HTTP muscle. Reused across requests; building one per request is the networking
/// equivalent of buying a new car every time you need groceries.
#[derive(Debug)]
pub struct ElasticClient {
    client: reqwest::Client,
    settings: ConnectionSettings,
    next_node: AtomicUsize,
}

impl ElasticClient {
    /// 🏗️ Build the client. No requests are sent here.
    pub fn new(settings: ConnectionSettings) -> Result<Self, ConfigurationError> {
        if settings.pool.nodes().is_empty() {
            return Err(ConfigurationError::InvalidNodeUrl {
                url: String::new(),
                reason: "the node pool is empty".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.request_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(ConfigurationError::HttpClient)?;
        debug!("📡 Elasticsearch client built for {:?}", settings.pool);
        Ok(Self {
            client,
            settings,
            next_node: AtomicUsize::new(0),
        })
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn next_node(&self) -> &Url {
        let nodes = self.settings.pool.nodes();
        let i = self.next_node.fetch_add(1, Ordering::Relaxed) % nodes.len();
        &nodes[i]
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        // trim_end_matches('/'): `https://host//_bulk` is a different, sadder URL
        let url = format!("{}/{}", self.next_node().as_str().trim_end_matches('/'), path);
        let request = self.client.request(method, url);
        // 🔒 API key wins over basic auth. This is not a democracy.
        if let Some(api_key) = &self.settings.api_key {
            request.header("Authorization", format!("ApiKey {api_key}"))
        } else if let Some((username, password)) = &self.settings.basic_auth {
            request.basic_auth(username, Some(password))
        } else {
            request
        }
    }

    /// Sends the request. On success, hands back the response body for callers that care.
    async fn execute(&self, request: RequestBuilder, what: &str) -> Result<String> {
        let response = request
            .send()
            .await
            .with_context(|| format!("💀 The {what} request never reached Elasticsearch. Check connectivity, check timeouts, check the node list."))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            trace!("✅ {what} request landed with {status}");
            return Ok(body);
        }

        if self.settings.error_on_failure_status {
            anyhow::bail!(
                "💀 The {what} request arrived, but Elasticsearch said '{status}'. The response body read: '{body}'"
            );
        }
        warn!("⚠️ {what} request answered {status}, ignoring: {body}");
        Ok(String::new())
    }
}

/// 🔍 `true` when `err` (anywhere in its chain) is a failure to reach a node at all:
/// refused connection, DNS trouble, or a timeout. A 4xx/5xx does not count; that node answered.
pub fn is_unreachable(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .any(|e| e.is_connect() || e.is_timeout())
}

/// 📋 A `_bulk` response can be `200 OK` and still reject every document in it.
/// Returns `"type: reason"` for each rejected item, or nothing when `errors` is false.
fn bulk_item_failures(body: &str) -> Vec<String> {
    let Ok(response) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    if response.get("errors").and_then(Value::as_bool) != Some(true) {
        return Vec::new();
    }

    let items = response
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    // each item is {"<action>": {..., "error": {...}}}; the action key varies
    items
        .iter()
        .filter_map(|item| item.as_object()?.values().next())
        .filter_map(|outcome| outcome.get("error"))
        .map(|error| {
            let kind = error.get("type").and_then(Value::as_str).unwrap_or("unknown_error");
            let reason = error.get("reason").and_then(Value::as_str).unwrap_or("no reason given");
            format!("{kind}: {reason}")
        })
        .collect()
}

#[async_trait]
impl Transport for ElasticClient {
    async fn put_template(&self, name: &str, body: &Value) -> Result<()> {
        let body = self.serialize_to_string(body)?;
        let request = self
            .request(Method::PUT, &format!("_template/{name}"))
            .header("Content-Type", "application/json")
            .body(body);
        self.execute(request, "index template").await.map(drop)
    }

    async fn bulk(&self, payload: String) -> Result<()> {
        debug!("📡 Sending {} bytes to /_bulk", payload.len());
        let request = self
            .request(Method::POST, "_bulk")
            // ⚠️ x-ndjson, not json. Elasticsearch cares.
            .header("Content-Type", "application/x-ndjson")
            .body(payload);
        let body = self.execute(request, "bulk").await?;

        let failures = bulk_item_failures(&body);
        if let Some(first) = failures.first() {
            warn!(
                "⚠️ Elasticsearch accepted the bulk request but rejected {} of its documents. First complaint: {first}",
                failures.len()
            );
        }
        Ok(())
    }
}
