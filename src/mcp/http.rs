//! Remote tool providers behind an HTTP session proxy
//!
//! The proxy speaks a two-phase protocol:
//!
//! 1. `GET <url>?command=..&args=..&transportType=..[&env=..]` opens an event
//!    stream whose first meaningful line is `data: /message?sessionId=...`.
//!    That path, appended to the URL with `/stdio` removed, is the session
//!    endpoint. The stream stays open for the life of the session and is
//!    drained in the background.
//! 2. Every JSON-RPC request is POSTed to the session endpoint. The body may
//!    be plain JSON or an event stream (some proxies send `Accepted` first);
//!    the first parseable JSON line is the response.
//!
//! Every line read is bounded by the chunk timeout and a response is
//! abandoned once the read budget is spent.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::task::JoinHandle;
use tokio_util::io::StreamReader;
use uuid::Uuid;

use super::config::{MCPServerConfig, TransportLimits};
use super::connection::{
    check_rpc_error, output_from_response, tools_from_response, ProviderConnection, TransportKind,
};
use super::sse::{json_from_line, session_path_from_line};
use crate::core::{BridgeError, BridgeResult};
use crate::tools::{ToolDescriptor, ToolOutput};

/// Protocol version announced on session requests
pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";

/// Command the proxy runs when none is configured
const DEFAULT_PROXY_COMMAND: &str = "npm";

/// Outcome of one budgeted read
enum LineRead {
    /// The next complete line
    Line(String),
    /// The read hit the chunk timeout
    TimedOut,
    /// Body ended or the read budget is spent
    Finished,
}

/// Response body as a buffered reader
fn body_reader(response: reqwest::Response) -> impl AsyncBufRead + Unpin + Send {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(|e| std::io::Error::other(e.to_string())));
    BufReader::new(StreamReader::new(Box::pin(byte_stream)))
}

/// Reads body lines under a per-read timeout and a read budget
struct BudgetedReader<R> {
    lines: Lines<R>,
    limits: TransportLimits,
    reads: usize,
    ended: bool,
}

impl<R: AsyncBufRead + Unpin> BudgetedReader<R> {
    fn new(reader: R, limits: TransportLimits) -> Self {
        Self {
            lines: reader.lines(),
            limits,
            reads: 0,
            ended: false,
        }
    }

    async fn next(&mut self) -> BridgeResult<LineRead> {
        if self.ended || self.reads >= self.limits.max_reads {
            return Ok(LineRead::Finished);
        }
        self.reads += 1;

        // next_line is cancel-safe, so a timed-out read loses nothing
        match tokio::time::timeout(self.limits.chunk_timeout, self.lines.next_line()).await {
            Err(_) => Ok(LineRead::TimedOut),
            Ok(Err(e)) => Err(BridgeError::transport(format!("failed to read body: {}", e))),
            Ok(Ok(Some(line))) => Ok(LineRead::Line(line)),
            Ok(Ok(None)) => {
                self.ended = true;
                Ok(LineRead::Finished)
            }
        }
    }

    fn into_lines(self) -> Lines<R> {
        self.lines
    }
}

/// Connection to a provider through the HTTP session proxy
pub struct SessionHttpConnection {
    id: String,
    url: String,
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
    limits: TransportLimits,

    /// Task keeping the handshake stream drained
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionHttpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHttpConnection")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl SessionHttpConnection {
    /// Open a session against the proxy at `url`
    pub async fn connect(
        config: &MCPServerConfig,
        url: &str,
        limits: &TransportLimits,
    ) -> BridgeResult<Self> {
        tracing::info!("[MCP] Opening HTTP session for '{}' at {}", config.id, url);

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BridgeError::connect(&config.id, e.to_string()))?;
        let handshake_url = handshake_url(config, url)?;

        let (endpoint, drain) = tokio::time::timeout(
            limits.connect_timeout,
            Self::handshake(&client, config, url, handshake_url, limits),
        )
        .await
        .map_err(|_| BridgeError::connect(&config.id, "session handshake timed out"))??;

        tracing::info!("[MCP] Session endpoint for '{}': {}", config.id, endpoint);

        Ok(Self {
            id: config.id.clone(),
            url: url.to_string(),
            endpoint,
            token: config.token.clone(),
            client,
            limits: *limits,
            drain: Mutex::new(Some(drain)),
        })
    }

    async fn handshake(
        client: &reqwest::Client,
        config: &MCPServerConfig,
        url: &str,
        handshake_url: reqwest::Url,
        limits: &TransportLimits,
    ) -> BridgeResult<(String, JoinHandle<()>)> {
        tracing::debug!("[MCP] Handshake GET {}", handshake_url);

        let mut request = client.get(handshake_url);
        if let Some(token) = &config.token {
            request = request.header("X-MCP-Proxy-Auth", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let mut reader = BudgetedReader::new(body_reader(response), *limits);
        let path = loop {
            match reader.next().await? {
                LineRead::Line(line) => {
                    if let Some(path) = session_path_from_line(&line) {
                        break path.to_string();
                    }
                }
                LineRead::TimedOut => {
                    tracing::debug!("[MCP] Handshake read timed out for '{}'", config.id);
                }
                LineRead::Finished => {
                    return Err(BridgeError::SessionEndpointNotFound(config.id.clone()));
                }
            }
        };

        let endpoint = format!("{}{}", url.replacen("/stdio", "", 1), path);

        let id = config.id.clone();
        let mut lines = reader.into_lines();
        let drain = tokio::spawn(async move {
            while let Ok(Some(_)) = lines.next_line().await {}
            tracing::debug!("[MCP] Handshake stream closed for '{}'", id);
        });

        Ok((endpoint, drain))
    }

    /// Session endpoint every request is posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one JSON-RPC request and return the response envelope
    pub async fn request(&self, method: &str, params: Value) -> BridgeResult<Value> {
        let envelope = json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });
        tracing::debug!("[MCP] '{}' -> {}", self.id, envelope);

        tokio::time::timeout(self.limits.request_timeout, self.exchange(&envelope))
            .await
            .map_err(|_| {
                BridgeError::transport(format!(
                    "{} request to '{}' timed out after {:?}",
                    method, self.id, self.limits.request_timeout
                ))
            })?
    }

    async fn exchange(&self, envelope: &Value) -> BridgeResult<Value> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("mcp-protocol-version", MCP_PROTOCOL_VERSION)
            .json(envelope);
        if let Some(token) = &self.token {
            request = request.header("x-mcp-proxy-auth", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("[MCP] '{}' returned {}: {}", self.id, status, body);
            return Err(BridgeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let mut reader = BudgetedReader::new(body_reader(response), self.limits);
        loop {
            match reader.next().await? {
                LineRead::Line(line) => {
                    if let Some(value) = json_from_line(&line) {
                        tracing::debug!("[MCP] '{}' <- {}", self.id, value);
                        return Ok(value);
                    }
                }
                LineRead::TimedOut => {
                    tracing::debug!("[MCP] Read timeout from '{}', continuing", self.id);
                }
                LineRead::Finished => break,
            }
        }

        Err(BridgeError::NoJsonResponse {
            reads: reader.reads,
        })
    }

    fn stop_drain(&self) {
        if let Ok(mut guard) = self.drain.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for SessionHttpConnection {
    fn drop(&mut self) {
        self.stop_drain();
    }
}

/// Handshake URL with the proxy query parameters
fn handshake_url(config: &MCPServerConfig, url: &str) -> BridgeResult<reqwest::Url> {
    let mut parsed = reqwest::Url::parse(url)
        .map_err(|e| BridgeError::InvalidConfig(format!("invalid url '{}': {}", url, e)))?;

    let command = config
        .command
        .as_deref()
        .filter(|c| !c.starts_with("http"))
        .unwrap_or(DEFAULT_PROXY_COMMAND);
    let args = if config.args.is_empty() {
        "start".to_string()
    } else {
        config.args.join(",")
    };
    let transport_type = config.transport_type.as_deref().unwrap_or("stdio");

    {
        let mut query = parsed.query_pairs_mut();
        query
            .append_pair("command", command)
            .append_pair("args", &args)
            .append_pair("transportType", transport_type);
        if !config.env.is_empty() {
            query.append_pair("env", &serde_json::to_string(&config.env)?);
        }
    }

    Ok(parsed)
}

#[async_trait]
impl ProviderConnection for SessionHttpConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn url(&self) -> Option<&str> {
        Some(&self.url)
    }

    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        let response = self.request("tools/list", json!({})).await?;
        check_rpc_error(&response)?;

        let tools = tools_from_response(&response);
        tracing::debug!("[MCP] '{}' listed {} tools", self.id, tools.len());
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> BridgeResult<ToolOutput> {
        tracing::info!("[MCP] Calling tool '{}' on HTTP server '{}'", name, self.id);
        let response = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        output_from_response(response)
    }

    async fn close(&self) {
        self.stop_drain();
        tracing::info!("[MCP] Closed HTTP session for '{}'", self.id);
    }
}
