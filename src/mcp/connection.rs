//! Provider connection trait
//!
//! Both transports expose the same three operations. Response shapes differ
//! between providers, so the normalization helpers here accept every shape
//! seen in practice.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{BridgeError, BridgeResult};
use crate::tools::{ToolDescriptor, ToolOutput};

/// Transport used by a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Local child process speaking MCP over stdin/stdout
    Stdio,
    /// Remote session proxy reached over HTTP
    Http,
}

impl TransportKind {
    /// Name reported by the info endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Http => "http",
        }
    }
}

/// A live connection to one tool provider
#[async_trait]
pub trait ProviderConnection: Send + Sync {
    /// Provider id
    fn id(&self) -> &str;

    /// Transport kind
    fn kind(&self) -> TransportKind;

    /// Remote URL (HTTP transport only)
    fn url(&self) -> Option<&str> {
        None
    }

    /// Fetch the provider's current tool list
    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>>;

    /// Invoke a tool
    async fn call_tool(&self, name: &str, arguments: Value) -> BridgeResult<ToolOutput>;

    /// Release the underlying transport
    async fn close(&self);
}

/// Extract tool descriptors from a `tools/list` response
///
/// Accepts `{tools: [...]}` and `{result: {tools: [...]}}`; anything else is
/// an empty list. Entries that are not valid descriptors are skipped.
pub fn tools_from_response(response: &Value) -> Vec<ToolDescriptor> {
    let tools = response
        .get("tools")
        .or_else(|| response.get("result").and_then(|r| r.get("tools")))
        .and_then(Value::as_array);

    let Some(tools) = tools else {
        return Vec::new();
    };

    tools
        .iter()
        .filter_map(|raw| match serde_json::from_value::<ToolDescriptor>(raw.clone()) {
            Ok(tool) => Some(tool),
            Err(e) => {
                tracing::warn!("[MCP] Skipping malformed tool descriptor: {}", e);
                None
            }
        })
        .collect()
}

/// Normalize a `tools/call` response into its content payload
///
/// A JSON-RPC `error` member becomes [`BridgeError::Rpc`] with the provider's
/// message. Otherwise the payload is `content`, then `result.content`, then
/// `result`, then the whole response.
pub fn output_from_response(response: Value) -> BridgeResult<ToolOutput> {
    check_rpc_error(&response)?;

    let is_error = |v: &Value| v.get("isError").and_then(Value::as_bool).unwrap_or(false);

    if let Some(content) = response.get("content") {
        return Ok(ToolOutput {
            content: content.clone(),
            is_error: is_error(&response),
        });
    }

    match response.get("result") {
        Some(result) if !result.is_null() => {
            let content = result.get("content").cloned().unwrap_or_else(|| result.clone());
            Ok(ToolOutput {
                content,
                is_error: is_error(result),
            })
        }
        _ => Ok(ToolOutput::success(response)),
    }
}

/// Raise a JSON-RPC `error` member as [`BridgeError::Rpc`]
pub fn check_rpc_error(response: &Value) -> BridgeResult<()> {
    match response.get("error").filter(|e| !e.is_null()) {
        Some(error) => Err(BridgeError::Rpc(
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        )),
        None => Ok(()),
    }
}
