//! MCP Server Configuration
//!
//! Configuration types for tool providers and their transports

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::core::{BridgeError, BridgeResult};

/// Configuration for a single tool provider
///
/// Exactly one of `command` and `url` names the target. A target starting
/// with `http` is reached through the HTTP session transport; anything else
/// is spawned as a local executable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MCPServerConfig {
    /// Unique identifier for this provider
    pub id: String,

    /// Executable to spawn (or an `http...` URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Proxy URL for the HTTP session transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Arguments for the executable, or for the proxied command
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Bearer token for the HTTP session proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Transport the HTTP proxy should use towards the real server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_type: Option<String>,

    /// Whether this provider is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Where a provider lives, derived from its configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTarget<'a> {
    /// Local executable
    Command(&'a str),
    /// HTTP session proxy URL
    Url(&'a str),
}

impl MCPServerConfig {
    /// Create a configuration for a local executable
    pub fn stdio(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: Some(command.into()),
            enabled: true,
            ..Default::default()
        }
    }

    /// Create a configuration for an HTTP session proxy
    pub fn http(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: Some(url.into()),
            enabled: true,
            ..Default::default()
        }
    }

    /// Set the arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the proxy token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Resolve the transport target
    pub fn target(&self) -> BridgeResult<ProviderTarget<'_>> {
        let non_blank = |s: &&str| !s.trim().is_empty();
        let raw = self
            .url
            .as_deref()
            .filter(non_blank)
            .or(self.command.as_deref().filter(non_blank))
            .ok_or_else(|| {
                BridgeError::InvalidConfig(format!(
                    "server '{}' needs either a command or a url",
                    self.id
                ))
            })?;

        if raw.starts_with("http") {
            Ok(ProviderTarget::Url(raw))
        } else {
            Ok(ProviderTarget::Command(raw))
        }
    }
}

/// File format of `MCP_SERVERS_FILE`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MCPConfig {
    /// Providers to connect at startup
    #[serde(default)]
    pub servers: Vec<MCPServerConfig>,
}

impl MCPConfig {
    /// Parse the JSON file contents
    pub fn from_json(raw: &str) -> BridgeResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Enabled servers only
    pub fn enabled_servers(&self) -> impl Iterator<Item = &MCPServerConfig> {
        self.servers.iter().filter(|s| s.enabled)
    }
}

/// Timing and budget limits of the provider transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportLimits {
    /// Upper bound on a single body-chunk read
    pub chunk_timeout: Duration,

    /// Maximum chunk reads while looking for a response
    pub max_reads: usize,

    /// Upper bound on a whole JSON-RPC request
    pub request_timeout: Duration,

    /// Upper bound on establishing a connection
    pub connect_timeout: Duration,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            chunk_timeout: Duration::from_millis(5_000),
            max_reads: 100,
            request_timeout: Duration::from_millis(30_000),
            connect_timeout: Duration::from_millis(30_000),
        }
    }
}
