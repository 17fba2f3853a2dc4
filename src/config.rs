//! Application configuration
//!
//! Everything is read from environment variables, after loading a `.env` file
//! from the working directory when one exists. Provider definitions live in a
//! separate JSON file named by `MCP_SERVERS_FILE`.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::mcp::{MCPConfig, MCPServerConfig, TransportLimits};
use crate::tools::ConflictPolicy;

/// Default listen port
pub const DEFAULT_PORT: u16 = 3001;

/// Default CORS origin (the development front-end)
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// Default Algolia index for saved analyses
pub const DEFAULT_ALGOLIA_INDEX: &str = "file_analyses";

/// Chat vendor settings
#[derive(Debug, Clone)]
pub struct ChatVendorConfig {
    /// API key; `None` when unset or empty
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
}

/// Target of `/api/save-analysis`
#[derive(Debug, Clone)]
pub struct AlgoliaConfig {
    /// Application id; saving is disabled without it
    pub application_id: Option<String>,
    /// Index name
    pub index_name: String,
}

/// Complete process configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen port
    pub port: u16,
    /// Listen address
    pub bind_addr: String,
    /// Allowed CORS origin
    pub frontend_url: String,
    /// Chat vendor
    pub chat: ChatVendorConfig,
    /// Providers to connect at startup
    pub mcp_servers: Vec<MCPServerConfig>,
    /// Duplicate tool-name handling
    pub conflict_policy: ConflictPolicy,
    /// Transport timing limits
    pub transport: TransportLimits,
    /// Save-analysis target
    pub algolia: AlgoliaConfig,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("[Config] Loaded {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("[Config] Ignoring unreadable .env file: {}", e),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(&var, "PORT", DEFAULT_PORT)?;
        let defaults = TransportLimits::default();
        let transport = TransportLimits {
            chunk_timeout: millis_or(&var, "MCP_CHUNK_TIMEOUT_MS", defaults.chunk_timeout)?,
            max_reads: parse_or(&var, "MCP_MAX_READS", defaults.max_reads)?,
            request_timeout: millis_or(&var, "MCP_REQUEST_TIMEOUT_MS", defaults.request_timeout)?,
            connect_timeout: millis_or(&var, "MCP_CONNECT_TIMEOUT_MS", defaults.connect_timeout)?,
        };

        let conflict_policy = match var("MCP_TOOL_CONFLICTS") {
            Some(raw) => raw.parse().context("Invalid MCP_TOOL_CONFLICTS")?,
            None => ConflictPolicy::default(),
        };

        let mcp_servers = match var("MCP_SERVERS_FILE") {
            Some(path) => load_servers_file(Path::new(&path))?,
            None => Vec::new(),
        };

        Ok(Self {
            port,
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            frontend_url: var("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            chat: ChatVendorConfig {
                api_key: var("MOONSHOT_API_KEY"),
                base_url: var("MOONSHOT_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                model: var("MOONSHOT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                temperature: parse_or(&var, "MOONSHOT_TEMPERATURE", 0.3)?,
            },
            mcp_servers,
            conflict_policy,
            transport,
            algolia: AlgoliaConfig {
                application_id: var("ALGOLIA_APPLICATION_ID"),
                index_name: var("ALGOLIA_INDEX_NAME")
                    .unwrap_or_else(|| DEFAULT_ALGOLIA_INDEX.to_string()),
            },
        })
    }

    /// `host:port` to bind
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Read the enabled providers from a servers file
pub fn load_servers_file(path: &Path) -> Result<Vec<MCPServerConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read MCP servers file {}", path.display()))?;
    let config = MCPConfig::from_json(&raw)
        .with_context(|| format!("Failed to parse MCP servers file {}", path.display()))?;

    let servers: Vec<MCPServerConfig> = config.enabled_servers().cloned().collect();
    tracing::info!(
        "[Config] {} of {} MCP servers enabled in {}",
        servers.len(),
        config.servers.len(),
        path.display()
    );
    Ok(servers)
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn millis_or<F>(var: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(var, key, default_ms).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.listen_addr(), "0.0.0.0:3001");
        assert_eq!(config.frontend_url, "http://localhost:5173");
        assert!(config.chat.api_key.is_none());
        assert_eq!(config.chat.base_url, "https://api.moonshot.cn/v1");
        assert_eq!(config.chat.model, "moonshot-v1-8k");
        assert!((config.chat.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.conflict_policy, ConflictPolicy::Reject);
        assert_eq!(config.transport, TransportLimits::default());
        assert_eq!(config.algolia.index_name, "file_analyses");
        assert!(config.mcp_servers.is_empty());
    }

    #[test]
    fn test_overrides_and_empty_values() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("MOONSHOT_API_KEY", "  "),
            ("MCP_TOOL_CONFLICTS", "last-write-wins"),
            ("MCP_CHUNK_TIMEOUT_MS", "250"),
            ("MCP_MAX_READS", "7"),
            ("ALGOLIA_APPLICATION_ID", "APP123"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert!(config.chat.api_key.is_none());
        assert_eq!(config.conflict_policy, ConflictPolicy::LastWriteWins);
        assert_eq!(config.transport.chunk_timeout, Duration::from_millis(250));
        assert_eq!(config.transport.max_reads, 7);
        assert_eq!(config.algolia.application_id.as_deref(), Some("APP123"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(AppConfig::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("MCP_TOOL_CONFLICTS", "random")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("MCP_SERVERS_FILE", "/no/such/file.json")])).is_err());
    }

    #[test]
    fn test_servers_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"servers": [
                {{"id": "dummy-tools", "command": "node", "args": ["server/dummy-mcp-server.js"]}},
                {{"id": "disabled", "command": "node", "enabled": false}}
            ]}}"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = AppConfig::from_lookup(lookup(&[("MCP_SERVERS_FILE", path.as_str())])).unwrap();

        assert_eq!(config.mcp_servers.len(), 1);
        assert_eq!(config.mcp_servers[0].id, "dummy-tools");
        assert_eq!(config.mcp_servers[0].args, vec!["server/dummy-mcp-server.js".to_string()]);
    }
}
