//! Tool registry for managing available tools
//!
//! The registry maps every tool name to the provider that owns it. Tools are
//! discovered by asking each connected provider for its list; calls are
//! delegated back to the owning provider.
//!
//! Locks are held only for map operations, never across provider I/O, so a
//! refresh racing a call may observe either version of the registry.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::overrides::SchemaOverrides;
use super::tool::{ToolDescriptor, ToolOutput};
use crate::core::{BridgeError, BridgeResult};
use crate::llm::ToolDefinition;
use crate::mcp::{MCPServerConfig, MCPServerManager};

/// What happens when a provider advertises a name another provider owns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Fail the refresh and leave the registry unchanged
    #[default]
    Reject,
    /// The refreshing provider takes the name over
    LastWriteWins,
}

impl FromStr for ConflictPolicy {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(ConflictPolicy::Reject),
            "last-write-wins" | "last_write_wins" | "lastwritewins" => {
                Ok(ConflictPolicy::LastWriteWins)
            }
            other => Err(BridgeError::InvalidConfig(format!(
                "unknown tool conflict policy '{}' (expected 'reject' or 'last-write-wins')",
                other
            ))),
        }
    }
}

/// A tool together with its owner
#[derive(Debug, Clone)]
struct RegisteredTool {
    provider_id: String,
    descriptor: ToolDescriptor,
}

/// Per-provider summary reported by the info endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfo {
    /// Always true for listed providers
    pub connected: bool,

    /// Names of the tools this provider owns
    pub tools: Vec<String>,

    /// Transport ("stdio" or "http")
    #[serde(rename = "type")]
    pub kind: String,

    /// Proxy URL, or "N/A" for stdio providers
    pub url: String,
}

/// Registry that holds all available tools
pub struct ToolRegistry {
    /// Live provider connections
    connections: Arc<MCPServerManager>,

    /// Tool name to owner and descriptor
    tools: RwLock<HashMap<String, RegisteredTool>>,

    /// Per-tool schema replacements used by the export
    overrides: SchemaOverrides,

    /// Duplicate-name handling
    policy: ConflictPolicy,
}

impl ToolRegistry {
    /// Create an empty registry over `connections`
    ///
    /// Uses the Algolia schema overrides and the `Reject` conflict policy.
    pub fn new(connections: Arc<MCPServerManager>) -> Self {
        Self {
            connections,
            tools: RwLock::new(HashMap::new()),
            overrides: SchemaOverrides::algolia_defaults(),
            policy: ConflictPolicy::default(),
        }
    }

    /// Replace the schema override table
    pub fn with_overrides(mut self, overrides: SchemaOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Set the conflict policy
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The connection manager backing this registry
    pub fn connections(&self) -> &Arc<MCPServerManager> {
        &self.connections
    }

    /// Connect a provider and load its tools
    ///
    /// A provider with the same id is replaced. If the tool list cannot be
    /// loaded the provider is disconnected again and the error returned.
    pub async fn connect_provider(&self, config: &MCPServerConfig) -> BridgeResult<usize> {
        tracing::info!("[ToolRegistry] Connecting provider '{}'", config.id);
        self.connections.connect(config).await?;

        match self.refresh(&config.id).await {
            Ok(count) => Ok(count),
            Err(e) => {
                tracing::warn!(
                    "[ToolRegistry] Dropping provider '{}' after failed refresh: {}",
                    config.id,
                    e
                );
                self.remove_provider(&config.id).await;
                Err(e)
            }
        }
    }

    /// Re-query one provider and replace every tool it owns
    ///
    /// Returns the number of tools now owned by the provider.
    pub async fn refresh(&self, provider_id: &str) -> BridgeResult<usize> {
        let connection = self
            .connections
            .get(provider_id)
            .await
            .ok_or_else(|| BridgeError::ProviderNotConnected(provider_id.to_string()))?;

        let listed = connection.list_tools().await?;

        let mut tools = self.tools.write().await;

        if self.policy == ConflictPolicy::Reject {
            for descriptor in &listed {
                if let Some(existing) = tools.get(&descriptor.name) {
                    if existing.provider_id != provider_id {
                        return Err(BridgeError::ToolConflict {
                            tool: descriptor.name.clone(),
                            owner: existing.provider_id.clone(),
                            provider: provider_id.to_string(),
                        });
                    }
                }
            }
        }

        tools.retain(|_, tool| tool.provider_id != provider_id);
        for descriptor in listed {
            if let Some(previous) = tools.get(&descriptor.name) {
                tracing::warn!(
                    "[ToolRegistry] '{}' now provided by '{}' (was '{}')",
                    descriptor.name,
                    provider_id,
                    previous.provider_id
                );
            }
            tools.insert(
                descriptor.name.clone(),
                RegisteredTool {
                    provider_id: provider_id.to_string(),
                    descriptor,
                },
            );
        }

        let count = tools
            .values()
            .filter(|tool| tool.provider_id == provider_id)
            .count();
        tracing::info!("[ToolRegistry] Loaded {} tools from '{}'", count, provider_id);
        Ok(count)
    }

    /// Tools in the chat vendor's function schema, sorted by name
    pub async fn export_for_completion_api(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        let mut descriptors: Vec<&ToolDescriptor> = tools.values().map(|t| &t.descriptor).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));

        descriptors
            .into_iter()
            .map(|descriptor| match self.overrides.get(&descriptor.name) {
                Some(schema) => {
                    let description = descriptor
                        .description
                        .as_deref()
                        .filter(|d| !d.is_empty())
                        .unwrap_or(&schema.default_description);
                    ToolDefinition::function(
                        &descriptor.name,
                        description,
                        schema.parameters.clone(),
                    )
                }
                None => ToolDefinition::function(
                    &descriptor.name,
                    descriptor.description_or_default(),
                    descriptor.parameters(),
                ),
            })
            .collect()
    }

    /// Invoke a tool on its owning provider
    pub async fn call_tool(&self, name: &str, arguments: Value) -> BridgeResult<ToolOutput> {
        let provider_id = self
            .tools
            .read()
            .await
            .get(name)
            .map(|tool| tool.provider_id.clone())
            .ok_or_else(|| BridgeError::ToolNotFound(name.to_string()))?;

        let connection = self
            .connections
            .get(&provider_id)
            .await
            .ok_or(BridgeError::ProviderNotConnected(provider_id))?;

        tracing::info!("[ToolRegistry] Executing tool: {}", name);
        tracing::debug!("[ToolRegistry] Arguments: {}", arguments);

        let output = connection.call_tool(name, arguments).await?;
        tracing::debug!(
            "[ToolRegistry] Tool {} completed. Is error: {}",
            name,
            output.is_error
        );
        Ok(output)
    }

    /// Whether a tool with this name is registered
    pub async fn contains(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// Disconnect a provider and drop its tools
    pub async fn remove_provider(&self, provider_id: &str) -> bool {
        self.tools
            .write()
            .await
            .retain(|_, tool| tool.provider_id != provider_id);
        self.connections.remove(provider_id).await
    }

    /// Names of the tools owned by `provider_id`, sorted
    pub async fn tools_for(&self, provider_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .read()
            .await
            .iter()
            .filter(|(_, tool)| tool.provider_id == provider_id)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// All registered tool names, sorted
    pub async fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools
    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Summary of every connected provider
    pub async fn servers_info(&self) -> BTreeMap<String, ServerInfo> {
        let mut info = BTreeMap::new();
        for connection in self.connections.connections().await {
            let id = connection.id().to_string();
            let tools = self.tools_for(&id).await;
            info.insert(
                id,
                ServerInfo {
                    connected: true,
                    tools,
                    kind: connection.kind().as_str().to_string(),
                    url: connection.url().unwrap_or("N/A").to_string(),
                },
            );
        }
        info
    }

    /// Disconnect every provider and clear the registry
    pub async fn shutdown(&self) {
        tracing::info!("[ToolRegistry] Shutting down");
        self.tools.write().await.clear();
        self.connections.close_all().await;
    }
}
