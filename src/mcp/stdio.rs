//! Local tool providers over stdio
//!
//! Spawns the provider executable and speaks MCP with it through the rmcp
//! client and its child-process transport.

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, Tool};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::RwLock;

use super::config::{MCPServerConfig, TransportLimits};
use super::connection::{ProviderConnection, TransportKind};
use crate::core::{BridgeError, BridgeResult};
use crate::tools::{ToolDescriptor, ToolOutput};

/// Connection to a child-process provider
pub struct StdioConnection {
    id: String,
    limits: TransportLimits,

    /// The running rmcp service (None once closed)
    service: RwLock<Option<RunningService<RoleClient, ()>>>,
}

impl std::fmt::Debug for StdioConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioConnection").field("id", &self.id).finish()
    }
}

impl StdioConnection {
    /// Spawn `command` and perform the MCP initialize handshake
    pub async fn connect(
        config: &MCPServerConfig,
        command: &str,
        limits: &TransportLimits,
    ) -> BridgeResult<Self> {
        tracing::info!(
            "[MCP] Spawning stdio server '{}': {} {:?}",
            config.id,
            command,
            config.args
        );

        let mut cmd = Command::new(command);
        cmd.args(&config.args).envs(&config.env);

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| BridgeError::connect(&config.id, format!("failed to spawn: {}", e)))?;

        let service = tokio::time::timeout(limits.connect_timeout, ().serve(transport))
            .await
            .map_err(|_| BridgeError::connect(&config.id, "MCP initialize timed out"))?
            .map_err(|e| BridgeError::connect(&config.id, e.to_string()))?;

        tracing::info!("[MCP] Connected to stdio server '{}'", config.id);

        Ok(Self::from_service(config.id.clone(), service, *limits))
    }

    /// Wrap an already running rmcp service
    pub fn from_service(
        id: impl Into<String>,
        service: RunningService<RoleClient, ()>,
        limits: TransportLimits,
    ) -> Self {
        Self {
            id: id.into(),
            limits,
            service: RwLock::new(Some(service)),
        }
    }

    fn not_connected(&self) -> BridgeError {
        BridgeError::ProviderNotConnected(self.id.clone())
    }

    /// Handle for issuing requests without holding the service lock
    async fn peer(&self) -> BridgeResult<Peer<RoleClient>> {
        let guard = self.service.read().await;
        let peer = guard.as_ref().map(|service| service.peer().clone());
        peer.ok_or_else(|| self.not_connected())
    }

    fn timed_out(&self, method: &str) -> BridgeError {
        BridgeError::transport(format!(
            "{} to '{}' timed out after {:?}",
            method, self.id, self.limits.request_timeout
        ))
    }
}

/// Convert an rmcp tool into a descriptor
pub(crate) fn descriptor_from_rmcp(tool: &Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name.to_string(),
        description: tool.description.as_ref().map(|d| d.to_string()),
        input_schema: Value::Object(tool.input_schema.as_ref().clone()),
    }
}

#[async_trait]
impl ProviderConnection for StdioConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        let peer = self.peer().await?;

        let result = tokio::time::timeout(self.limits.request_timeout, peer.list_tools(None))
            .await
            .map_err(|_| self.timed_out("tools/list"))?
            .map_err(|e| BridgeError::transport(e.to_string()))?;

        tracing::debug!("[MCP] '{}' listed {} tools", self.id, result.tools.len());
        Ok(result.tools.iter().map(descriptor_from_rmcp).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> BridgeResult<ToolOutput> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(BridgeError::Rpc(format!(
                    "tool arguments must be a JSON object, got {}",
                    other
                )))
            }
        };

        tracing::info!("[MCP] Calling tool '{}' on stdio server '{}'", name, self.id);

        let peer = self.peer().await?;
        let request = peer.call_tool(CallToolRequestParams {
            meta: None,
            name: name.to_string().into(),
            arguments,
            task: None,
        });

        let result = tokio::time::timeout(self.limits.request_timeout, request)
            .await
            .map_err(|_| self.timed_out("tools/call"))?
            .map_err(|e| BridgeError::Rpc(e.to_string()))?;

        Ok(ToolOutput {
            content: serde_json::to_value(&result.content)?,
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn close(&self) {
        let service = self.service.write().await.take();
        if let Some(service) = service {
            if let Err(e) = service.cancel().await {
                tracing::warn!("[MCP] Failed to stop stdio server '{}': {}", self.id, e);
            }
            tracing::info!("[MCP] Disconnected from '{}'", self.id);
        }
    }
}
