//! MCP Server Manager
//!
//! Owns the live provider connections keyed by provider id

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::config::{MCPServerConfig, ProviderTarget, TransportLimits};
use super::connection::ProviderConnection;
use super::http::SessionHttpConnection;
use super::stdio::StdioConnection;
use crate::core::{BridgeError, BridgeResult};

/// Manages connections to multiple tool providers
pub struct MCPServerManager {
    /// Map of provider id to connection
    connections: RwLock<HashMap<String, Arc<dyn ProviderConnection>>>,

    /// Limits applied to new connections
    limits: TransportLimits,
}

impl Default for MCPServerManager {
    fn default() -> Self {
        Self::new(TransportLimits::default())
    }
}

impl MCPServerManager {
    /// Create a new empty manager
    pub fn new(limits: TransportLimits) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Open a connection for `config` and register it
    ///
    /// The transport is picked from the target: URLs use the HTTP session
    /// proxy, anything else is spawned over stdio. An existing connection with
    /// the same id is replaced and closed.
    pub async fn connect(&self, config: &MCPServerConfig) -> BridgeResult<Arc<dyn ProviderConnection>> {
        if !config.enabled {
            return Err(BridgeError::InvalidConfig(format!(
                "server '{}' is disabled",
                config.id
            )));
        }

        let connection: Arc<dyn ProviderConnection> = match config.target()? {
            ProviderTarget::Command(command) => {
                Arc::new(StdioConnection::connect(config, command, &self.limits).await?)
            }
            ProviderTarget::Url(url) => {
                Arc::new(SessionHttpConnection::connect(config, url, &self.limits).await?)
            }
        };

        self.add_connection(connection.clone()).await;
        Ok(connection)
    }

    /// Register an already open connection, closing any previous one with the same id
    pub async fn add_connection(&self, connection: Arc<dyn ProviderConnection>) {
        let id = connection.id().to_string();
        let previous = self.connections.write().await.insert(id.clone(), connection);

        if let Some(previous) = previous {
            tracing::info!("[MCPServerManager] Replacing connection '{}'", id);
            previous.close().await;
        }
        tracing::info!("[MCPServerManager] Added MCP server '{}'", id);
    }

    /// Get a connection by id
    pub async fn get(&self, id: &str) -> Option<Arc<dyn ProviderConnection>> {
        self.connections.read().await.get(id).cloned()
    }

    /// Remove and close a connection
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.connections.write().await.remove(id);
        match removed {
            Some(connection) => {
                connection.close().await;
                tracing::info!("[MCPServerManager] Removed MCP server '{}'", id);
                true
            }
            None => false,
        }
    }

    /// Snapshot of all connections
    pub async fn connections(&self) -> Vec<Arc<dyn ProviderConnection>> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Number of live connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Close every connection
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.connections.write().await.drain().collect();
        for (id, connection) in drained {
            connection.close().await;
            tracing::info!("[MCPServerManager] Disconnected from '{}'", id);
        }
    }
}
