//! MCP (Model Context Protocol) Support
//!
//! Connections to external tool providers.
//!
//! # Architecture
//!
//! - `ProviderConnection`: uniform `list_tools` / `call_tool` / `close` over a transport
//! - `StdioConnection`: child-process provider driven through the rmcp client
//! - `SessionHttpConnection`: remote provider behind an HTTP session proxy
//! - `MCPServerManager`: owns the live connections keyed by provider id
//!
//! # Usage
//!
//! ```ignore
//! use prism_bridge::mcp::{MCPServerConfig, MCPServerManager, TransportLimits};
//!
//! let manager = MCPServerManager::new(TransportLimits::default());
//! let connection = manager
//!     .connect(&MCPServerConfig::stdio("dummy-tools", "node").with_args(["server.js"]))
//!     .await?;
//! let tools = connection.list_tools().await?;
//! ```

mod config;
mod connection;
mod http;
mod manager;
mod sse;
mod stdio;

// Public exports
pub use config::{MCPConfig, MCPServerConfig, ProviderTarget, TransportLimits};
pub use connection::{
    check_rpc_error, output_from_response, tools_from_response, ProviderConnection, TransportKind,
};
pub use http::{SessionHttpConnection, MCP_PROTOCOL_VERSION};
pub use manager::MCPServerManager;
pub use sse::{json_from_line, session_path_from_line};
pub use stdio::StdioConnection;
