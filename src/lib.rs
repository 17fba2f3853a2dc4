pub mod config;
pub mod core;
pub mod runtime;
pub mod tools;

// Chat vendor client
pub mod llm;
pub mod logging;

// Streaming tool-call orchestration
pub mod agent;

// MCP (Model Context Protocol) providers
pub mod mcp;

// HTTP surface
pub mod server;
