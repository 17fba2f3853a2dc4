//! Tool system for the bridge
//!
//! This module provides:
//! - `ToolDescriptor` / `ToolOutput` - what providers advertise and return
//! - `ToolRegistry` - tool name to owning provider, export and dispatch
//! - `SchemaOverrides` - per-tool schema replacements for the chat vendor

mod overrides;
mod registry;
mod tool;

// Core exports
pub use overrides::{SchemaOverride, SchemaOverrides};
pub use registry::{ConflictPolicy, ServerInfo, ToolRegistry};
pub use tool::{ToolDescriptor, ToolOutput, NO_DESCRIPTION};

#[cfg(test)]
pub(crate) use registry::tests as test_support;
