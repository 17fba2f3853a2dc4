//! Bridge error types

use thiserror::Error;

/// Errors raised by the tool registry, the MCP transports and configuration
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No registered tool has this name
    #[error("Tool {0} not found")]
    ToolNotFound(String),

    /// The tool is registered but its owning provider is gone
    #[error("Server {0} not connected")]
    ProviderNotConnected(String),

    /// Two providers expose the same tool name
    #[error("Tool name conflict: '{tool}' is already provided by '{owner}' (refreshing '{provider}')")]
    ToolConflict {
        /// Conflicting tool name
        tool: String,
        /// Provider that currently owns the name
        owner: String,
        /// Provider whose refresh was rejected
        provider: String,
    },

    /// Provider could not be reached or initialized
    #[error("Failed to connect to {provider}: {message}")]
    Connect {
        /// Provider id
        provider: String,
        /// Underlying failure
        message: String,
    },

    /// The HTTP handshake stream never announced a session endpoint
    #[error("Could not extract session endpoint from handshake stream of {0}")]
    SessionEndpointNotFound(String),

    /// The response body never contained parseable JSON
    #[error("No valid JSON response found in stream after {reads} reads")]
    NoJsonResponse {
        /// Number of chunk reads performed
        reads: usize,
    },

    /// JSON-RPC error returned by the provider
    #[error("{0}")]
    Rpc(String),

    /// Non-success HTTP status from a provider
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body text
        body: String,
    },

    /// Transport-level failure (send, read, subprocess)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Create a transport error from a string
    pub fn transport(msg: impl Into<String>) -> Self {
        BridgeError::Transport(msg.into())
    }

    /// Create a connect error for a provider
    pub fn connect(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        BridgeError::Connect {
            provider: provider.into(),
            message: msg.into(),
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
