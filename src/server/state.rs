//! Shared handler state

use std::sync::Arc;

use crate::agent::ChatOrchestrator;
use crate::config::AlgoliaConfig;
use crate::tools::ToolRegistry;

/// State cloned into every handler
#[derive(Clone)]
pub struct AppState {
    /// Builds chat turns
    pub orchestrator: Arc<ChatOrchestrator>,

    /// Tool registry (same instance the orchestrator dispatches through)
    pub registry: Arc<ToolRegistry>,

    /// Whether a chat vendor key was configured
    pub api_key_configured: bool,

    /// Save-analysis target
    pub algolia: AlgoliaConfig,
}

impl AppState {
    /// Create the state around an orchestrator
    pub fn new(orchestrator: ChatOrchestrator, api_key_configured: bool, algolia: AlgoliaConfig) -> Self {
        let registry = orchestrator.registry().clone();
        Self {
            orchestrator: Arc::new(orchestrator),
            registry,
            api_key_configured,
            algolia,
        }
    }
}
