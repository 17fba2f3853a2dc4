use std::sync::Arc;

use prism_bridge::agent::{ChatOrchestrator, OrchestratorConfig};
use prism_bridge::config::AppConfig;
use prism_bridge::llm::OpenAiCompatProvider;
use prism_bridge::logging;
use prism_bridge::mcp::MCPServerManager;
use prism_bridge::server::{self, AllowedOrigin, AppState};
use prism_bridge::tools::ToolRegistry;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the guard alive so the log file is flushed on exit
    let _log_guard = logging::init_logging()?;

    tracing::info!("=== Prism Bridge Starting ===");

    let config = AppConfig::from_env()?;
    if config.chat.api_key.is_none() {
        tracing::warn!("MOONSHOT_API_KEY is not set; /api/chat will return 500");
    }

    let llm = OpenAiCompatProvider::new(
        config.chat.api_key.clone().unwrap_or_default(),
        &config.chat.base_url,
        &config.chat.model,
    )?;

    let manager = Arc::new(MCPServerManager::new(config.transport));
    let registry = Arc::new(
        ToolRegistry::new(manager).with_conflict_policy(config.conflict_policy),
    );

    for server in &config.mcp_servers {
        match registry.connect_provider(server).await {
            Ok(count) => tracing::info!("Connected MCP server {} ({} tools)", server.id, count),
            Err(e) => tracing::warn!("Could not connect to MCP server {}: {}", server.id, e),
        }
    }
    tracing::info!(
        "MCP initialization complete: {} tools from {} servers",
        registry.len().await,
        registry.connections().len().await
    );

    let orchestrator = ChatOrchestrator::new(
        Arc::new(llm),
        registry.clone(),
        OrchestratorConfig::from(&config.chat),
    );
    let state = AppState::new(
        orchestrator,
        config.chat.api_key.is_some(),
        config.algolia.clone(),
    );
    let app = server::router(state, AllowedOrigin::new(&config.frontend_url)?);

    let result = server::serve(&config.listen_addr(), app, shutdown_signal()).await;

    registry.shutdown().await;
    tracing::info!("=== Prism Bridge Shutting Down ===");

    result
}
