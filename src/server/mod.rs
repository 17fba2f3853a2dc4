//! HTTP surface
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/health` | liveness plus provider summary |
//! | GET | `/api/mcp/info` | providers and exported tools |
//! | POST | `/api/chat` | streamed chat turn |
//! | POST | `/api/mcp/connect` | connect a provider at runtime |
//! | POST | `/api/save-analysis` | store an analysis through `saveObject` |

mod cors;
mod error;
mod routes;
mod state;

use std::future::Future;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

pub use cors::AllowedOrigin;
pub use error::{ApiError, ErrorBody};
pub use routes::SAVE_OBJECT_TOOL;
pub use state::AppState;

/// Build the application router
pub fn router(state: AppState, origin: AllowedOrigin) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/mcp/info", get(routes::mcp_info))
        .route("/api/chat", post(routes::chat))
        .route("/api/mcp/connect", post(routes::mcp_connect))
        .route("/api/save-analysis", post(routes::save_analysis))
        .layer(middleware::from_fn_with_state(origin, cors::cors))
        .with_state(state)
}

/// Serve `router` on `addr` until `shutdown` resolves
pub async fn serve<F>(addr: &str, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local = listener.local_addr()?;
    tracing::info!("[Server] Listening on http://{}", local);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    tracing::info!("[Server] Stopped");
    Ok(())
}
