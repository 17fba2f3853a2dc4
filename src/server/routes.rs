//! HTTP handlers

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        StatusCode,
    },
    response::Response,
    Json,
};
use chrono::{SecondsFormat, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use crate::llm::ChatMessage;
use crate::mcp::MCPServerConfig;
use crate::runtime::{create_output_channel, OutputReceiver};
use crate::tools::ServerInfo;

/// Tool the save-analysis endpoint writes through
pub const SAVE_OBJECT_TOOL: &str = "saveObject";

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a JSON body without axum's rejection responses, so every client
/// error uses the `{error}` shape
fn parse_body<T: for<'de> Deserialize<'de>>(body: &Bytes) -> Result<T, ApiError> {
    let raw = if body.is_empty() { &b"{}"[..] } else { &body[..] };
    serde_json::from_slice(raw)
        .map_err(|e| ApiError::bad_request("Invalid JSON body").with_details(e.to_string()))
}

// ============================================================================
// GET /health
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    status: &'static str,
    timestamp: String,
    api_key_configured: bool,
    mcp_servers: BTreeMap<String, ServerInfo>,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: now_rfc3339(),
        api_key_configured: state.api_key_configured,
        mcp_servers: state.registry.servers_info().await,
    })
}

// ============================================================================
// GET /api/mcp/info
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ToolSummary {
    name: String,
    description: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct InfoResponse {
    servers: BTreeMap<String, ServerInfo>,
    tools: Vec<ToolSummary>,
}

pub(crate) async fn mcp_info(State(state): State<AppState>) -> Json<InfoResponse> {
    let tools = state
        .registry
        .export_for_completion_api()
        .await
        .into_iter()
        .map(|tool| ToolSummary {
            name: tool.function.name,
            description: tool.function.description,
        })
        .collect();

    Json(InfoResponse {
        servers: state.registry.servers_info().await,
        tools,
    })
}

// ============================================================================
// POST /api/chat
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    messages: Option<Value>,
}

fn parse_messages(body: &Bytes) -> Result<Vec<ChatMessage>, ApiError> {
    let body: ChatBody = parse_body(body)?;
    let messages = match body.messages {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(ApiError::bad_request("Messages array is required")),
    };

    messages
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<ChatMessage>, _>>()
        .map_err(|e| ApiError::bad_request("Invalid message in messages array").with_details(e.to_string()))
}

/// Response body: rendered chunks until the turn drops its sender
fn render_body(mut output: OutputReceiver) -> impl Stream<Item = Result<String, Infallible>> {
    async_stream::stream! {
        while let Some(chunk) = output.recv().await {
            yield Ok(chunk.render());
        }
    }
}

pub(crate) async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let messages = parse_messages(&body)?;

    if !state.api_key_configured {
        return Err(ApiError::internal("Moonshot API key not configured"));
    }

    let turn = state.orchestrator.open(messages).await.map_err(|e| {
        ApiError::internal("Failed to get response from AI").with_details(format!("{:#}", e))
    })?;

    let (tx, rx) = create_output_channel();
    tokio::spawn(turn.run(tx));

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(render_body(rx)))
        .map_err(|e| ApiError::internal("Failed to build response").with_details(e.to_string()))
}

// ============================================================================
// POST /api/mcp/connect
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectBody {
    #[serde(default)]
    server_id: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    transport_type: Option<String>,
}

impl ConnectBody {
    fn into_config(self) -> Result<MCPServerConfig, ApiError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let id = non_empty(self.server_id);
        let command = non_empty(self.command);
        let url = non_empty(self.url);

        match id {
            Some(id) if command.is_some() || url.is_some() => Ok(MCPServerConfig {
                id,
                command,
                url,
                args: self.args,
                env: self.env,
                token: non_empty(self.token),
                transport_type: non_empty(self.transport_type),
                enabled: true,
            }),
            _ => Err(ApiError::bad_request("serverId and command are required")),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ConnectResponse {
    success: bool,
    message: String,
}

pub(crate) async fn mcp_connect(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ConnectResponse>, ApiError> {
    let config = parse_body::<ConnectBody>(&body)?.into_config()?;
    let id = config.id.clone();

    match state.registry.connect_provider(&config).await {
        Ok(count) => {
            tracing::info!("[Server] Connected {} via API ({} tools)", id, count);
            Ok(Json(ConnectResponse {
                success: true,
                message: format!("Connected to {}", id),
            }))
        }
        Err(e) => Err(ApiError::internal(format!("Failed to connect to {}", id)).with_details(e.to_string())),
    }
}

// ============================================================================
// POST /api/save-analysis
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveAnalysisBody {
    #[serde(default)]
    analysis_result: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveAnalysisResponse {
    success: bool,
    algolia_result: Value,
}

/// Analysis plus a fresh `objectID` and `analysisDate`
fn analysis_record(analysis: Value) -> Result<Value, ApiError> {
    let Value::Object(mut record) = analysis else {
        return Err(ApiError::bad_request("analysisResult must be an object"));
    };
    record.insert("objectID".into(), json!(uuid::Uuid::new_v4().to_string()));
    record.insert("analysisDate".into(), json!(now_rfc3339()));
    Ok(Value::Object(record))
}

pub(crate) async fn save_analysis(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SaveAnalysisResponse>, ApiError> {
    let analysis = match parse_body::<SaveAnalysisBody>(&body)?.analysis_result {
        Some(value) if !value.is_null() => value,
        _ => return Err(ApiError::bad_request("analysisResult is required")),
    };

    let Some(application_id) = state.algolia.application_id.clone() else {
        return Err(ApiError::internal("Algolia application ID not configured"));
    };

    if !state.registry.contains(SAVE_OBJECT_TOOL).await {
        return Err(ApiError::unavailable("Algolia MCP server not available"));
    }

    let record = analysis_record(analysis)?;
    let arguments = json!({
        "applicationId": application_id,
        "indexName": state.algolia.index_name,
        "requestBody": record,
    });

    let output = state
        .registry
        .call_tool(SAVE_OBJECT_TOOL, arguments)
        .await
        .map_err(|e| ApiError::internal("Failed to save analysis").with_details(e.to_string()))?;

    if output.is_error {
        return Err(ApiError::internal("Failed to save analysis").with_details(output.to_message_content()));
    }

    tracing::info!("[Server] Saved analysis to {}", state.algolia.index_name);
    Ok(Json(SaveAnalysisResponse {
        success: true,
        algolia_result: output.content,
    }))
}
