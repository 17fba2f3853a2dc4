//! OpenAI-compatible chat completion client
//!
//! Talks to any vendor exposing `POST {base}/chat/completions` with bearer
//! authentication (Moonshot by default). Streamed responses are read as
//! server-sent events: one `data: {json}` line per chunk, terminated by
//! `data: [DONE]`.
//!
//! ```ignore
//! let llm = OpenAiCompatProvider::new("sk-...", "https://api.moonshot.cn/v1", "moonshot-v1-8k")?;
//! let stream = llm.stream_chat(request).await?;
//! ```

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use super::provider::{ChatProvider, ChatStream};
use super::types::{ChatRequest, ChatResponse, ChatStreamChunk};

/// Default vendor base URL
pub const DEFAULT_BASE_URL: &str = "https://api.moonshot.cn/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "moonshot-v1-8k";

/// OpenAI-compatible chat provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCompatProvider {
    /// Create a provider for `base_url` using `api_key`
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// POST the request and fail on a non-success status
    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let request_json =
            serde_json::to_string(request).context("Failed to serialize chat request")?;
        tracing::debug!("[OpenAI] Request JSON: {}", request_json);

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .body(request_json)
            .send()
            .await
            .context("Failed to send request to chat API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            tracing::error!("[OpenAI] API error: {} - {}", status, error_text);
            anyhow::bail!("Chat API error ({}): {}", status, error_text);
        }

        Ok(response)
    }
}

/// Classification of one line of the event stream
#[derive(Debug)]
pub(crate) enum SseLine {
    /// A parsed completion chunk
    Chunk(ChatStreamChunk),
    /// The `[DONE]` sentinel
    Done,
    /// Blank lines, comments, non-data fields and unparseable payloads
    Skip,
}

/// Parse one event-stream line
pub(crate) fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return SseLine::Skip;
    }
    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<ChatStreamChunk>(data) {
        Ok(chunk) => SseLine::Chunk(chunk),
        Err(e) => {
            tracing::warn!("[OpenAI] Failed to parse streaming chunk: {}", e);
            SseLine::Skip
        }
    }
}

#[async_trait::async_trait]
impl ChatProvider for OpenAiCompatProvider {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream> {
        let request = request.streaming();
        tracing::info!(
            "[OpenAI] Streaming chat: {} messages, {} tools",
            request.messages.len(),
            request.tools.as_ref().map_or(0, |t| t.len())
        );

        let response = self.send(&request).await?;
        tracing::info!("[OpenAI] Streaming response started");

        let byte_stream = response.bytes_stream();
        let stream_reader = StreamReader::new(
            byte_stream.map(|result| result.map_err(|e| std::io::Error::other(e.to_string()))),
        );
        let buf_reader = tokio::io::BufReader::new(stream_reader);

        let stream = async_stream::try_stream! {
            let mut lines = buf_reader.lines();
            while let Some(line) = lines.next_line().await? {
                match parse_sse_line(&line) {
                    SseLine::Chunk(chunk) => yield chunk,
                    SseLine::Done => {
                        tracing::debug!("[OpenAI] Stream: received [DONE]");
                        break;
                    }
                    SseLine::Skip => continue,
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn complete(&self, mut request: ChatRequest) -> Result<ChatResponse> {
        request.stream = None;
        tracing::info!("[OpenAI] Completion: {} messages", request.messages.len());

        let response = self.send(&request).await?;
        let response_text = response
            .text()
            .await
            .context("Failed to read chat response body")?;
        tracing::debug!("[OpenAI] Response body: {}", response_text);

        serde_json::from_str(&response_text).context("Failed to parse chat response")
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
