//! Chat provider trait
//!
//! Abstracts the chat-completion vendor so the orchestrator can be driven by
//! the real OpenAI-compatible client or by a scripted provider in tests.

use anyhow::Result;
use futures::stream::Stream;
use std::pin::Pin;

use super::types::{ChatRequest, ChatResponse, ChatStreamChunk};

/// Stream of parsed completion chunks
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatStreamChunk>> + Send>>;

/// Trait for chat-completion vendors.
///
/// Both methods take a fully built [`ChatRequest`]; the provider only adds
/// transport concerns (URL, authentication, the `stream` flag).
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open a streamed completion.
    ///
    /// Errors returned here happen before any chunk was produced (network
    /// failure, non-success status). Errors inside the stream happen mid-way.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream>;

    /// Run a non-streamed completion and return the whole response.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Get the configured model name.
    fn model(&self) -> String;
}
