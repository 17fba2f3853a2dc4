//! Streaming tool-call orchestration
//!
//! One chat request is one [`ChatTurn`]:
//!
//! ```text
//! StreamingContent ──finish_reason=tool_calls──▶ ExecutingTools ──▶ RequestingFollowUp ──▶ Done
//!        │
//!        └──────────── stream ends without tool calls ──────────────────────────────────▶ Done
//! ```
//!
//! Opening the completion stream happens in [`ChatOrchestrator::open`], before
//! any response byte is written, so vendor failures can still become a JSON
//! error. Everything after that is reported inside the text stream.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use serde_json::{json, Value};

use super::accumulator::ToolCallAccumulator;
use super::config::OrchestratorConfig;
use crate::core::OutputChunk;
use crate::llm::{ChatMessage, ChatProvider, ChatRequest, ChatStream, FinishReason, ToolCall};
use crate::runtime::OutputSender;
use crate::tools::ToolRegistry;

/// Builds chat turns against the shared chat provider and tool registry
///
/// # Example
///
/// ```ignore
/// let orchestrator = ChatOrchestrator::new(llm, registry, OrchestratorConfig::new("moonshot-v1-8k"));
/// let turn = orchestrator.open(messages).await?;
/// let (tx, rx) = create_output_channel();
/// tokio::spawn(turn.run(tx));
/// ```
pub struct ChatOrchestrator {
    llm: Arc<dyn ChatProvider>,
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,
}

impl ChatOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        llm: Arc<dyn ChatProvider>,
        registry: Arc<ToolRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            llm,
            registry,
            config,
        }
    }

    /// The tool registry used for dispatch
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Open the streamed completion for `history`
    ///
    /// Tools (with `tool_choice: "auto"`) are attached only when the registry
    /// exports at least one.
    pub async fn open(&self, history: Vec<ChatMessage>) -> Result<ChatTurn> {
        let tools = self.registry.export_for_completion_api().await;
        tracing::info!(
            "[Orchestrator] Chat request with {} messages and {} tools",
            history.len(),
            tools.len()
        );

        let request = ChatRequest::new(&self.config.model, history.clone())
            .with_temperature(self.config.temperature)
            .with_tools(tools);

        let stream = self
            .llm
            .stream_chat(request)
            .await
            .context("Failed to open chat completion stream")?;

        Ok(ChatTurn {
            llm: self.llm.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
            history,
            stream: Some(stream),
            state: TurnState::StreamingContent,
            content: String::new(),
            accumulator: ToolCallAccumulator::new(),
            tool_calls: Vec::new(),
            tool_messages: Vec::new(),
        })
    }
}

/// Phase of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Forwarding content and collecting tool-call fragments
    StreamingContent,
    /// Running the assembled tool calls
    ExecutingTools,
    /// Asking for the answer that uses the tool results
    RequestingFollowUp,
    /// Finished
    Done,
}

/// The receiving side of the output channel is gone
struct ClientGone;

async fn emit(output: &OutputSender, chunk: OutputChunk) -> std::result::Result<(), ClientGone> {
    output.send(chunk).await.map_err(|_| ClientGone)
}

/// Parse accumulated argument text; empty text means no arguments
fn parse_arguments(raw: &str) -> std::result::Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw).map_err(|e| format!("Invalid tool arguments: {}", e))
}

/// One chat request in flight
pub struct ChatTurn {
    llm: Arc<dyn ChatProvider>,
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,

    /// Conversation as received from the client
    history: Vec<ChatMessage>,

    /// Completion stream (taken once streaming finishes)
    stream: Option<ChatStream>,

    state: TurnState,

    /// Assistant content streamed so far
    content: String,

    accumulator: ToolCallAccumulator,

    /// Assembled tool calls, in index order
    tool_calls: Vec<ToolCall>,

    /// One tool message per call, in the same order
    tool_messages: Vec<ChatMessage>,
}

impl ChatTurn {
    /// Current phase
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Drive the turn to completion, writing user-visible output to `output`
    ///
    /// Never fails: stream errors close the output, tool failures are
    /// narrated, and a disconnected client ends the turn quietly.
    pub async fn run(mut self, output: OutputSender) {
        while self.state != TurnState::Done {
            let step = match self.state {
                TurnState::StreamingContent => self.stream_content(&output).await,
                TurnState::ExecutingTools => self.execute_tools(&output).await,
                TurnState::RequestingFollowUp => self.request_follow_up(&output).await,
                TurnState::Done => Ok(TurnState::Done),
            };

            self.state = match step {
                Ok(next) => next,
                Err(ClientGone) => {
                    tracing::info!("[Orchestrator] Client disconnected, ending turn");
                    TurnState::Done
                }
            };
        }

        tracing::info!(
            "[Orchestrator] Turn complete ({} chars, {} tool calls)",
            self.content.len(),
            self.tool_calls.len()
        );
    }

    async fn stream_content(&mut self, output: &OutputSender) -> std::result::Result<TurnState, ClientGone> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(TurnState::Done);
        };

        while let Some(next) = stream.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::error!("[Orchestrator] Chat stream failed: {:#}", e);
                    return Ok(TurnState::Done);
                }
            };

            let Some(choice) = chunk.choices.into_iter().next() else {
                continue;
            };

            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                self.content.push_str(&text);
                emit(output, OutputChunk::TextDelta(text)).await?;
            }

            if let Some(fragments) = &choice.delta.tool_calls {
                self.accumulator.extend(fragments);
            }

            if choice.finish_reason == Some(FinishReason::ToolCalls) && !self.accumulator.is_empty() {
                tracing::info!(
                    "[Orchestrator] Model requested {} tool calls",
                    self.accumulator.len()
                );
                return Ok(TurnState::ExecutingTools);
            }
        }

        Ok(TurnState::Done)
    }

    async fn execute_tools(&mut self, output: &OutputSender) -> std::result::Result<TurnState, ClientGone> {
        self.tool_calls = std::mem::take(&mut self.accumulator).into_calls();

        for call in &self.tool_calls {
            let name = &call.function.name;
            tracing::info!("[Orchestrator] Executing tool: {} ({})", name, call.id);

            let outcome = match parse_arguments(&call.function.arguments) {
                Ok(arguments) => self
                    .registry
                    .call_tool(name, arguments)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            };

            let (message, chunk) = match outcome {
                Ok(result) => (
                    ChatMessage::tool(&call.id, result.to_message_content()),
                    OutputChunk::ToolExecuted {
                        name: name.clone(),
                        result: result.content,
                    },
                ),
                Err(error) => {
                    tracing::warn!("[Orchestrator] Tool {} failed: {}", name, error);
                    (
                        ChatMessage::tool(&call.id, json!({ "error": error }).to_string()),
                        OutputChunk::ToolFailed {
                            name: name.clone(),
                            error,
                        },
                    )
                }
            };

            self.tool_messages.push(message);
            emit(output, chunk).await?;
        }

        Ok(TurnState::RequestingFollowUp)
    }

    async fn request_follow_up(&mut self, output: &OutputSender) -> std::result::Result<TurnState, ClientGone> {
        let mut messages = self.history.clone();
        messages.push(ChatMessage::assistant_with_tool_calls(
            self.content.clone(),
            self.tool_calls.clone(),
        ));
        messages.extend(self.tool_messages.iter().cloned());

        let request = ChatRequest::new(&self.config.model, messages)
            .with_temperature(self.config.temperature);

        tracing::info!("[Orchestrator] Requesting follow-up completion");
        match self.llm.complete(request).await {
            Ok(response) => {
                if let Some(answer) = response.content().filter(|c| !c.is_empty()) {
                    emit(output, OutputChunk::FinalAnswer(answer.to_string())).await?;
                }
            }
            Err(e) => {
                tracing::error!("[Orchestrator] Follow-up completion failed: {:#}", e);
                emit(output, OutputChunk::FollowUpFailed).await?;
            }
        }

        Ok(TurnState::Done)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::{
        ChatResponse, ChatStreamChunk, FunctionCallDelta, StreamChoice, StreamDelta, ToolCallDelta,
    };
    use crate::mcp::MCPServerManager;
    use crate::runtime::create_output_channel;
    use crate::tools::test_support::{registry_with, FakeConnection};
    use crate::tools::ConflictPolicy;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Chat provider that replays scripted streams and completions
    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        streams: Mutex<VecDeque<Vec<Result<ChatStreamChunk>>>>,
        completions: Mutex<VecDeque<Result<ChatResponse>>>,
        pub(crate) stream_requests: Mutex<Vec<ChatRequest>>,
        pub(crate) completion_requests: Mutex<Vec<ChatRequest>>,
        fail_open: bool,
    }

    impl ScriptedProvider {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn failing_open() -> Self {
            Self {
                fail_open: true,
                ..Default::default()
            }
        }

        pub(crate) fn with_stream(self, chunks: Vec<ChatStreamChunk>) -> Self {
            self.streams
                .lock()
                .unwrap()
                .push_back(chunks.into_iter().map(Ok).collect());
            self
        }

        pub(crate) fn with_stream_results(self, chunks: Vec<Result<ChatStreamChunk>>) -> Self {
            self.streams.lock().unwrap().push_back(chunks);
            self
        }

        pub(crate) fn with_completion(self, content: &str) -> Self {
            let response: ChatResponse = serde_json::from_value(json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
            }))
            .unwrap();
            self.completions.lock().unwrap().push_back(Ok(response));
            self
        }

        pub(crate) fn with_failed_completion(self) -> Self {
            self.completions
                .lock()
                .unwrap()
                .push_back(Err(anyhow::anyhow!("vendor unavailable")));
            self
        }

        pub(crate) fn stream_requests(&self) -> Vec<ChatRequest> {
            self.stream_requests.lock().unwrap().clone()
        }

        pub(crate) fn completion_requests(&self) -> Vec<ChatRequest> {
            self.completion_requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream> {
            self.stream_requests.lock().unwrap().push(request);
            if self.fail_open {
                anyhow::bail!("connection refused");
            }
            let chunks = self.streams.lock().unwrap().pop_front().unwrap_or_default();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
            self.completion_requests.lock().unwrap().push(request);
            self.completions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted completion")))
        }

        fn model(&self) -> String {
            "scripted".to_string()
        }
    }

    fn chunk(delta: StreamDelta, finish_reason: Option<FinishReason>) -> ChatStreamChunk {
        ChatStreamChunk {
            id: Some("chunk".to_string()),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage: None,
        }
    }

    pub(crate) fn text_chunk(text: &str) -> ChatStreamChunk {
        chunk(
            StreamDelta {
                content: Some(text.to_string()),
                ..Default::default()
            },
            None,
        )
    }

    pub(crate) fn tool_chunk(index: usize, id: Option<&str>, name: Option<&str>, arguments: &str) -> ChatStreamChunk {
        chunk(
            StreamDelta {
                tool_calls: Some(vec![ToolCallDelta {
                    index,
                    id: id.map(str::to_string),
                    call_type: id.map(|_| "function".to_string()),
                    function: Some(FunctionCallDelta {
                        name: name.map(str::to_string),
                        arguments: Some(arguments.to_string()),
                    }),
                }]),
                ..Default::default()
            },
            None,
        )
    }

    pub(crate) fn finish_chunk(reason: FinishReason) -> ChatStreamChunk {
        chunk(StreamDelta::default(), Some(reason))
    }

    /// The calculator exchange: text, split tool-call fragments, finish
    pub(crate) fn calculator_stream() -> Vec<ChatStreamChunk> {
        vec![
            text_chunk("Let me calculate that. "),
            tool_chunk(0, Some("call_1"), Some("calcu"), ""),
            tool_chunk(0, None, Some("lator"), "{\"operation\":\"multi"),
            tool_chunk(0, None, None, "ply\",\"a\":15,\"b\":8}"),
            finish_chunk(FinishReason::ToolCalls),
        ]
    }

    fn orchestrator(llm: Arc<ScriptedProvider>, registry: ToolRegistry) -> ChatOrchestrator {
        ChatOrchestrator::new(
            llm,
            Arc::new(registry),
            OrchestratorConfig::new("moonshot-v1-8k").with_temperature(0.3),
        )
    }

    async fn run_turn(orchestrator: &ChatOrchestrator, prompt: &str) -> Vec<OutputChunk> {
        let turn = orchestrator.open(vec![ChatMessage::user(prompt)]).await.unwrap();
        assert_eq!(turn.state(), TurnState::StreamingContent);

        let (tx, mut rx) = create_output_channel();
        turn.run(tx).await;

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn test_calculator_round_trip() {
        let dummy = FakeConnection::new("dummy-tools", &["calculator"]);
        let registry = registry_with(vec![dummy.clone()], ConflictPolicy::Reject).await;
        let llm = Arc::new(
            ScriptedProvider::new()
                .with_stream(calculator_stream())
                .with_completion("15 * 8 = 120."),
        );
        let orchestrator = orchestrator(llm.clone(), registry);

        let chunks = run_turn(&orchestrator, "Calculate 15 * 8").await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], OutputChunk::TextDelta("Let me calculate that. ".into()));
        match &chunks[1] {
            OutputChunk::ToolExecuted { name, result } => {
                assert_eq!(name, "calculator");
                assert_eq!(result[0]["text"], "15 multiply 8 = 120");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(chunks[2], OutputChunk::FinalAnswer("15 * 8 = 120.".into()));

        assert_eq!(
            dummy.calls(),
            vec![(
                "calculator".to_string(),
                json!({"operation": "multiply", "a": 15, "b": 8})
            )]
        );

        let opened = llm.stream_requests();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].has_tools());
        assert_eq!(opened[0].temperature, Some(0.3));

        let follow_up = &llm.completion_requests()[0];
        assert!(follow_up.tools.is_none());
        assert_eq!(follow_up.messages.len(), 3);
        assert_eq!(follow_up.messages[0].role, "user");

        let assistant = &follow_up.messages[1];
        assert_eq!(assistant.role, "assistant");
        assert_eq!(assistant.content.as_deref(), Some("Let me calculate that. "));
        let calls = assistant.requested_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "calculator");
        assert_eq!(calls[0].function.arguments, r#"{"operation":"multiply","a":15,"b":8}"#);

        let tool = &follow_up.messages[2];
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
        assert!(tool.content.as_deref().unwrap().contains("15 multiply 8 = 120"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_become_failed_result() {
        let dummy = FakeConnection::new("dummy-tools", &["calculator"]);
        let registry = registry_with(vec![dummy.clone()], ConflictPolicy::Reject).await;
        let llm = Arc::new(
            ScriptedProvider::new()
                .with_stream(vec![
                    tool_chunk(0, Some("call_1"), Some("calculator"), "{\"a\": 15,"),
                    finish_chunk(FinishReason::ToolCalls),
                ])
                .with_completion("Sorry, I sent bad arguments."),
        );
        let orchestrator = orchestrator(llm.clone(), registry);

        let chunks = run_turn(&orchestrator, "Calculate 15 * 8").await;

        assert!(dummy.calls().is_empty());
        assert!(matches!(&chunks[0], OutputChunk::ToolFailed { name, .. } if name == "calculator"));
        assert_eq!(chunks.last(), Some(&OutputChunk::FinalAnswer("Sorry, I sent bad arguments.".into())));

        let follow_up = &llm.completion_requests()[0];
        let tool_messages: Vec<_> = follow_up.messages.iter().filter(|m| m.role == "tool").collect();
        assert_eq!(tool_messages.len(), 1);
        let body: Value = serde_json::from_str(tool_messages[0].content.as_deref().unwrap()).unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("Invalid tool arguments"));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_empty_arguments() {
        let dummy = FakeConnection::new("dummy-tools", &["get_time"]);
        let registry = registry_with(vec![dummy.clone()], ConflictPolicy::Reject).await;
        let llm = Arc::new(
            ScriptedProvider::new()
                .with_stream(vec![
                    tool_chunk(0, Some("call_a"), Some("get_time"), ""),
                    tool_chunk(1, Some("call_b"), Some("saveObject"), "{}"),
                    finish_chunk(FinishReason::ToolCalls),
                ])
                .with_completion("Done."),
        );
        let orchestrator = orchestrator(llm.clone(), registry);

        let chunks = run_turn(&orchestrator, "What time is it?").await;

        assert_eq!(dummy.calls(), vec![("get_time".to_string(), json!({}))]);
        assert!(matches!(&chunks[0], OutputChunk::ToolExecuted { name, .. } if name == "get_time"));
        assert_eq!(
            chunks[1],
            OutputChunk::ToolFailed {
                name: "saveObject".into(),
                error: "Tool saveObject not found".into()
            }
        );

        let follow_up = &llm.completion_requests()[0];
        let ids: Vec<_> = follow_up
            .messages
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["call_a", "call_b"]);
    }

    #[tokio::test]
    async fn test_no_tools_plain_answer() {
        let registry = ToolRegistry::new(Arc::new(MCPServerManager::default()));
        let llm = Arc::new(
            ScriptedProvider::new().with_stream(vec![
                text_chunk("Hel"),
                text_chunk("lo"),
                finish_chunk(FinishReason::Stop),
            ]),
        );
        let orchestrator = orchestrator(llm.clone(), registry);

        let chunks = run_turn(&orchestrator, "Hi").await;

        assert_eq!(
            chunks,
            vec![
                OutputChunk::TextDelta("Hel".into()),
                OutputChunk::TextDelta("lo".into())
            ]
        );
        let opened = &llm.stream_requests()[0];
        assert!(opened.tools.is_none());
        assert!(opened.tool_choice.is_none());
        assert!(llm.completion_requests().is_empty());
    }

    #[tokio::test]
    async fn test_follow_up_failure_is_narrated() {
        let dummy = FakeConnection::new("dummy-tools", &["calculator"]);
        let registry = registry_with(vec![dummy], ConflictPolicy::Reject).await;
        let llm = Arc::new(
            ScriptedProvider::new()
                .with_stream(calculator_stream())
                .with_failed_completion(),
        );
        let orchestrator = orchestrator(llm, registry);

        let chunks = run_turn(&orchestrator, "Calculate 15 * 8").await;
        assert_eq!(chunks.last(), Some(&OutputChunk::FollowUpFailed));
    }

    #[tokio::test]
    async fn test_finish_without_fragments_does_not_execute() {
        let registry = ToolRegistry::new(Arc::new(MCPServerManager::default()));
        let llm = Arc::new(
            ScriptedProvider::new().with_stream(vec![
                text_chunk("Nothing to do."),
                finish_chunk(FinishReason::ToolCalls),
            ]),
        );
        let orchestrator = orchestrator(llm.clone(), registry);

        let chunks = run_turn(&orchestrator, "Hi").await;
        assert_eq!(chunks, vec![OutputChunk::TextDelta("Nothing to do.".into())]);
        assert!(llm.completion_requests().is_empty());
    }

    #[tokio::test]
    async fn test_stream_error_closes_output() {
        let registry = ToolRegistry::new(Arc::new(MCPServerManager::default()));
        let llm = Arc::new(ScriptedProvider::new().with_stream_results(vec![
            Ok(text_chunk("Partial")),
            Err(anyhow::anyhow!("connection reset")),
            Ok(text_chunk("never seen")),
        ]));
        let orchestrator = orchestrator(llm, registry);

        let chunks = run_turn(&orchestrator, "Hi").await;
        assert_eq!(chunks, vec![OutputChunk::TextDelta("Partial".into())]);
    }

    #[tokio::test]
    async fn test_open_failure_surfaces_before_streaming() {
        let registry = ToolRegistry::new(Arc::new(MCPServerManager::default()));
        let llm = Arc::new(ScriptedProvider::failing_open());
        let orchestrator = orchestrator(llm, registry);

        let err = match orchestrator.open(vec![ChatMessage::user("Hi")]).await {
            Ok(_) => panic!("expected open to fail"),
            Err(e) => e,
        };
        assert!(format!("{:#}", err).contains("connection refused"));
    }

    #[tokio::test]
    async fn test_client_disconnect_ends_turn() {
        let dummy = FakeConnection::new("dummy-tools", &["calculator"]);
        let registry = registry_with(vec![dummy.clone()], ConflictPolicy::Reject).await;
        let llm = Arc::new(
            ScriptedProvider::new()
                .with_stream(calculator_stream())
                .with_completion("unused"),
        );
        let orchestrator = orchestrator(llm.clone(), registry);

        let turn = orchestrator.open(vec![ChatMessage::user("Calculate 15 * 8")]).await.unwrap();
        let (tx, rx) = create_output_channel();
        drop(rx);
        turn.run(tx).await;

        assert!(dummy.calls().is_empty());
        assert!(llm.completion_requests().is_empty());
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments("").unwrap(), json!({}));
        assert_eq!(parse_arguments("  ").unwrap(), json!({}));
        assert_eq!(parse_arguments("{\"a\":1}").unwrap(), json!({"a": 1}));
        assert!(parse_arguments("{\"a\":").is_err());
    }
}
