//! Chat completion types for OpenAI-compatible vendors
//!
//! These types serialize/deserialize with the `/chat/completions` API as
//! implemented by Moonshot, OpenAI and other compatible vendors, including the
//! incremental `delta` shape used when `stream: true`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Messages
// ============================================================================

/// A turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the sender ("system", "user", "assistant" or "tool")
    pub role: String,

    /// Text content
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls requested by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Id of the tool call this message answers (role "tool" only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    /// Create an assistant message that requests tool calls
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Create a tool-result message answering `tool_call_id`
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Tool calls carried by this message (empty when none)
    pub fn requested_tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// A complete tool call as replayed to the vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Vendor-assigned call id
    pub id: String,

    /// Call type (always "function")
    #[serde(rename = "type")]
    pub call_type: String,

    /// Function name and JSON-encoded arguments
    pub function: FunctionCall,
}

/// Function part of a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function (tool) name
    pub name: String,

    /// Arguments as a JSON string, exactly as produced by the model
    pub arguments: String,
}

// ============================================================================
// Tool Definitions
// ============================================================================

/// Tool definition in the vendor's function-calling schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,

    /// Function signature
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    /// Create a function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Name of the function
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Function signature for a tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// How the model should use tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Model decides whether to call tools
    Auto,
}

// ============================================================================
// Request / Response
// ============================================================================

/// Request body for `/chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,

    /// Conversation so far
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Tools available to the model; omitted entirely when there are none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Tool choice; only sent together with `tools`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl ChatRequest {
    /// Create a non-streaming request without tools
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            stream: None,
            tools: None,
            tool_choice: None,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Request a streamed response
    pub fn streaming(mut self) -> Self {
        self.stream = Some(true);
        self
    }

    /// Attach tools with `tool_choice: "auto"`
    ///
    /// An empty list leaves both fields unset so they are not serialized.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        if tools.is_empty() {
            self.tools = None;
            self.tool_choice = None;
        } else {
            self.tools = Some(tools);
            self.tool_choice = Some(ToolChoice::Auto);
        }
        self
    }

    /// Whether this request carries tools
    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// Non-streaming response from `/chat/completions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Response id
    #[serde(default)]
    pub id: Option<String>,

    /// Generated choices
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,

    /// Token usage
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Content of the first choice, if any
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

/// A choice in a non-streaming response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseChoice {
    /// Choice index
    #[serde(default)]
    pub index: usize,

    /// The generated message
    pub message: ChatMessage,

    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Reason why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stopping point
    Stop,
    /// Token limit reached
    Length,
    /// The model requested tool calls
    ToolCalls,
    /// Content was filtered
    ContentFilter,
    /// Legacy single function call
    FunctionCall,
    /// Any reason this client does not know about
    #[serde(other)]
    Other,
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens
    #[serde(default)]
    pub total_tokens: u32,
}

// ============================================================================
// Streaming Types
// ============================================================================

/// One `data:` payload of a streamed completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    /// Response id
    #[serde(default)]
    pub id: Option<String>,

    /// Incremental choices
    #[serde(default)]
    pub choices: Vec<StreamChoice>,

    /// Usage (some vendors send it on the last chunk)
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// A choice inside a stream chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Choice index
    #[serde(default)]
    pub index: usize,

    /// Incremental update
    #[serde(default)]
    pub delta: StreamDelta,

    /// Set on the final chunk of the choice
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Incremental update to the assistant message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Role (first chunk only)
    #[serde(default)]
    pub role: Option<String>,

    /// Content fragment
    #[serde(default)]
    pub content: Option<String>,

    /// Tool-call fragments
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A fragment of a tool call, keyed by `index`
///
/// The id and type usually arrive only on the first fragment of an index;
/// name and arguments may be split over any number of fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the tool call in the assistant message
    #[serde(default)]
    pub index: usize,

    /// Call id
    #[serde(default)]
    pub id: Option<String>,

    /// Call type
    #[serde(rename = "type", default)]
    pub call_type: Option<String>,

    /// Name/arguments fragments
    #[serde(default)]
    pub function: Option<FunctionCallDelta>,
}

/// Name/arguments fragments of a tool call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    /// Name fragment
    #[serde(default)]
    pub name: Option<String>,

    /// Arguments fragment (partial JSON text)
    #[serde(default)]
    pub arguments: Option<String>,
}
