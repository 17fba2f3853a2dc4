pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiCompatProvider;
pub use provider::{ChatProvider, ChatStream};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ChatStreamChunk, FinishReason, FunctionCall,
    FunctionCallDelta, FunctionDefinition, ResponseChoice, StreamChoice, StreamDelta, ToolCall,
    ToolCallDelta, ToolChoice, ToolDefinition, Usage,
};
