//! Output chunks streamed back to the chat caller

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pieces of the user-visible chat stream
///
/// Every chunk renders to the exact text written to the response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputChunk {
    /// Incremental assistant text, forwarded as soon as it arrives
    TextDelta(String),

    /// A tool ran; narrates the tool name and its result
    ToolExecuted {
        /// Tool name
        name: String,
        /// Normalized content returned by the tool
        result: Value,
    },

    /// A tool call could not be completed
    ToolFailed {
        /// Tool name
        name: String,
        /// Failure message
        error: String,
    },

    /// Answer from the follow-up completion
    FinalAnswer(String),

    /// The follow-up completion failed
    FollowUpFailed,
}

impl OutputChunk {
    /// Render the chunk as response-body text
    pub fn render(&self) -> String {
        match self {
            OutputChunk::TextDelta(text) => text.clone(),
            OutputChunk::ToolExecuted { name, result } => {
                let pretty = serde_json::to_string_pretty(result)
                    .unwrap_or_else(|_| result.to_string());
                format!(
                    "\n\n🔧 **Tool Executed**: {}\n\n\n📝 **Result**: {}\n\n",
                    name, pretty
                )
            }
            OutputChunk::ToolFailed { name, error } => {
                format!("\n\n❌ **Tool Failed**: {} - {}\n\n", name, error)
            }
            OutputChunk::FinalAnswer(text) => format!("\n\n{}", text),
            OutputChunk::FollowUpFailed => {
                "\n\n*Unable to generate follow-up response*".to_string()
            }
        }
    }
}
