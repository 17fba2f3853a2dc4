//! Tool descriptor and result types
//!
//! Tools are owned by remote providers; the bridge only keeps what each
//! provider advertised and what a call returned.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Fallback used when a provider advertises a tool without a description
pub const NO_DESCRIPTION: &str = "No description available";

/// A tool as advertised by its provider in `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Name of the tool, unique across the registry
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON schema of the arguments
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Create a descriptor
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        }
    }

    /// Description, or the generic fallback
    pub fn description_or_default(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(NO_DESCRIPTION)
    }

    /// Generic translation of the input schema into a vendor parameters object
    ///
    /// Always an object schema; `properties` and `required` default to empty.
    pub fn parameters(&self) -> Value {
        let properties = self
            .input_schema
            .get("properties")
            .filter(|p| p.is_object())
            .cloned()
            .unwrap_or_else(|| json!({}));
        let required = self
            .input_schema
            .get("required")
            .filter(|r| r.is_array())
            .cloned()
            .unwrap_or_else(|| json!([]));

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Result of a `tools/call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Normalized content payload (usually an array of content blocks)
    pub content: Value,

    /// Whether the provider flagged the result as an error
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    /// Create a successful output
    pub fn success(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Single text content block
    pub fn text(text: impl Into<String>) -> Self {
        Self::success(json!([{ "type": "text", "text": text.into() }]))
    }

    /// Content as replayed to the chat vendor in a tool message
    pub fn to_message_content(&self) -> String {
        self.content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_provider_json() {
        let raw = json!({
            "name": "calculator",
            "description": "Basic arithmetic",
            "inputSchema": {
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }
        });
        let tool: ToolDescriptor = serde_json::from_value(raw).unwrap();
        assert_eq!(tool.description_or_default(), "Basic arithmetic");

        let params = tool.parameters();
        assert_eq!(params["type"], "object");
        assert_eq!(params["required"], json!(["a", "b"]));
        assert!(params["properties"]["a"].is_object());
    }

    #[test]
    fn test_descriptor_defaults() {
        let tool: ToolDescriptor = serde_json::from_value(json!({"name": "ping"})).unwrap();
        assert_eq!(tool.description_or_default(), NO_DESCRIPTION);
        assert_eq!(
            tool.parameters(),
            json!({"type": "object", "properties": {}, "required": []})
        );
    }

    #[test]
    fn test_output_message_content() {
        let output = ToolOutput::text("15 multiply 8 = 120");
        assert_eq!(
            output.to_message_content(),
            r#"[{"text":"15 multiply 8 = 120","type":"text"}]"#
        );
    }
}
