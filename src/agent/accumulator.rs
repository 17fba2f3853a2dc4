//! Assembly of streamed tool-call fragments
//!
//! A streamed completion delivers each tool call as a series of fragments
//! tagged with the call's index. The first fragment of an index usually
//! carries the id and type; names and arguments may be split anywhere.

use std::collections::BTreeMap;

use crate::llm::{FunctionCall, ToolCall, ToolCallDelta};

/// A tool call under construction
#[derive(Debug, Default)]
struct PendingToolCall {
    /// Call id (may arrive after the first fragment)
    id: String,
    call_type: String,
    name: String,
    arguments: String,
}

impl PendingToolCall {
    fn into_tool_call(self) -> ToolCall {
        ToolCall {
            id: self.id,
            call_type: if self.call_type.is_empty() {
                "function".to_string()
            } else {
                self.call_type
            },
            function: FunctionCall {
                name: self.name,
                arguments: self.arguments,
            },
        }
    }
}

/// Merges fragments into complete tool calls, ordered by index
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PendingToolCall>,
}

impl ToolCallAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment
    ///
    /// Name and argument fragments are appended in arrival order and never
    /// overwrite earlier text. A late id fills an empty one.
    pub fn push(&mut self, delta: &ToolCallDelta) {
        let call = self.calls.entry(delta.index).or_default();

        if call.id.is_empty() {
            if let Some(id) = delta.id.as_deref() {
                call.id = id.to_string();
            }
        }
        if call.call_type.is_empty() {
            if let Some(call_type) = delta.call_type.as_deref() {
                call.call_type = call_type.to_string();
            }
        }
        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                call.name.push_str(name);
            }
            if let Some(arguments) = &function.arguments {
                call.arguments.push_str(arguments);
            }
        }
    }

    /// Merge every fragment of a delta
    pub fn extend<'a>(&mut self, deltas: impl IntoIterator<Item = &'a ToolCallDelta>) {
        for delta in deltas {
            self.push(delta);
        }
    }

    /// Whether no fragment has been seen
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Number of distinct calls
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Finish assembly and return the calls in index order
    pub fn into_calls(self) -> Vec<ToolCall> {
        self.calls
            .into_values()
            .map(PendingToolCall::into_tool_call)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FunctionCallDelta;

    fn fragment(index: usize, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> ToolCallDelta {
        ToolCallDelta {
            index,
            id: id.map(str::to_string),
            call_type: id.map(|_| "function".to_string()),
            function: Some(FunctionCallDelta {
                name: name.map(str::to_string),
                arguments: args.map(str::to_string),
            }),
        }
    }

    #[test]
    fn test_fragments_concatenate_in_order() {
        let arguments = r#"{"operation":"multiply","a":15,"b":8}"#;

        // Every way to split the argument text into two fragments
        for split in 0..=arguments.len() {
            let mut acc = ToolCallAccumulator::new();
            acc.push(&fragment(0, Some("call_1"), Some("calc"), Some("")));
            acc.push(&fragment(0, None, Some("ulator"), Some(&arguments[..split])));
            acc.push(&fragment(0, None, None, Some(&arguments[split..])));

            let calls = acc.into_calls();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].id, "call_1");
            assert_eq!(calls[0].call_type, "function");
            assert_eq!(calls[0].function.name, "calculator");
            assert_eq!(calls[0].function.arguments, arguments);
        }
    }

    #[test]
    fn test_interleaved_indices_sorted() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&fragment(1, Some("call_b"), Some("echo"), Some("{\"text\":")));
        acc.push(&fragment(0, Some("call_a"), Some("get_time"), Some("{")));
        acc.push(&fragment(1, None, None, Some("\"hi\"}")));
        acc.push(&fragment(0, None, None, Some("}")));
        assert_eq!(acc.len(), 2);

        let calls = acc.into_calls();
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].function.arguments, "{}");
        assert_eq!(calls[1].id, "call_b");
        assert_eq!(calls[1].function.arguments, "{\"text\":\"hi\"}");
    }

    #[test]
    fn test_late_id_fills_empty_only() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&fragment(0, None, Some("echo"), None));
        acc.push(&fragment(0, Some("call_late"), None, None));
        acc.push(&fragment(0, Some("call_other"), None, None));

        let calls = acc.into_calls();
        assert_eq!(calls[0].id, "call_late");
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = ToolCallAccumulator::new();
        assert!(acc.is_empty());
        assert!(acc.into_calls().is_empty());
    }
}
